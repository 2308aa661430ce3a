use once_cell::sync::Lazy;
use std::fs::{create_dir_all, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// 程序启动时间
static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

// 自定义启动时间计时器
struct UptimeTimer;

impl FormatTime for UptimeTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> Result<(), std::fmt::Error> {
        write!(w, "{}", elapsed_time())
    }
}

// 返回程序启动后的运行时间
fn elapsed_time() -> String {
    format_uptime(START_TIME.elapsed().as_millis())
}

fn format_uptime(millis: u128) -> String {
    let seconds = millis / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    let millis = millis % 1000;
    let seconds = seconds % 60;
    let minutes = minutes % 60;
    let hours = hours % 24;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

/// 初始化日志系统：控制台 + 按天滚动的日志文件 + latest.log。
///
/// 返回的 guard 必须持有到程序结束，否则缓冲中的日志会丢失。
/// 重复调用（例如测试中）不会替换已有的订阅器。
pub fn init_logging(logs_dir: &Path, debug_enabled: bool) -> Option<WorkerGuard> {
    // 确保日志目录存在
    if let Err(e) = create_dir_all(logs_dir) {
        eprintln!("Failed to create logs directory: {}", e);
        return None;
    }

    // 清空 `latest.log`
    let latest_log = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(logs_dir.join("latest.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to clear latest.log: {}", e);
            return None;
        }
    };

    // 设置日志级别
    let log_level = if debug_enabled { "debug" } else { "info" };

    // 控制台层
    let console_layer = tracing_subscriber::fmt::layer()
        .with_timer(UptimeTimer)
        .with_ansi(true)
        .with_target(true);

    // 文件层 - 按日期滚动
    let daily = tracing_appender::rolling::daily(logs_dir, "mpl.log");
    let (daily_writer, guard) = tracing_appender::non_blocking(daily);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_timer(UptimeTimer)
        .with_ansi(false)
        .with_target(true)
        .with_writer(daily_writer);

    // 文件层 - latest.log
    let latest_log_layer = tracing_subscriber::fmt::layer()
        .with_timer(UptimeTimer)
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(latest_log));

    let result = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(console_layer)
        .with(file_layer)
        .with(latest_log_layer)
        .try_init();

    if let Err(e) = result {
        eprintln!("Logging already initialised: {}", e);
    }
    Some(guard)
}
