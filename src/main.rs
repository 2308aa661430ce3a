use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use mpl_lib::commands::{describe_profiles, launch_group, launch_profile, watch_until_exit, AppContext};
use mpl_lib::config::config::{get_config_file_path, read_config, GroupSelector};
use mpl_lib::utils::logger::init_logging;
use mpl_lib::utils::{app_info, file_ops};
use mpl_lib::{CancelFlag, GroupOutcome, LaunchOutcome};

/// Launch sandboxed game launcher profiles and track their game processes
#[derive(Parser, Debug)]
#[command(name = "mpl")]
#[command(version)]
struct Cli {
    /// Config file path (defaults to MPL/config/settings.toml next to the executable)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Launch a single profile
    Launch {
        profile: String,
        /// Seconds to wait for the game process
        #[arg(long)]
        timeout: Option<u64>,
        /// Keep running until the game exits
        #[arg(long)]
        watch: bool,
    },
    /// Launch every profile of a group, one after another ("all" for every profile)
    Group {
        selector: GroupSelector,
        #[arg(long)]
        watch: bool,
    },
    /// List configured profiles
    List,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 创建初始目录（同步）
    file_ops::create_initial_directories();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = cli.config.unwrap_or_else(get_config_file_path);
    let config = read_config(&config_path)
        .with_context(|| format!("Failed to read config {}", config_path.display()))?;

    let _guard = init_logging(&file_ops::mpl_subdir("logs"), cli.debug || config.launcher.debug);
    info!("{}", app_info::get_build_info().replace('\n', ", "));
    info!(config = %config_path.display(), profiles = config.profiles.len(), "配置已加载");

    let exit_poll = config.exit_poll_interval();
    let ctx = AppContext::new(config);

    // Ctrl-C 取消正在进行的启动或监视
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("收到 Ctrl-C，正在取消");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::List => {
            let lines = describe_profiles(&ctx.config);
            if lines.is_empty() {
                println!("No profiles configured in {}", config_path.display());
            }
            for line in lines {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Launch {
            profile,
            timeout,
            watch,
        } => {
            let outcome = launch_profile(&ctx, &profile, timeout.map(Duration::from_secs), &cancel).await?;
            match outcome {
                LaunchOutcome::Launched(launched) => {
                    println!("{} → pid {} ({})", launched.profile_id, launched.pid, launched.process_name);
                    if watch {
                        watch_until_exit(ctx.registry(), exit_poll, &cancel).await;
                    }
                    Ok(ExitCode::SUCCESS)
                }
                LaunchOutcome::Failed(e) if !e.is_informational() => Err(e.into()),
                _ => Ok(ExitCode::SUCCESS),
            }
        }
        Command::Group { selector, watch } => {
            match launch_group(&ctx, selector, &cancel).await? {
                GroupOutcome::NothingToLaunch => {
                    println!("Nothing to launch");
                    Ok(ExitCode::SUCCESS)
                }
                GroupOutcome::Completed(report) => {
                    let failed = report.failures().count();
                    if watch && report.launched() > 0 {
                        watch_until_exit(ctx.registry(), exit_poll, &cancel).await;
                    }
                    Ok(if failed == 0 {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    })
                }
            }
        }
    }
}
