//! 平台进程原语：按镜像名枚举进程、带环境变量覆盖启动进程。
//!
//! 编排层只依赖这里的两个 trait，真实实现基于 `sysinfo` + `tokio::process`，
//! 测试里替换成脚本化的假主机。

mod system;

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;

pub use system::{image_matches, SystemProcessHost};

pub type Pid = u32;

/// 一个被观察的 OS 进程句柄（只观察，不负责结束进程）
pub trait GameProcess: Send + Sync + fmt::Debug {
    fn pid(&self) -> Pid;

    fn name(&self) -> &str;

    /// 查询时进程是否已经退出（PID 被复用也算退出）
    fn has_exited(&self) -> bool;

    /// 进程退出时完成的 future，可在任意 runtime 中等待
    fn exited(&self) -> BoxFuture<'static, ()>;
}

pub type ProcessHandle = Arc<dyn GameProcess>;

/// 一次启动请求：可执行文件、工作目录与环境变量覆盖
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub executable: PathBuf,
    pub working_dir: PathBuf,
    pub env: Vec<(String, OsString)>,
}

pub trait ProcessHost: Send + Sync {
    /// 枚举镜像名匹配的进程，按枚举顺序返回；失败的条目直接跳过
    fn list_processes(&self, image_name: &str) -> Vec<ProcessHandle>;

    /// 启动进程，返回其 PID
    fn spawn(&self, request: &SpawnRequest) -> io::Result<Pid>;
}
