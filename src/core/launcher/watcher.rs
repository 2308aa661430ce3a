use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::process::{Pid, ProcessHandle, ProcessHost};
use crate::result::LaunchError;

use super::cancel::CancelFlag;
use super::surface::LoadingSurface;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// 等待期间推送给加载界面的状态文本
pub const WAITING_STATUS: &str = "Waiting for the game to start…";

/// 轮询等待“新”的游戏进程出现（不在 baseline 中的那个）
pub struct GameStartWatcher<'a> {
    host: &'a dyn ProcessHost,
    target_images: &'a [String],
    poll_interval: Duration,
}

impl<'a> GameStartWatcher<'a> {
    pub fn new(host: &'a dyn ProcessHost, target_images: &'a [String], poll_interval: Duration) -> Self {
        Self {
            host,
            target_images,
            poll_interval,
        }
    }

    /// 当前快照中第一个不在 baseline 里且仍存活的目标进程。
    ///
    /// 同时出现多个新进程时按枚举顺序取第一个，其余不处理。
    pub fn find_new(&self, baseline: &HashSet<Pid>) -> Option<ProcessHandle> {
        self.target_images
            .iter()
            .flat_map(|name| self.host.list_processes(name))
            .filter(|p| !baseline.contains(&p.pid()))
            .find(|p| !p.has_exited())
    }

    /// 超时从本次等待开始计时；取消优先于超时。
    pub async fn wait(
        &self,
        baseline: &HashSet<Pid>,
        timeout: Duration,
        cancel: &CancelFlag,
        loading: Option<&dyn LoadingSurface>,
    ) -> Result<ProcessHandle, LaunchError> {
        let start = Instant::now();
        let mut polls: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                info!(polls, "等待游戏进程时被取消");
                return Err(LaunchError::Cancelled);
            }

            polls += 1;
            if let Some(process) = self.find_new(baseline) {
                info!(
                    pid = process.pid(),
                    name = process.name(),
                    polls,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "检测到新的游戏进程"
                );
                return Ok(process);
            }

            let elapsed = start.elapsed();
            if elapsed > timeout {
                warn!(?timeout, polls, "等待游戏进程超时");
                return Err(LaunchError::Timeout(timeout));
            }

            debug!(polls, elapsed_ms = elapsed.as_millis() as u64, "尚未发现新的游戏进程");
            if let Some(surface) = loading {
                surface.set_status(WAITING_STATUS);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(polls, "等待游戏进程时被取消");
                    return Err(LaunchError::Cancelled);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
