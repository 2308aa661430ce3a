//! 无界面时的宿主实现：交互切换与加载状态都写到日志里。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::core::launcher::{
    CancelFlag, GroupProgress, GroupReport, Interactable, LoadingSurface, OwnerContext,
};
use crate::result::LaunchOutcome;

#[derive(Debug)]
pub struct ConsoleOwner {
    interactive: AtomicBool,
}

impl Default for ConsoleOwner {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleOwner {
    pub fn new() -> Self {
        Self {
            interactive: AtomicBool::new(true),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive.load(Ordering::SeqCst)
    }
}

impl Interactable for ConsoleOwner {
    fn set_interactive(&self, enabled: bool) {
        self.interactive.store(enabled, Ordering::SeqCst);
        debug!(enabled, "控制台交互状态切换");
    }
}

impl OwnerContext for ConsoleOwner {
    fn interactable(&self) -> Option<&dyn Interactable> {
        Some(self)
    }

    fn open_loading(&self, cancel: CancelFlag) -> Option<Box<dyn LoadingSurface>> {
        Some(Box::new(ConsoleLoading {
            cancel,
            last_status: Mutex::new(None),
        }))
    }
}

/// 相同的状态文本只输出一次，避免每次轮询刷屏
struct ConsoleLoading {
    cancel: CancelFlag,
    last_status: Mutex<Option<String>>,
}

impl LoadingSurface for ConsoleLoading {
    fn show(&self) {
        debug!("加载状态开始");
    }

    fn set_status(&self, text: &str) {
        let mut last = self
            .last_status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if last.as_deref() == Some(text) {
            return;
        }
        info!("{}", text);
        *last = Some(text.to_string());
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

/// 把批量进度输出到日志
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl GroupProgress for ConsoleProgress {
    fn on_progress(&self, group: &str, profile_name: &str, index: usize, total: usize) {
        info!("[{}] ({}/{}) {}", group, index, total, profile_name);
    }

    fn on_finished(&self, group: &str, report: &GroupReport) {
        for entry in &report.entries {
            match &entry.outcome {
                LaunchOutcome::Launched(l) => {
                    info!("[{}] {} → pid {} ({})", group, entry.profile_name, l.pid, l.process_name)
                }
                LaunchOutcome::Cancelled => info!("[{}] {} 已取消", group, entry.profile_name),
                LaunchOutcome::Failed(e) => warn!("[{}] {} 失败: {}", group, entry.profile_name, e),
            }
        }
        info!(
            "[{}] 完成 {}/{}{}",
            group,
            report.launched(),
            report.entries.len(),
            if report.cancelled { "（已取消）" } else { "" }
        );
    }
}
