use std::time::Duration;

use tracing::{info, warn};

use crate::core::profile::{Profile, ProfileId};
use crate::result::LaunchOutcome;

use super::cancel::CancelFlag;
use super::character::{LaunchConfig, ProfileLauncher};
use super::surface::{toggle_interactivity, BatchOwner, GroupProgress, OwnerContext};

/// 相邻两次启动之间的等待，给启动器留出读写配置的时间
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(4);

#[derive(Debug)]
pub struct GroupEntry {
    pub profile_id: ProfileId,
    pub profile_name: String,
    pub outcome: LaunchOutcome,
}

/// 一次批量启动中每个角色的结果，顺序与输入一致
#[derive(Debug, Default)]
pub struct GroupReport {
    pub entries: Vec<GroupEntry>,
    /// 批量被外部取消，后面的角色没有尝试
    pub cancelled: bool,
}

impl GroupReport {
    pub fn launched(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_launched()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &GroupEntry> {
        self.entries.iter().filter(|e| e.outcome.error().is_some())
    }
}

#[derive(Debug)]
pub enum GroupOutcome {
    /// 输入为空，什么都没做
    NothingToLaunch,
    Completed(GroupReport),
}

impl GroupOutcome {
    pub fn report(&self) -> Option<&GroupReport> {
        match self {
            GroupOutcome::Completed(report) => Some(report),
            GroupOutcome::NothingToLaunch => None,
        }
    }
}

struct BatchGuard<'a>(&'a dyn OwnerContext);

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        toggle_interactivity(self.0, true);
    }
}

/// 按顺序逐个启动一组角色
pub struct GroupLauncher {
    launcher: ProfileLauncher,
    settle_delay: Duration,
}

impl GroupLauncher {
    pub fn new(launcher: ProfileLauncher, settle_delay: Duration) -> Self {
        Self {
            launcher,
            settle_delay,
        }
    }

    pub fn launcher(&self) -> &ProfileLauncher {
        &self.launcher
    }

    /// 单个角色失败不会中断批量；只有 `cancel` 会提前结束
    pub async fn launch_group(
        &self,
        group_name: &str,
        profiles: &[Profile],
        config: &LaunchConfig,
        owner: &dyn OwnerContext,
        observer: Option<&dyn GroupProgress>,
        cancel: Option<&CancelFlag>,
    ) -> GroupOutcome {
        if profiles.is_empty() {
            info!(group = group_name, "分组内没有角色，跳过");
            return GroupOutcome::NothingToLaunch;
        }

        let batch_cancel = cancel.cloned().unwrap_or_default();
        let total = profiles.len();
        info!(group = group_name, total, "开始批量启动");

        toggle_interactivity(owner, false);
        let guard = BatchGuard(owner);
        // 交互状态由批量统一管理
        let batch_owner = BatchOwner { outer: owner };
        let mut report = GroupReport::default();

        for (i, profile) in profiles.iter().enumerate() {
            if batch_cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let index = i + 1;
            if let Some(observer) = observer {
                observer.on_progress(group_name, &profile.name, index, total);
            }
            info!(group = group_name, profile = %profile.id, index, total, "启动第 {}/{} 个角色", index, total);

            let outcome = self
                .launcher
                .launch(profile, config, &batch_owner, None, Some(&batch_cancel))
                .await;
            if let Some(e) = outcome.error() {
                warn!(group = group_name, profile = %profile.id, "跳过失败的角色: {}", e);
            }
            report.entries.push(GroupEntry {
                profile_id: profile.id.clone(),
                profile_name: profile.name.clone(),
                outcome,
            });

            if index < total {
                tokio::select! {
                    biased;
                    _ = batch_cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.settle_delay) => {}
                }
            }
        }

        drop(guard);
        info!(
            group = group_name,
            launched = report.launched(),
            attempted = report.entries.len(),
            cancelled = report.cancelled,
            "批量启动结束"
        );
        if let Some(observer) = observer {
            observer.on_finished(group_name, &report);
        }
        GroupOutcome::Completed(report)
    }
}
