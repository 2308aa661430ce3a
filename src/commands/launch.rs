use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tracing::info;

use crate::config::config::{Config, GroupSelector};
use crate::core::launcher::sandbox::LaunchSandbox;
use crate::core::launcher::{
    CancelFlag, GroupLauncher, GroupOutcome, ProcessRegistry, ProfileLauncher,
};
use crate::core::process::{ProcessHost, SystemProcessHost};
use crate::result::LaunchOutcome;

use super::console::{ConsoleOwner, ConsoleProgress};

/// 一次运行期间共享的配置与启动器（注册表只有这一份）
pub struct AppContext {
    pub config: Config,
    launcher: GroupLauncher,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let host = Arc::new(SystemProcessHost::new(config.exit_poll_interval()));
        Self::with_host(config, host)
    }

    pub fn with_host(config: Config, host: Arc<dyn ProcessHost>) -> Self {
        let launcher = ProfileLauncher::new(host, ProcessRegistry::new(), config.launch_options());
        let launcher = GroupLauncher::new(launcher, config.settle_delay());
        Self { config, launcher }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        self.launcher.launcher().registry()
    }
}

pub async fn launch_profile(
    ctx: &AppContext,
    profile_id: &str,
    timeout: Option<Duration>,
    cancel: &CancelFlag,
) -> anyhow::Result<LaunchOutcome> {
    let profile = ctx
        .config
        .find_profile(profile_id)
        .ok_or_else(|| anyhow!("Profile '{}' is not configured", profile_id))?;

    let owner = ConsoleOwner::new();
    Ok(ctx
        .launcher
        .launcher()
        .launch(profile, &ctx.config.launch_config(), &owner, timeout, Some(cancel))
        .await)
}

pub async fn launch_group(
    ctx: &AppContext,
    selector: GroupSelector,
    cancel: &CancelFlag,
) -> anyhow::Result<GroupOutcome> {
    let (name, profiles) = ctx.config.resolve_group(selector)?;

    let owner = ConsoleOwner::new();
    Ok(ctx
        .launcher
        .launch_group(
            &name,
            &profiles,
            &ctx.config.launch_config(),
            &owner,
            Some(&ConsoleProgress),
            Some(cancel),
        )
        .await)
}

/// `list` 子命令的输出：每个角色一行
pub fn describe_profiles(config: &Config) -> Vec<String> {
    let storage_root = config.launch_config().storage_root;
    config
        .profiles
        .iter()
        .map(|p| {
            let groups: Vec<&str> = config
                .groups
                .iter()
                .filter(|g| p.group_ids.contains(&g.id))
                .map(|g| g.name.as_str())
                .collect();
            let sandbox = LaunchSandbox::resolve(&storage_root, &p.id);
            format!(
                "{:<8} {:<24} groups=[{}] sandbox={}",
                p.id,
                p.name,
                groups.join(", "),
                sandbox.root_dir.display()
            )
        })
        .collect()
}

/// 阻塞直到所有已登记的游戏进程退出，或被取消
pub async fn watch_until_exit(registry: &ProcessRegistry, interval: Duration, cancel: &CancelFlag) {
    let mut last = usize::MAX;
    loop {
        let live = registry.list_all();
        if live.is_empty() {
            info!("所有游戏进程都已退出");
            return;
        }
        if live.len() != last {
            for t in &live {
                info!(profile = %t.profile_id, pid = t.process_id, "运行中: {}", t.process_name);
            }
            last = live.len();
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(remaining = live.len(), "停止监视");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
