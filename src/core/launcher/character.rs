use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::core::process::{Pid, ProcessHost, SpawnRequest};
use crate::core::profile::{Profile, ProfileId};
use crate::result::{LaunchError, LaunchOutcome};

use super::cancel::CancelFlag;
use super::registry::ProcessRegistry;
use super::sandbox::SandboxBuilder;
use super::snapshot::snapshot;
use super::surface::{toggle_interactivity, LoadingSurface, OwnerContext};
use super::watcher::{GameStartWatcher, DEFAULT_POLL_INTERVAL};

pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(90);

/// 启动器运行参数（由配置文件的 `[launch]` 段派生）
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// 游戏进程镜像名，按优先级排列
    pub game_process_names: Vec<String>,
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// 在沙盒 Documents 下预先创建的子目录
    pub documents_subdirs: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            game_process_names: vec!["ffxiv_dx11".into(), "ffxiv".into()],
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_LAUNCH_TIMEOUT,
            documents_subdirs: vec!["My Games/FINAL FANTASY XIV - A Realm Reborn".into()],
        }
    }
}

/// 单次启动需要的路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub launcher_path: PathBuf,
    pub storage_root: PathBuf,
}

/// 启动成功后返回给调用方的信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedProfile {
    pub profile_id: ProfileId,
    pub pid: Pid,
    pub process_name: String,
    /// 我们直接拉起的启动器进程（不是游戏本身）
    pub launcher_pid: Pid,
    pub elapsed: Duration,
}

/// 一次启动的临时状态
struct LaunchAttempt {
    profile_id: ProfileId,
    baseline: HashSet<Pid>,
    started_at: DateTime<Utc>,
    deadline: Option<DateTime<Utc>>,
}

/// 不论结果如何，退出时关闭加载界面并恢复交互
struct LaunchGuard<'a> {
    owner: &'a dyn OwnerContext,
    loading: Option<&'a dyn LoadingSurface>,
}

impl Drop for LaunchGuard<'_> {
    fn drop(&mut self) {
        if let Some(surface) = self.loading {
            surface.close();
        }
        toggle_interactivity(self.owner, true);
    }
}

/// 单个角色的启动流程：沙盒 → 基线快照 → 拉起启动器 → 等待游戏进程 → 登记
pub struct ProfileLauncher {
    host: Arc<dyn ProcessHost>,
    registry: ProcessRegistry,
    options: LaunchOptions,
    sandbox: SandboxBuilder,
}

impl ProfileLauncher {
    pub fn new(host: Arc<dyn ProcessHost>, registry: ProcessRegistry, options: LaunchOptions) -> Self {
        let sandbox = SandboxBuilder::new(&options.documents_subdirs);
        Self {
            host,
            registry,
            options,
            sandbox,
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// 启动一个角色。总会返回，并且总会恢复 `owner` 的交互状态。
    ///
    /// `timeout` 为 `None` 时使用配置的超时；`cancel` 是外部取消标志，
    /// 关闭加载界面只会取消本次启动，不会影响它。
    pub async fn launch(
        &self,
        profile: &Profile,
        config: &LaunchConfig,
        owner: &dyn OwnerContext,
        timeout: Option<Duration>,
        cancel: Option<&CancelFlag>,
    ) -> LaunchOutcome {
        let outcome = LaunchOutcome::from(
            self.try_launch(profile, config, owner, timeout, cancel)
                .await,
        );

        match &outcome {
            LaunchOutcome::Launched(launched) => info!(
                profile = %launched.profile_id,
                pid = launched.pid,
                elapsed_ms = launched.elapsed.as_millis() as u64,
                "角色启动完成"
            ),
            LaunchOutcome::Cancelled => info!(profile = %profile.id, "角色启动已取消"),
            LaunchOutcome::Failed(e) => error!(profile = %profile.id, "角色启动失败: {}", e),
        }
        outcome
    }

    async fn try_launch(
        &self,
        profile: &Profile,
        config: &LaunchConfig,
        owner: &dyn OwnerContext,
        timeout: Option<Duration>,
        cancel: Option<&CancelFlag>,
    ) -> Result<LaunchedProfile, LaunchError> {
        let executable = profile.resolve_executable(&config.launcher_path);
        if !executable.is_file() {
            return Err(LaunchError::NotFound(executable));
        }
        let timeout = timeout.unwrap_or(self.options.timeout);

        info!(profile = %profile.id, name = %profile.name, exe = %executable.display(), "开始启动角色");
        toggle_interactivity(owner, false);

        let internal = cancel.map(CancelFlag::child).unwrap_or_default();
        let loading = owner.open_loading(internal.clone());
        let _guard = LaunchGuard {
            owner,
            loading: loading.as_deref(),
        };
        if let Some(surface) = loading.as_deref() {
            surface.show();
            surface.set_status(&format!("Launching {}…", profile.name));
        }

        let sandbox = self.sandbox.build(&profile.id, &config.storage_root)?;

        // 基线必须在沙盒就绪之后、拉起进程之前
        let started = Instant::now();
        let started_at = Utc::now();
        let attempt = LaunchAttempt {
            profile_id: profile.id.clone(),
            baseline: snapshot(self.host.as_ref(), &self.options.game_process_names),
            started_at,
            deadline: TimeDelta::from_std(timeout)
                .ok()
                .and_then(|d| started_at.checked_add_signed(d)),
        };

        if internal.is_cancelled() {
            return Err(LaunchError::Cancelled);
        }

        let request = SpawnRequest {
            executable: executable.clone(),
            working_dir: sandbox.home_dir.clone(),
            env: sandbox.env_overrides(),
        };
        let launcher_pid = self
            .host
            .spawn(&request)
            .map_err(|source| LaunchError::SpawnFailed {
                path: executable.clone(),
                source,
            })?;
        debug!(
            profile = %attempt.profile_id,
            launcher_pid,
            baseline = attempt.baseline.len(),
            started_at = %attempt.started_at,
            deadline = ?attempt.deadline,
            "启动器已拉起"
        );

        let watcher = GameStartWatcher::new(
            self.host.as_ref(),
            &self.options.game_process_names,
            self.options.poll_interval,
        );
        let process = watcher
            .wait(&attempt.baseline, timeout, &internal, loading.as_deref())
            .await?;

        self.registry.track(&attempt.profile_id, Arc::clone(&process))?;

        Ok(LaunchedProfile {
            profile_id: attempt.profile_id,
            pid: process.pid(),
            process_name: process.name().to_string(),
            launcher_pid,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::launcher::surface::Headless;
    use crate::core::launcher::testing::{FakeHost, RecordingOwner, SpawnPlan};
    use crate::core::launcher::watcher::WAITING_STATUS;
    use std::sync::atomic::Ordering;

    struct Fixture {
        _tmp: tempfile::TempDir,
        host: Arc<FakeHost>,
        launcher: ProfileLauncher,
        config: LaunchConfig,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let exe = tmp.path().join("XIVLauncher.exe");
        std::fs::write(&exe, b"").unwrap();
        let host = Arc::new(FakeHost::new());
        let launcher = ProfileLauncher::new(
            host.clone(),
            ProcessRegistry::new(),
            LaunchOptions::default(),
        );
        let config = LaunchConfig {
            launcher_path: exe,
            storage_root: tmp.path().join("data"),
        };
        Fixture {
            _tmp: tmp,
            host,
            launcher,
            config,
        }
    }

    fn profile(n: u32) -> Profile {
        Profile::new(ProfileId::from(n), format!("Character {}", n))
    }

    #[tokio::test(start_paused = true)]
    async fn launches_and_tracks_new_game_process() {
        let f = fixture();
        f.host.add_running(100, "ffxiv_dx11");
        f.host.add_running(101, "ffxiv_dx11");
        f.host.plan(SpawnPlan::Launch {
            launcher_pid: 500,
            game: Some((777, "ffxiv_dx11", Duration::from_secs(4))),
        });
        let owner = RecordingOwner::default();

        let outcome = f
            .launcher
            .launch(&profile(1), &f.config, &owner, None, None)
            .await;

        let launched = match outcome {
            LaunchOutcome::Launched(l) => l,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(launched.pid, 777);
        assert_eq!(launched.launcher_pid, 500);
        assert_eq!(launched.process_name, "ffxiv_dx11");
        assert_eq!(
            f.launcher.registry().try_get_profile_id(777),
            Some(ProfileId::from(1))
        );

        assert_eq!(owner.toggles(), vec![false, true]);
        assert_eq!(owner.opened.load(Ordering::SeqCst), 1);
        assert_eq!(owner.closed.load(Ordering::SeqCst), 1);
        assert!(owner
            .statuses
            .lock()
            .unwrap()
            .iter()
            .any(|s| s == WAITING_STATUS));
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_uses_sandbox_environment() {
        let f = fixture();
        f.host.plan(SpawnPlan::Launch {
            launcher_pid: 500,
            game: Some((777, "ffxiv", Duration::ZERO)),
        });

        let outcome = f
            .launcher
            .launch(&profile(4), &f.config, &Headless, None, None)
            .await;
        assert!(outcome.is_launched());

        let spawned = f.host.spawned();
        assert_eq!(spawned.len(), 1);
        let request = &spawned[0];
        assert_eq!(request.executable, f.config.launcher_path);
        assert!(request.working_dir.ends_with("Characters/4"));
        assert!(request.working_dir.is_dir());
        let home = request
            .env
            .iter()
            .find(|(k, _)| k == "HOME")
            .map(|(_, v)| PathBuf::from(v));
        assert_eq!(home.as_ref(), Some(&request.working_dir));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_executable_is_not_found() {
        let mut f = fixture();
        f.config.launcher_path = f.config.storage_root.join("nope.exe");
        let owner = RecordingOwner::default();

        let outcome = f
            .launcher
            .launch(&profile(1), &f.config, &owner, None, None)
            .await;

        assert!(matches!(outcome.error(), Some(LaunchError::NotFound(_))));
        assert!(f.host.spawned().is_empty());
        assert!(owner.toggles().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn profile_executable_overrides_launcher_path() {
        let f = fixture();
        let mut p = profile(2);
        p.executable_path = Some(f.config.storage_root.join("custom.exe"));

        let outcome = f.launcher.launch(&p, &f.config, &Headless, None, None).await;
        match outcome.error() {
            Some(LaunchError::NotFound(path)) => assert!(path.ends_with("custom.exe")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_failure_restores_interactivity() {
        let f = fixture();
        f.host.plan(SpawnPlan::Fail);
        let owner = RecordingOwner::default();

        let outcome = f
            .launcher
            .launch(&profile(1), &f.config, &owner, None, None)
            .await;

        assert!(matches!(
            outcome.error(),
            Some(LaunchError::SpawnFailed { .. })
        ));
        assert_eq!(owner.toggles(), vec![false, true]);
        assert_eq!(owner.closed.load(Ordering::SeqCst), 1);
        assert!(f.launcher.registry().list_all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn already_running_game_is_never_adopted() {
        let f = fixture();
        f.host.add_running(100, "ffxiv_dx11");
        f.host.plan(SpawnPlan::Launch {
            launcher_pid: 500,
            game: None,
        });
        let owner = RecordingOwner::default();

        let outcome = f
            .launcher
            .launch(
                &profile(1),
                &f.config,
                &owner,
                Some(Duration::from_secs(3)),
                None,
            )
            .await;

        assert!(matches!(outcome.error(), Some(LaunchError::Timeout(_))));
        assert_eq!(owner.toggles(), vec![false, true]);
        assert_eq!(f.launcher.registry().try_get_profile_id(100), None);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_loading_surface_cancels_only_this_launch() {
        let f = fixture();
        f.host.plan(SpawnPlan::Launch {
            launcher_pid: 500,
            game: None,
        });
        let owner = RecordingOwner::default();
        let external = CancelFlag::new();

        let dismiss = async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            owner.dismiss_loading();
        };
        let target = profile(1);
        let (outcome, _) = tokio::join!(
            f.launcher
                .launch(&target, &f.config, &owner, None, Some(&external)),
            dismiss
        );

        assert!(matches!(outcome, LaunchOutcome::Cancelled));
        assert!(!external.is_cancelled());
        assert_eq!(owner.toggles(), vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn external_cancel_stops_waiting() {
        let f = fixture();
        f.host.plan(SpawnPlan::Launch {
            launcher_pid: 500,
            game: None,
        });
        let owner = RecordingOwner::default();
        let external = CancelFlag::new();

        let trigger = external.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let outcome = f
            .launcher
            .launch(&profile(1), &f.config, &owner, None, Some(&external))
            .await;

        assert!(matches!(outcome, LaunchOutcome::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(90));
        assert_eq!(owner.toggles(), vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_launch_does_not_spawn() {
        let f = fixture();
        let external = CancelFlag::new();
        external.cancel();

        let outcome = f
            .launcher
            .launch(&profile(1), &f.config, &Headless, None, Some(&external))
            .await;

        assert!(matches!(outcome, LaunchOutcome::Cancelled));
        assert!(f.host.spawned().is_empty());
    }
}
