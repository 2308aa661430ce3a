//! 测试用的脚本化进程主机

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::core::process::{GameProcess, Pid, ProcessHandle, ProcessHost, SpawnRequest};

use super::surface::{Interactable, LoadingSurface, OwnerContext};
use super::CancelFlag;

#[derive(Default)]
struct ExitState {
    exited: AtomicBool,
    notify: Notify,
}

#[derive(Clone)]
pub(crate) struct FakeProcess {
    pid: Pid,
    name: String,
    state: Arc<ExitState>,
}

impl std::fmt::Debug for FakeProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FakeProcess({}, {})", self.pid, self.name)
    }
}

impl FakeProcess {
    pub(crate) fn new(pid: Pid, name: &str) -> Arc<Self> {
        Arc::new(Self {
            pid,
            name: name.to_string(),
            state: Arc::default(),
        })
    }

    pub(crate) fn exit(&self) {
        self.state.exited.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }
}

impl GameProcess for FakeProcess {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn has_exited(&self) -> bool {
        self.state.exited.load(Ordering::SeqCst)
    }

    fn exited(&self) -> BoxFuture<'static, ()> {
        let state = Arc::clone(&self.state);
        async move {
            loop {
                let notified = state.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if state.exited.load(Ordering::SeqCst) {
                    return;
                }
                notified.await;
            }
        }
        .boxed()
    }
}

/// 一次 spawn 调用的剧本
pub(crate) enum SpawnPlan {
    Fail,
    /// 启动器进程立即出现；游戏进程在 `delay` 后出现
    Launch {
        launcher_pid: Pid,
        game: Option<(Pid, &'static str, Duration)>,
    },
}

struct Entry {
    process: Arc<FakeProcess>,
    visible_at: Instant,
}

pub(crate) struct FakeHost {
    entries: Mutex<Vec<Entry>>,
    plans: Mutex<VecDeque<SpawnPlan>>,
    spawned: Mutex<Vec<SpawnRequest>>,
    next_pid: AtomicU32,
}

impl FakeHost {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            plans: Mutex::new(VecDeque::new()),
            spawned: Mutex::new(Vec::new()),
            next_pid: AtomicU32::new(9000),
        }
    }

    pub(crate) fn add_running(&self, pid: Pid, name: &str) -> Arc<FakeProcess> {
        self.add_at(pid, name, Instant::now())
    }

    fn add_at(&self, pid: Pid, name: &str, visible_at: Instant) -> Arc<FakeProcess> {
        let process = FakeProcess::new(pid, name);
        self.entries.lock().unwrap().push(Entry {
            process: Arc::clone(&process),
            visible_at,
        });
        process
    }

    pub(crate) fn plan(&self, plan: SpawnPlan) {
        self.plans.lock().unwrap().push_back(plan);
    }

    pub(crate) fn spawned(&self) -> Vec<SpawnRequest> {
        self.spawned.lock().unwrap().clone()
    }
}

impl ProcessHost for FakeHost {
    fn list_processes(&self, image_name: &str) -> Vec<ProcessHandle> {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.visible_at <= now && !e.process.has_exited())
            .filter(|e| crate::core::process::image_matches(&e.process.name, image_name))
            .map(|e| Arc::clone(&e.process) as ProcessHandle)
            .collect()
    }

    fn spawn(&self, request: &SpawnRequest) -> io::Result<Pid> {
        self.spawned.lock().unwrap().push(request.clone());
        let plan = self.plans.lock().unwrap().pop_front();
        match plan {
            Some(SpawnPlan::Fail) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "spawn refused",
            )),
            Some(SpawnPlan::Launch { launcher_pid, game }) => {
                let now = Instant::now();
                self.add_at(launcher_pid, "XIVLauncher", now);
                if let Some((pid, name, delay)) = game {
                    self.add_at(pid, name, now + delay);
                }
                Ok(launcher_pid)
            }
            None => {
                let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
                self.add_running(pid, "XIVLauncher");
                Ok(pid)
            }
        }
    }
}

/// 记录交互切换、可模拟用户关闭加载界面的上下文
#[derive(Default)]
pub(crate) struct RecordingOwner {
    pub(crate) toggles: Mutex<Vec<bool>>,
    pub(crate) statuses: Arc<Mutex<Vec<String>>>,
    pub(crate) opened: AtomicU32,
    pub(crate) closed: Arc<AtomicU32>,
    /// 最近一次打开的加载界面对应的取消标志
    pub(crate) last_loading: Mutex<Option<CancelFlag>>,
}

impl RecordingOwner {
    pub(crate) fn toggles(&self) -> Vec<bool> {
        self.toggles.lock().unwrap().clone()
    }

    /// 模拟用户关闭加载窗口
    pub(crate) fn dismiss_loading(&self) {
        if let Some(cancel) = self.last_loading.lock().unwrap().as_ref() {
            cancel.cancel();
        }
    }
}

impl Interactable for RecordingOwner {
    fn set_interactive(&self, enabled: bool) {
        self.toggles.lock().unwrap().push(enabled);
    }
}

struct RecordingSurface {
    cancel: CancelFlag,
    statuses: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicU32>,
}

impl LoadingSurface for RecordingSurface {
    fn show(&self) {}

    fn set_status(&self, text: &str) {
        self.statuses.lock().unwrap().push(text.to_string());
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
    }
}

impl OwnerContext for RecordingOwner {
    fn interactable(&self) -> Option<&dyn Interactable> {
        Some(self)
    }

    fn open_loading(&self, cancel: CancelFlag) -> Option<Box<dyn LoadingSurface>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.last_loading.lock().unwrap() = Some(cancel.clone());
        Some(Box::new(RecordingSurface {
            cancel,
            statuses: Arc::clone(&self.statuses),
            closed: Arc::clone(&self.closed),
        }))
    }
}
