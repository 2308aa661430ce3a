use std::fmt;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use sysinfo::{Pid as SysPid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use tracing::debug;

use super::{GameProcess, Pid, ProcessHandle, ProcessHost, SpawnRequest};

/// 镜像名比较：忽略大小写，忽略末尾的 `.exe`
pub fn image_matches(process_name: &str, image_name: &str) -> bool {
    fn stem(s: &str) -> &str {
        let s = s.trim();
        match s.len().checked_sub(4).and_then(|i| s.get(i..).map(|ext| (i, ext))) {
            Some((i, ext)) if i > 0 && ext.eq_ignore_ascii_case(".exe") => &s[..i],
            _ => s,
        }
    }

    let a = stem(process_name);
    !a.is_empty() && a.eq_ignore_ascii_case(stem(image_name))
}

fn lock(system: &Mutex<System>) -> MutexGuard<'_, System> {
    // 其它线程 panic 不影响进程表本身
    system.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 基于 sysinfo 的真实进程主机
pub struct SystemProcessHost {
    system: Arc<Mutex<System>>,
    exit_poll_interval: Duration,
}

impl SystemProcessHost {
    pub fn new(exit_poll_interval: Duration) -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
            exit_poll_interval,
        }
    }
}

impl ProcessHost for SystemProcessHost {
    fn list_processes(&self, image_name: &str) -> Vec<ProcessHandle> {
        let mut found: Vec<(u64, Pid, String)> = {
            let mut sys = lock(&self.system);
            sys.refresh_processes_specifics(
                ProcessesToUpdate::All,
                true,
                ProcessRefreshKind::nothing(),
            );
            sys.processes()
                .iter()
                .filter(|(_, p)| p.status() != ProcessStatus::Zombie)
                .filter_map(|(pid, p)| {
                    let name = p.name().to_string_lossy();
                    image_matches(&name, image_name)
                        .then(|| (p.start_time(), pid.as_u32(), name.into_owned()))
                })
                .collect()
        };

        // HashMap 顺序不稳定：按启动时间、PID 排序作为“枚举顺序”
        found.sort();

        found
            .into_iter()
            .map(|(start_time, pid, name)| {
                Arc::new(OsProcess {
                    pid,
                    name,
                    start_time,
                    system: Arc::clone(&self.system),
                    exit_poll_interval: self.exit_poll_interval,
                }) as ProcessHandle
            })
            .collect()
    }

    fn spawn(&self, request: &SpawnRequest) -> io::Result<Pid> {
        let child = tokio::process::Command::new(&request.executable)
            .current_dir(&request.working_dir)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_os_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .spawn()?;

        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("spawned process has no pid"))?;
        debug!(pid, executable = %request.executable.display(), "进程已创建");

        // 不等待子进程：drop 后由 tokio 在后台回收
        Ok(pid)
    }
}

/// 通过 sysinfo 观察的 OS 进程
struct OsProcess {
    pid: Pid,
    name: String,
    start_time: u64,
    system: Arc<Mutex<System>>,
    exit_poll_interval: Duration,
}

impl fmt::Debug for OsProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsProcess")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("start_time", &self.start_time)
            .finish()
    }
}

fn probe_exited(system: &Mutex<System>, pid: Pid, start_time: u64) -> bool {
    let spid = SysPid::from_u32(pid);
    let mut sys = lock(system);
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[spid]),
        true,
        ProcessRefreshKind::nothing(),
    );
    match sys.process(spid) {
        // 启动时间不同说明 PID 已被复用
        Some(p) => p.start_time() != start_time || p.status() == ProcessStatus::Zombie,
        None => true,
    }
}

impl GameProcess for OsProcess {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn has_exited(&self) -> bool {
        probe_exited(&self.system, self.pid, self.start_time)
    }

    fn exited(&self) -> BoxFuture<'static, ()> {
        let system = Arc::clone(&self.system);
        let (pid, start_time, interval) = (self.pid, self.start_time, self.exit_poll_interval);
        async move {
            while !probe_exited(&system, pid, start_time) {
                tokio::time::sleep(interval).await;
            }
        }
        .boxed()
    }
}
