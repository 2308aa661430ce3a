use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::core::process::{Pid, ProcessHandle};
use crate::core::profile::ProfileId;
use crate::result::LaunchError;

/// 注册表中某个角色对应的进程记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedProcess {
    pub profile_id: ProfileId,
    pub process_id: Pid,
    pub process_name: String,
    pub tracked_at: DateTime<Utc>,
}

struct Entry {
    process: ProcessHandle,
    tracked_at: DateTime<Utc>,
    /// 退出监听任务；替换或移除条目时取消
    observer: Option<AbortHandle>,
}

impl Entry {
    fn release(self) {
        if let Some(observer) = self.observer {
            observer.abort();
        }
    }
}

#[derive(Default)]
struct Tables {
    by_profile: DashMap<ProfileId, Entry>,
    by_pid: DashMap<Pid, ProfileId>,
}

impl Tables {
    /// 仅当两张表仍然互相指向时才移除，避免误删新登记的条目
    fn evict_pair(&self, profile_id: &ProfileId, pid: Pid) -> bool {
        let reverse = self
            .by_pid
            .remove_if(&pid, |_, owner| owner == profile_id)
            .is_some();
        let forward = self
            .by_profile
            .remove_if(profile_id, |_, entry| entry.process.pid() == pid);
        let removed = forward.is_some();
        if let Some((_, entry)) = forward {
            entry.release();
        }
        reverse || removed
    }
}

/// 角色 ⇄ 游戏进程的双向注册表。
///
/// 克隆得到的是同一张表；整个程序生命周期内应只创建一个，由顶层编排者持有。
/// 注册表只观察进程，不会结束它们。
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    tables: Arc<Tables>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记角色的游戏进程，替换该角色之前的记录；进程退出后自动移除
    pub fn track(&self, profile_id: &ProfileId, process: ProcessHandle) -> Result<(), LaunchError> {
        let pid = process.pid();
        if pid == 0 {
            return Err(LaunchError::InvalidArgument(format!(
                "process handle for profile {} has no pid",
                profile_id
            )));
        }

        // 同一个 PID 挂在别的角色下（PID 复用等情况），先清掉
        if let Some((_, other)) = self
            .tables
            .by_pid
            .remove_if(&pid, |_, owner| owner != profile_id)
        {
            warn!(pid, previous = %other, profile = %profile_id, "PID 已属于其他角色，移除旧记录");
            if let Some((_, stale)) = self
                .tables
                .by_profile
                .remove_if(&other, |_, entry| entry.process.pid() == pid)
            {
                stale.release();
            }
        }

        let fresh = Entry {
            process: Arc::clone(&process),
            tracked_at: Utc::now(),
            observer: None,
        };

        // 持有正向条目的锁更新反向表，同一角色的并发登记因此串行
        let previous = match self.tables.by_profile.entry(profile_id.clone()) {
            MapEntry::Occupied(mut slot) => {
                let previous = std::mem::replace(slot.get_mut(), fresh);
                let old_pid = previous.process.pid();
                if old_pid != pid {
                    self.tables
                        .by_pid
                        .remove_if(&old_pid, |_, owner| owner == profile_id);
                }
                self.tables.by_pid.insert(pid, profile_id.clone());
                Some(previous)
            }
            MapEntry::Vacant(slot) => {
                slot.insert(fresh);
                self.tables.by_pid.insert(pid, profile_id.clone());
                None
            }
        };
        if let Some(previous) = previous {
            debug!(profile = %profile_id, old_pid = previous.process.pid(), "替换旧的进程记录");
            previous.release();
        }

        let observer = self.subscribe(profile_id, &process);
        match self.tables.by_profile.get_mut(profile_id) {
            Some(mut entry) if entry.process.pid() == pid => entry.observer = observer,
            // 进程已经退出并被监听任务移除，或者被并发替换
            _ => {
                if let Some(observer) = observer {
                    observer.abort();
                }
            }
        }

        info!(profile = %profile_id, pid, name = process.name(), "已登记游戏进程");
        Ok(())
    }

    fn subscribe(&self, profile_id: &ProfileId, process: &ProcessHandle) -> Option<AbortHandle> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!(profile = %profile_id, "没有 tokio runtime，仅依赖查询时清理");
                return None;
            }
        };

        let exited = process.exited();
        let tables: Weak<Tables> = Arc::downgrade(&self.tables);
        let profile_id = profile_id.clone();
        let pid = process.pid();

        let task = runtime.spawn(async move {
            exited.await;
            if let Some(tables) = tables.upgrade() {
                if tables.evict_pair(&profile_id, pid) {
                    info!(profile = %profile_id, pid, "游戏进程已退出，移除记录");
                }
            }
        });
        Some(task.abort_handle())
    }

    /// 查询角色的存活进程；记录已过期时顺便清理
    pub fn try_get_process(&self, profile_id: &ProfileId) -> Option<ProcessHandle> {
        let process = self
            .tables
            .by_profile
            .get(profile_id)
            .map(|entry| Arc::clone(&entry.process))?;

        if process.has_exited() {
            warn!(profile = %profile_id, pid = process.pid(), "清理已退出的进程记录");
            self.tables.evict_pair(profile_id, process.pid());
            return None;
        }
        Some(process)
    }

    /// 反向查询：PID 属于哪个角色
    pub fn try_get_profile_id(&self, pid: Pid) -> Option<ProfileId> {
        let profile_id = self.tables.by_pid.get(&pid).map(|owner| owner.value().clone())?;
        let process = self
            .tables
            .by_profile
            .get(&profile_id)
            .map(|entry| Arc::clone(&entry.process));

        match process {
            Some(p) if p.pid() == pid && !p.has_exited() => Some(profile_id),
            _ => {
                warn!(pid, profile = %profile_id, "清理已过期的反向记录");
                self.tables.evict_pair(&profile_id, pid);
                None
            }
        }
    }

    pub fn remove_by_profile(&self, profile_id: &ProfileId) -> bool {
        match self.tables.by_profile.remove(profile_id) {
            Some((_, entry)) => {
                let pid = entry.process.pid();
                entry.release();
                self.tables
                    .by_pid
                    .remove_if(&pid, |_, owner| owner == profile_id);
                true
            }
            None => false,
        }
    }

    pub fn remove_by_pid(&self, pid: Pid) -> bool {
        match self.tables.by_pid.remove(&pid) {
            Some((_, profile_id)) => {
                if let Some((_, entry)) = self
                    .tables
                    .by_profile
                    .remove_if(&profile_id, |_, entry| entry.process.pid() == pid)
                {
                    entry.release();
                }
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let ids: Vec<ProfileId> = self
            .tables
            .by_profile
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for id in &ids {
            self.remove_by_profile(id);
        }
        debug!(count = ids.len(), "注册表已清空");
    }

    /// 所有仍存活的记录，按角色 ID 排序
    pub fn list_all(&self) -> Vec<TrackedProcess> {
        let snapshot: Vec<(ProfileId, ProcessHandle, DateTime<Utc>)> = self
            .tables
            .by_profile
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    Arc::clone(&entry.process),
                    entry.tracked_at,
                )
            })
            .collect();

        let mut alive: Vec<TrackedProcess> = snapshot
            .into_iter()
            .filter(|(_, process, _)| !process.has_exited())
            .map(|(profile_id, process, tracked_at)| TrackedProcess {
                profile_id,
                process_id: process.pid(),
                process_name: process.name().to_string(),
                tracked_at,
            })
            .collect();
        alive.sort_by(|a, b| a.profile_id.cmp(&b.profile_id));
        alive
    }
}
