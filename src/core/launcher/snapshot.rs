use std::collections::HashSet;

use crate::core::process::{Pid, ProcessHost};

/// 当前所有目标镜像名进程的 PID 集合（尽力而为，不会失败）
pub fn snapshot<S: AsRef<str>>(host: &dyn ProcessHost, target_images: &[S]) -> HashSet<Pid> {
    target_images
        .iter()
        .flat_map(|name| host.list_processes(name.as_ref()))
        .map(|p| p.pid())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::launcher::testing::FakeHost;

    #[test]
    fn collects_all_target_variants() {
        let host = FakeHost::new();
        host.add_running(100, "ffxiv_dx11");
        host.add_running(101, "ffxiv");
        host.add_running(500, "XIVLauncher");

        let pids = snapshot(&host, &["ffxiv_dx11", "ffxiv"]);
        assert_eq!(pids, HashSet::from([100, 101]));
    }

    #[test]
    fn empty_when_nothing_matches() {
        let host = FakeHost::new();
        host.add_running(500, "XIVLauncher");
        assert!(snapshot(&host, &["ffxiv_dx11"]).is_empty());
    }
}
