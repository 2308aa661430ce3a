use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::core::profile::ProfileId;
use crate::result::LaunchError;

/// 所有角色沙盒所在的子目录名
pub const CHARACTERS_DIR: &str = "Characters";

/// 某个角色的隔离存储路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSandbox {
    pub root_dir: PathBuf,
    pub home_dir: PathBuf,
    pub app_data_dir: PathBuf,
    pub documents_dir: PathBuf,
}

impl LaunchSandbox {
    /// 纯计算，不访问文件系统
    pub fn resolve(storage_root: &Path, profile_id: &ProfileId) -> Self {
        let root_dir = storage_root.join(CHARACTERS_DIR).join(profile_id.as_str());
        Self {
            home_dir: root_dir.clone(),
            app_data_dir: root_dir.join("AppData"),
            documents_dir: root_dir.join("Documents"),
            root_dir,
        }
    }

    /// 重定向 home / appdata / documents 的环境变量
    pub fn env_overrides(&self) -> Vec<(String, OsString)> {
        let home = self.home_dir.as_os_str();
        let app_data = self.app_data_dir.as_os_str();

        let mut env: Vec<(String, OsString)> = vec![
            ("USERPROFILE".into(), home.into()),
            ("HOMEPATH".into(), home.into()),
            ("HOME".into(), home.into()),
            ("APPDATA".into(), app_data.into()),
            ("LOCALAPPDATA".into(), app_data.into()),
            ("XDG_CONFIG_HOME".into(), app_data.into()),
            ("XDG_DATA_HOME".into(), app_data.into()),
            ("DOCUMENTS".into(), self.documents_dir.as_os_str().into()),
        ];

        // 只有带盘符前缀的平台才有 HOMEDRIVE
        if let Some(Component::Prefix(prefix)) = self.home_dir.components().next() {
            env.push(("HOMEDRIVE".into(), prefix.as_os_str().into()));
        }
        env
    }
}

/// 把 "My Games/Foo" 这类配置拆成路径段，忽略空段和 `.`/`..`
fn relative_subdir(raw: &str) -> PathBuf {
    raw.split(['/', '\\'])
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .collect()
}

/// 负责创建沙盒目录树
#[derive(Debug, Clone, Default)]
pub struct SandboxBuilder {
    documents_subdirs: Vec<PathBuf>,
}

impl SandboxBuilder {
    pub fn new<S: AsRef<str>>(documents_subdirs: &[S]) -> Self {
        Self {
            documents_subdirs: documents_subdirs
                .iter()
                .map(|s| relative_subdir(s.as_ref()))
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
        }
    }

    /// 计算并确保沙盒目录存在，可重复调用
    pub fn build(
        &self,
        profile_id: &ProfileId,
        storage_root: &Path,
    ) -> Result<LaunchSandbox, LaunchError> {
        // 环境变量里必须是绝对路径：游戏的工作目录会被切换到 home
        let storage_root = std::path::absolute(storage_root)
            .map_err(|e| LaunchError::storage(storage_root, e))?;
        let sandbox = LaunchSandbox::resolve(&storage_root, profile_id);

        let mut dirs = vec![
            sandbox.home_dir.clone(),
            sandbox.app_data_dir.clone(),
            sandbox.documents_dir.clone(),
        ];
        dirs.extend(
            self.documents_subdirs
                .iter()
                .map(|sub| sandbox.documents_dir.join(sub)),
        );

        for dir in &dirs {
            fs::create_dir_all(dir).map_err(|e| LaunchError::storage(dir, e))?;
        }

        debug!(profile = %profile_id, root = %sandbox.root_dir.display(), "沙盒目录就绪");
        Ok(sandbox)
    }
}
