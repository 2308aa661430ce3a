use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::result::LaunchError;

/// 路径中不允许出现的字符：ID 会直接作为沙盒目录名
const RESERVED_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// 角色（profile）的稳定标识
///
/// 配置里既可以写数字 (`id = 3`) 也可以写字符串 (`id = "alt-3"`)。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawProfileId", into = "String")]
pub struct ProfileId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawProfileId {
    Number(u64),
    Text(String),
}

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Result<Self, LaunchError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(LaunchError::InvalidArgument("profile id is empty".into()));
        }
        if id == "." || id == ".." {
            return Err(LaunchError::InvalidArgument(format!(
                "profile id '{}' is not a valid directory name",
                id
            )));
        }
        if id
            .chars()
            .any(|c| c.is_control() || RESERVED_CHARS.contains(&c))
        {
            return Err(LaunchError::InvalidArgument(format!(
                "profile id '{}' contains reserved characters",
                id
            )));
        }
        Ok(ProfileId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u32> for ProfileId {
    fn from(n: u32) -> Self {
        ProfileId(n.to_string())
    }
}

impl TryFrom<RawProfileId> for ProfileId {
    type Error = LaunchError;

    fn try_from(raw: RawProfileId) -> Result<Self, Self::Error> {
        match raw {
            RawProfileId::Number(n) => Ok(ProfileId(n.to_string())),
            RawProfileId::Text(s) => ProfileId::new(s),
        }
    }
}

impl From<ProfileId> for String {
    fn from(id: ProfileId) -> Self {
        id.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// 一个角色配置（只读，由配置文件提供）
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    /// 覆盖全局启动器路径（可选）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<PathBuf>,
    #[serde(default)]
    pub group_ids: Vec<u32>,
}

impl Profile {
    pub fn new(id: ProfileId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            executable_path: None,
            group_ids: Vec::new(),
        }
    }

    /// 角色自己的路径优先，否则使用全局启动器
    pub fn resolve_executable(&self, launcher_path: &std::path::Path) -> PathBuf {
        self.executable_path
            .clone()
            .unwrap_or_else(|| launcher_path.to_path_buf())
    }
}
