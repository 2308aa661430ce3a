use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::launcher::LaunchedProfile;

/// 启动流程的错误分类
#[derive(Debug, Error)]
pub enum LaunchError {
    /// 启动器可执行文件不存在或路径无效
    #[error("Launcher executable not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to start {}: {source}", path.display())]
    SpawnFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No new game process appeared within {0:?}")]
    Timeout(Duration),

    /// 用户关闭加载窗口或外部取消，属于正常操作
    #[error("Launch cancelled")]
    Cancelled,

    #[error("Sandbox storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Group {0} not found")]
    UnknownGroup(u32),
}

impl LaunchError {
    /// 只是提示，不算错误（空分组由 `GroupOutcome::NothingToLaunch` 表示）
    pub fn is_informational(&self) -> bool {
        matches!(self, LaunchError::Cancelled)
    }

    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LaunchError::Storage {
            path: path.into(),
            source,
        }
    }
}

/// 单个角色启动的结果
#[derive(Debug)]
pub enum LaunchOutcome {
    Launched(LaunchedProfile),
    Cancelled,
    Failed(LaunchError),
}

impl LaunchOutcome {
    pub fn is_launched(&self) -> bool {
        matches!(self, LaunchOutcome::Launched(_))
    }

    pub fn error(&self) -> Option<&LaunchError> {
        match self {
            LaunchOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// 命令行退出码：成功、取消都算正常结束
    pub fn is_success(&self) -> bool {
        match self {
            LaunchOutcome::Launched(_) | LaunchOutcome::Cancelled => true,
            LaunchOutcome::Failed(e) => e.is_informational(),
        }
    }
}

impl From<Result<LaunchedProfile, LaunchError>> for LaunchOutcome {
    fn from(r: Result<LaunchedProfile, LaunchError>) -> Self {
        match r {
            Ok(v) => LaunchOutcome::Launched(v),
            Err(LaunchError::Cancelled) => LaunchOutcome::Cancelled,
            Err(e) => LaunchOutcome::Failed(e),
        }
    }
}
