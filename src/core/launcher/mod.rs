//! 多角色启动编排：沙盒、进程快照、等待游戏进程、进程登记与批量启动。

pub mod cancel;
pub mod character;
pub mod group;
pub mod registry;
pub mod sandbox;
pub mod snapshot;
pub mod surface;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::CancelFlag;
pub use character::{LaunchConfig, LaunchOptions, LaunchedProfile, ProfileLauncher};
pub use group::{GroupLauncher, GroupOutcome, GroupReport};
pub use registry::{ProcessRegistry, TrackedProcess};
pub use surface::{GroupProgress, Headless, Interactable, LoadingSurface, OwnerContext};
