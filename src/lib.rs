pub mod commands;
pub mod config;
pub mod core;
pub mod result;
pub mod utils;

pub use crate::core::launcher::{
    CancelFlag, GroupLauncher, GroupOutcome, LaunchConfig, LaunchOptions, LaunchedProfile,
    ProcessRegistry, ProfileLauncher,
};
pub use crate::core::profile::{Profile, ProfileId};
pub use crate::result::{LaunchError, LaunchOutcome};
