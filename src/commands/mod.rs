pub mod console;
pub mod launch;

pub use console::{ConsoleOwner, ConsoleProgress};
pub use launch::{describe_profiles, launch_group, launch_profile, watch_until_exit, AppContext};
