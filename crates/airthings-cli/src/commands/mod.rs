//! Command implementations for the CLI.

mod config;
mod info;
mod read;
mod scan;

pub use config::cmd_config;
pub use info::{cmd_info, collect_info};
pub use read::{cmd_read, read_devices};
pub use scan::cmd_scan;
