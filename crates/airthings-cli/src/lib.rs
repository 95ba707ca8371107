//! Command-line interface for Airthings Wave sensors.
//!
//! Reads Wave, Wave Mini, Wave Plus and Wave Gen 2 devices over Bluetooth
//! Low Energy using the retrying pipeline in [`airthings_core`].
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | Scan for nearby Airthings devices |
//! | `read` | Read current sensor values with alarm severities |
//! | `info` | Display firmware and hardware revisions |
//! | `config` | Manage CLI configuration |
//! | `completions` | Generate shell completions |
//!
//! # Output Formats
//!
//! - **Text** (default): Human-readable colored output
//! - **JSON**: Machine-readable JSON format
//! - **CSV**: One row per device (scan, info) or per sensor (read)
//!
//! # Configuration
//!
//! The CLI stores configuration in `~/.config/airthings/config.toml` (or
//! platform equivalent):
//!
//! ```toml
//! devices = ["AA:BB:CC:DD:EE:FF"]
//! format = "text"
//! show_alarms = true
//!
//! [acquisition]
//! connect_attempts = 8
//! reconnect_sleep = 15.0
//! ```
//!
//! # Environment Variables
//!
//! - `AIRTHINGS_DEVICE`: Device address(es), comma-separated
//! - `NO_COLOR`: Disable colored output when set
//! - `RUST_LOG`: Log filter when neither `--verbose` nor `--quiet` is given
//!
//! # Examples
//!
//! ```bash
//! airthings scan
//! airthings read --device AA:BB:CC:DD:EE:FF
//! airthings read --serial 058816 --json
//! airthings read --isolate --format csv --output readings.csv
//! airthings config set reconnect-sleep 15
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod format;
pub mod style;
pub mod util;

// Re-export core dependencies for convenience
pub use airthings_core;
pub use airthings_types;
