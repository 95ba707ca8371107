//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// Device selection shared by the commands that talk to sensors
#[derive(Debug, Clone, Default, Args)]
pub struct DeviceArgs {
    /// Device address(es) - can be specified multiple times, or comma-separated
    #[arg(short, long, value_delimiter = ',', env = "AIRTHINGS_DEVICE")]
    pub device: Vec<String>,

    /// Serial number(s) or 6-digit identifier(s) to discover
    #[arg(short, long, value_delimiter = ',', conflicts_with = "device")]
    pub serial: Vec<String>,
}

impl DeviceArgs {
    /// Whether neither addresses nor serial numbers were given.
    pub fn is_empty(&self) -> bool {
        self.device.is_empty() && self.serial.is_empty()
    }
}

/// Acquisition tuning that overrides the config file for one run
#[derive(Debug, Clone, Default, Args)]
pub struct TuningArgs {
    /// Maximum connect attempts per device
    #[arg(long)]
    pub connect_attempts: Option<u32>,

    /// Maximum fetch attempts per device
    #[arg(long)]
    pub fetch_attempts: Option<u32>,

    /// Duration of each scan in seconds
    #[arg(long)]
    pub scan_timeout: Option<f64>,

    /// Use the patient preset for devices at the edge of range
    #[arg(long)]
    pub patient: bool,
}

#[derive(Parser)]
#[command(name = "airthings")]
#[command(author, version, about = "CLI for Airthings Wave sensors", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Output as JSON (shorthand for --format json)
    #[arg(long, global = true, conflicts_with = "format")]
    pub json: bool,

    /// Output compact JSON (no pretty-printing)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Omit header row in CSV output
    #[arg(long, global = true)]
    pub no_header: bool,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// The requested format, if any flag selected one.
    pub fn requested_format(&self) -> Option<OutputFormat> {
        if self.json {
            Some(OutputFormat::Json)
        } else {
            self.format
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan for nearby Airthings devices
    Scan {
        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Read current sensor values from one or more devices
    Read {
        #[command(flatten)]
        devices: DeviceArgs,

        #[command(flatten)]
        tuning: TuningArgs,

        /// Keep going when a device fails instead of stopping the batch
        #[arg(long)]
        isolate: bool,

        /// Hide alarm severities (overrides config)
        #[arg(long)]
        no_alarms: bool,
    },

    /// Display firmware and hardware revisions of a device
    Info {
        #[command(flatten)]
        devices: DeviceArgs,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Valid configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Default device addresses (comma-separated)
    Device,
    /// Default output format
    Format,
    /// Disable colored output
    NoColor,
    /// Show alarm severities next to readings
    ShowAlarms,
    /// Maximum scan attempts
    ScanAttempts,
    /// Duration of each scan in seconds
    ScanTimeout,
    /// Maximum connect attempts per device
    ConnectAttempts,
    /// Sleep between connect attempts in seconds
    ReconnectSleep,
    /// Maximum fetch attempts per device
    FetchAttempts,
    /// Sleep between fetch attempts in seconds
    RefetchSleep,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        value: String,
    },

    /// Unset (remove) a configuration value
    Unset {
        /// Configuration key to remove
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Show the config file path
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
