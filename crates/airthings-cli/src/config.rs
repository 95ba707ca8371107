//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use airthings_core::AcquisitionConfig;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::cli::{ConfigKey, OutputFormat, TuningArgs};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default device addresses
    #[serde(default)]
    pub devices: Vec<String>,

    /// Default output format
    #[serde(default)]
    pub format: Option<String>,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,

    /// Show alarm severities next to readings
    #[serde(default = "default_true")]
    pub show_alarms: bool,

    /// Retry budgets and pacing, in seconds
    #[serde(default)]
    pub acquisition: AcquisitionSettings,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            format: None,
            no_color: false,
            show_alarms: true,
            acquisition: AcquisitionSettings::default(),
        }
    }
}

/// The `[acquisition]` table.
///
/// Every field is optional; unset fields keep the library default. Sleeps
/// and timeouts are fractional seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescan_sleep: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_sleep: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refetch_sleep: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_device_sleep: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_fetch_sleep: Option<f64>,
}

impl AcquisitionSettings {
    /// Overlay these settings on a base configuration.
    pub fn apply(&self, base: AcquisitionConfig) -> Result<AcquisitionConfig> {
        let mut config = base;
        if let Some(v) = self.scan_attempts {
            config = config.scan_attempts(v);
        }
        if let Some(v) = self.scan_timeout {
            config = config.scan_timeout(seconds("scan_timeout", v)?);
        }
        if let Some(v) = self.rescan_sleep {
            config = config.rescan_sleep(seconds("rescan_sleep", v)?);
        }
        if let Some(v) = self.connect_attempts {
            config = config.connect_attempts(v);
        }
        if let Some(v) = self.reconnect_sleep {
            config = config.reconnect_sleep(seconds("reconnect_sleep", v)?);
        }
        if let Some(v) = self.fetch_attempts {
            config = config.fetch_attempts(v);
        }
        if let Some(v) = self.refetch_sleep {
            config = config.refetch_sleep(seconds("refetch_sleep", v)?);
        }
        if let Some(v) = self.next_device_sleep {
            config = config.next_device_sleep(seconds("next_device_sleep", v)?);
        }
        if let Some(v) = self.before_fetch_sleep {
            config = config.before_fetch_sleep(seconds("before_fetch_sleep", v)?);
        }
        Ok(config)
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{name} must be a non-negative number of seconds, got {value}"))
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("airthings")
            .join("config.toml")
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from a file, or return default if it is missing or invalid
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save config to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// The configured output format, if it names a known one
    pub fn output_format(&self) -> Option<OutputFormat> {
        match self.format.as_deref()?.to_ascii_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }

    /// Build the acquisition configuration from the file and per-run flags.
    ///
    /// Precedence is flags, then the `[acquisition]` table, then the preset.
    pub fn acquisition_config(&self, tuning: &TuningArgs) -> Result<AcquisitionConfig> {
        let base = if tuning.patient {
            AcquisitionConfig::patient()
        } else {
            AcquisitionConfig::default()
        };
        let mut config = self.acquisition.apply(base)?;

        if let Some(v) = tuning.connect_attempts {
            config = config.connect_attempts(v);
        }
        if let Some(v) = tuning.fetch_attempts {
            config = config.fetch_attempts(v);
        }
        if let Some(v) = tuning.scan_timeout {
            config = config.scan_timeout(seconds("scan_timeout", v)?);
        }

        config.validate().context("Invalid acquisition settings")?;
        Ok(config)
    }

    /// Current value of a key, rendered for display
    pub fn get(&self, key: ConfigKey) -> Option<String> {
        let a = &self.acquisition;
        match key {
            ConfigKey::Device => (!self.devices.is_empty()).then(|| self.devices.join(",")),
            ConfigKey::Format => self.format.clone(),
            ConfigKey::NoColor => Some(self.no_color.to_string()),
            ConfigKey::ShowAlarms => Some(self.show_alarms.to_string()),
            ConfigKey::ScanAttempts => a.scan_attempts.map(|v| v.to_string()),
            ConfigKey::ScanTimeout => a.scan_timeout.map(|v| v.to_string()),
            ConfigKey::ConnectAttempts => a.connect_attempts.map(|v| v.to_string()),
            ConfigKey::ReconnectSleep => a.reconnect_sleep.map(|v| v.to_string()),
            ConfigKey::FetchAttempts => a.fetch_attempts.map(|v| v.to_string()),
            ConfigKey::RefetchSleep => a.refetch_sleep.map(|v| v.to_string()),
        }
    }

    /// Parse and store a value for a key
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<()> {
        let a = &mut self.acquisition;
        match key {
            ConfigKey::Device => {
                self.devices = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            ConfigKey::Format => {
                let format = value.to_ascii_lowercase();
                if !matches!(format.as_str(), "text" | "json" | "csv") {
                    bail!("Invalid format '{}'. Expected text, json or csv", value);
                }
                self.format = Some(format);
            }
            ConfigKey::NoColor => self.no_color = parse_bool(value)?,
            ConfigKey::ShowAlarms => self.show_alarms = parse_bool(value)?,
            ConfigKey::ScanAttempts => a.scan_attempts = Some(parse_attempts(value)?),
            ConfigKey::ScanTimeout => a.scan_timeout = Some(parse_seconds(value)?),
            ConfigKey::ConnectAttempts => a.connect_attempts = Some(parse_attempts(value)?),
            ConfigKey::ReconnectSleep => a.reconnect_sleep = Some(parse_seconds(value)?),
            ConfigKey::FetchAttempts => a.fetch_attempts = Some(parse_attempts(value)?),
            ConfigKey::RefetchSleep => a.refetch_sleep = Some(parse_seconds(value)?),
        }
        Ok(())
    }

    /// Reset a key to its default
    pub fn unset(&mut self, key: ConfigKey) {
        let a = &mut self.acquisition;
        match key {
            ConfigKey::Device => self.devices.clear(),
            ConfigKey::Format => self.format = None,
            ConfigKey::NoColor => self.no_color = false,
            ConfigKey::ShowAlarms => self.show_alarms = true,
            ConfigKey::ScanAttempts => a.scan_attempts = None,
            ConfigKey::ScanTimeout => a.scan_timeout = None,
            ConfigKey::ConnectAttempts => a.connect_attempts = None,
            ConfigKey::ReconnectSleep => a.reconnect_sleep = None,
            ConfigKey::FetchAttempts => a.fetch_attempts = None,
            ConfigKey::RefetchSleep => a.refetch_sleep = None,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => bail!("Invalid boolean '{}'. Expected true or false", value),
    }
}

fn parse_attempts(value: &str) -> Result<u32> {
    let attempts: u32 = value
        .parse()
        .with_context(|| format!("Invalid attempt count '{}'", value))?;
    if attempts == 0 {
        bail!("Attempt counts must be at least 1");
    }
    Ok(attempts)
}

fn parse_seconds(value: &str) -> Result<f64> {
    let secs: f64 = value
        .parse()
        .with_context(|| format!("Invalid number of seconds '{}'", value))?;
    seconds("value", secs)?;
    Ok(secs)
}

/// Resolve devices from args, falling back to the configured defaults.
pub fn resolve_devices(devices: Vec<String>, config: &Config) -> Vec<String> {
    if devices.is_empty() {
        config.devices.clone()
    } else {
        devices
    }
}
