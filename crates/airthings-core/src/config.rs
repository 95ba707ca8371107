//! Acquisition tunables.
//!
//! Every retry budget and pacing delay the pipeline uses lives in one
//! [`AcquisitionConfig`]. The defaults suit a handful of devices in the same
//! room; use [`AcquisitionConfig::patient`] for devices at the edge of
//! range.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Default number of scan attempts.
pub const DEFAULT_SCAN_ATTEMPTS: u32 = 5;
/// Default duration of a single scan.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(3);
/// Default sleep between failed scans.
pub const DEFAULT_RESCAN_SLEEP: Duration = Duration::from_secs(1);
/// Default number of connect attempts per device.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 6;
/// Default sleep between failed connects.
pub const DEFAULT_RECONNECT_SLEEP: Duration = Duration::from_secs(10);
/// Default number of fetch attempts per device.
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
/// Default sleep between failed fetches.
pub const DEFAULT_REFETCH_SLEEP: Duration = Duration::from_secs(5);
/// Default pause after each device in a batch.
pub const DEFAULT_NEXT_DEVICE_SLEEP: Duration = Duration::from_millis(100);
/// Default pause between discovery and the first fetch.
pub const DEFAULT_BEFORE_FETCH_SLEEP: Duration = Duration::from_secs(3);

/// Retry budgets and pacing for the acquisition pipeline.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use airthings_core::AcquisitionConfig;
///
/// let config = AcquisitionConfig::default()
///     .connect_attempts(10)
///     .reconnect_sleep(Duration::from_secs(15));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Maximum number of scan tries.
    pub scan_attempts: u32,
    /// How long each scan listens for advertisements.
    pub scan_timeout: Duration,
    /// Sleep after a failed scan.
    pub rescan_sleep: Duration,
    /// Maximum number of connect tries per device.
    pub connect_attempts: u32,
    /// Sleep after a failed connect.
    pub reconnect_sleep: Duration,
    /// Maximum number of fetch tries per device.
    pub fetch_attempts: u32,
    /// Sleep after a failed fetch.
    pub refetch_sleep: Duration,
    /// Pause after each device finishes in a batch.
    pub next_device_sleep: Duration,
    /// Pause once between discovery or identification and the first fetch.
    pub before_fetch_sleep: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            scan_attempts: DEFAULT_SCAN_ATTEMPTS,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            rescan_sleep: DEFAULT_RESCAN_SLEEP,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            reconnect_sleep: DEFAULT_RECONNECT_SLEEP,
            fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
            refetch_sleep: DEFAULT_REFETCH_SLEEP,
            next_device_sleep: DEFAULT_NEXT_DEVICE_SLEEP,
            before_fetch_sleep: DEFAULT_BEFORE_FETCH_SLEEP,
        }
    }
}

impl AcquisitionConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for devices at the edge of range or behind walls.
    ///
    /// Longer scans and more attempts, at the cost of slower failure
    /// detection.
    pub fn patient() -> Self {
        Self {
            scan_attempts: 8,
            scan_timeout: Duration::from_secs(6),
            rescan_sleep: Duration::from_secs(2),
            connect_attempts: 10,
            reconnect_sleep: Duration::from_secs(15),
            fetch_attempts: 5,
            refetch_sleep: Duration::from_secs(8),
            next_device_sleep: Duration::from_secs(1),
            before_fetch_sleep: Duration::from_secs(5),
        }
    }

    /// Settings for a nearby device with a strong signal.
    pub fn quick() -> Self {
        Self {
            scan_attempts: 2,
            scan_timeout: Duration::from_secs(2),
            rescan_sleep: Duration::from_millis(500),
            connect_attempts: 2,
            reconnect_sleep: Duration::from_secs(2),
            fetch_attempts: 2,
            refetch_sleep: Duration::from_secs(1),
            next_device_sleep: Duration::from_millis(100),
            before_fetch_sleep: Duration::from_millis(500),
        }
    }

    #[must_use]
    pub fn scan_attempts(mut self, attempts: u32) -> Self {
        self.scan_attempts = attempts;
        self
    }

    #[must_use]
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    #[must_use]
    pub fn rescan_sleep(mut self, sleep: Duration) -> Self {
        self.rescan_sleep = sleep;
        self
    }

    #[must_use]
    pub fn connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn reconnect_sleep(mut self, sleep: Duration) -> Self {
        self.reconnect_sleep = sleep;
        self
    }

    #[must_use]
    pub fn fetch_attempts(mut self, attempts: u32) -> Self {
        self.fetch_attempts = attempts;
        self
    }

    #[must_use]
    pub fn refetch_sleep(mut self, sleep: Duration) -> Self {
        self.refetch_sleep = sleep;
        self
    }

    #[must_use]
    pub fn next_device_sleep(mut self, sleep: Duration) -> Self {
        self.next_device_sleep = sleep;
        self
    }

    #[must_use]
    pub fn before_fetch_sleep(mut self, sleep: Duration) -> Self {
        self.before_fetch_sleep = sleep;
        self
    }

    /// Reject configurations that can never succeed.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("scan_attempts", self.scan_attempts),
            ("connect_attempts", self.connect_attempts),
            ("fetch_attempts", self.fetch_attempts),
        ] {
            if value == 0 {
                return Err(Error::invalid_config(format!("{name} must be at least 1")));
            }
        }
        if self.scan_timeout.is_zero() {
            return Err(Error::invalid_config("scan_timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Retry policy for scanning.
    pub fn scan_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.scan_attempts, self.rescan_sleep)
    }

    /// Retry policy for connecting.
    pub fn connect_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.connect_attempts, self.reconnect_sleep)
    }

    /// Retry policy for fetching.
    pub fn fetch_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.fetch_attempts, self.refetch_sleep)
    }
}
