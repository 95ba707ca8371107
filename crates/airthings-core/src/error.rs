//! Error types for airthings-core.
//!
//! There are two layers. [`TransportError`] is what the radio reports: a
//! link drop, a generic failure or a timeout. [`Error`] is what the
//! acquisition pipeline reports: it wraps transport and decode failures and
//! adds the exhaustion errors produced when a retry budget runs out.
//!
//! # Retry classification
//!
//! | Error | Retried | Notes |
//! |-------|---------|-------|
//! | [`Error::Transport`] | Yes | The radio link is inherently unreliable |
//! | [`Error::Parse`] | No | The same bytes or model number never decode |
//! | [`Error::ScanExhausted`] | No | Raise `scan_attempts`, `scan_timeout` or `rescan_sleep` |
//! | [`Error::ConnectExhausted`] | No | Raise `connect_attempts` or `reconnect_sleep` |
//! | [`Error::FetchExhausted`] | No | Raise `fetch_attempts` or `refetch_sleep` |
//! | [`Error::DeviceNotFound`] | No | Device not in range or wrong address |
//! | [`Error::Cancelled`] | No | Operation was intentionally cancelled |
//! | [`Error::InvalidConfig`] | No | Fix configuration and restart |

use std::time::Duration;

use airthings_types::ParseError;
use thiserror::Error;

/// Failures reported by a [`Transport`](crate::Transport).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The link to the device dropped.
    #[error("Device {address} disconnected")]
    Disconnected {
        /// Address of the device that dropped.
        address: String,
    },

    /// A radio operation failed.
    #[error("Transport operation '{operation}' failed: {reason}")]
    Failed {
        /// The operation that failed.
        operation: String,
        /// Description reported by the radio stack.
        reason: String,
    },

    /// A radio operation did not complete in time.
    #[error("Transport operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },
}

impl TransportError {
    /// Create a disconnect error for a device address.
    pub fn disconnected(address: impl Into<String>) -> Self {
        Self::Disconnected {
            address: address.into(),
        }
    }

    /// Create a failure with operation context.
    pub fn failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Whether this failure means the link was lost.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}

/// Errors produced by the acquisition pipeline.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An identity or payload could not be decoded.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Every scan attempt failed.
    #[error(
        "Out of scan attempts, try raising the scan_attempts value (currently: {attempts} times), \
         the scan_timeout value (currently: {scan_timeout:?}), \
         or the rescan_sleep value (currently: {rescan_sleep:?})"
    )]
    ScanExhausted {
        attempts: u32,
        scan_timeout: Duration,
        rescan_sleep: Duration,
        /// The failure of the final attempt.
        #[source]
        last_error: Box<Error>,
    },

    /// Every connect attempt to a device failed.
    #[error(
        "Out of connect attempts for {address}, try raising the connect_attempts value \
         (currently: {attempts} times), the reconnect_sleep value (currently: {reconnect_sleep:?}) \
         or the next_device_sleep value (currently: {next_device_sleep:?})"
    )]
    ConnectExhausted {
        address: String,
        attempts: u32,
        reconnect_sleep: Duration,
        next_device_sleep: Duration,
        /// The failure of the final attempt.
        #[source]
        last_error: Box<Error>,
    },

    /// Every fetch attempt from a device failed.
    #[error(
        "Out of fetch attempts for {address}, try raising the fetch_attempts value \
         (currently: {attempts} times) or the refetch_sleep value (currently: {refetch_sleep:?})"
    )]
    FetchExhausted {
        address: String,
        attempts: u32,
        refetch_sleep: Duration,
        /// The failure of the final attempt.
        #[source]
        last_error: Box<Error>,
    },

    /// A radio operation failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Device not found during scan or lookup.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Reason why a device was not found.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// Device with the specified address or serial number was not seen.
    NotFound { identifier: String },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { identifier } => write!(f, "device '{}' not found", identifier),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether another try of the same operation may succeed.
    ///
    /// Only transport failures are retryable; everything else is either
    /// permanent or already the outcome of a retry budget.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Whether this error is a lost link.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Error::Transport(e) if e.is_disconnect())
    }

    /// Whether this error is one of the retry-exhaustion errors.
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            Error::ScanExhausted { .. } | Error::ConnectExhausted { .. } | Error::FetchExhausted { .. }
        )
    }
}

/// Result type alias using airthings-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
