//! Bounded retry for radio operations.
//!
//! A [`RetryPolicy`] allows at most `max_attempts` tries with a constant
//! sleep between them. Success after `k` failures has slept exactly `k`
//! times; the final failed try is never followed by a sleep. A try that
//! fails with an error that is not [retryable](Error::is_retryable) stops the
//! loop at once. Every sleep races a [`CancellationToken`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use airthings_core::{Error, RetryPolicy, with_retry};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Error> {
//! let policy = RetryPolicy::new(3, Duration::from_secs(1));
//! let cancel = CancellationToken::new();
//!
//! let value = with_retry(&policy, "read_sensor", &cancel, || async {
//!     Ok::<_, Error>(42)
//! })
//! .await
//! .map_err(|e| e.into_error(|_, last| last))?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How many times to try an operation and how long to sleep in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of tries, including the first.
    pub max_attempts: u32,
    /// Sleep after each failed try that is not the last.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A single try, no retries.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Why a retry loop stopped without a value.
#[derive(Debug)]
pub enum RetryError {
    /// Every allowed try failed with a retryable error.
    Exhausted {
        /// Number of tries made.
        attempts: u32,
        /// Error of the final try.
        last_error: Error,
    },
    /// A try failed with an error that is not retryable.
    Fatal(Error),
    /// The cancellation token fired.
    Cancelled,
}

impl RetryError {
    /// Convert into a pipeline error, building the exhaustion variant with
    /// `exhausted(attempts, last_error)`.
    pub fn into_error(self, exhausted: impl FnOnce(u32, Error) -> Error) -> Error {
        match self {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => exhausted(attempts, last_error),
            RetryError::Fatal(error) => error,
            RetryError::Cancelled => Error::Cancelled,
        }
    }
}

/// Bookkeeping for one retry loop.
///
/// [`with_retry`] covers loops whose tries are independent. When a failed
/// try needs follow-up work before the next one, such as re-establishing a
/// dropped link, drive an `Attempts` by hand:
///
/// ```ignore
/// let mut attempts = Attempts::new(&policy, "fetch", &cancel);
/// loop {
///     attempts.begin()?;
///     match try_fetch().await {
///         Ok(value) => return Ok(value),
///         Err(e) => {
///             if e.is_disconnect() && attempts.has_remaining() {
///                 reconnect().await;
///             }
///             attempts.failed(e).await?;
///         }
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Attempts<'a> {
    policy: &'a RetryPolicy,
    operation: &'a str,
    cancel: &'a CancellationToken,
    made: u32,
}

impl<'a> Attempts<'a> {
    pub fn new(policy: &'a RetryPolicy, operation: &'a str, cancel: &'a CancellationToken) -> Self {
        Self {
            policy,
            operation,
            cancel,
            made: 0,
        }
    }

    /// Start the next try. Returns its 1-based number.
    pub fn begin(&mut self) -> std::result::Result<u32, RetryError> {
        if self.cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        self.made += 1;
        Ok(self.made)
    }

    /// Number of tries started so far.
    pub fn made(&self) -> u32 {
        self.made
    }

    /// Whether the budget allows another try after the current one.
    pub fn has_remaining(&self) -> bool {
        self.made < self.policy.max_attempts
    }

    /// Record a failed try.
    ///
    /// Returns `Ok(())` after sleeping when another try is allowed, or the
    /// reason to stop.
    pub async fn failed(&mut self, error: Error) -> std::result::Result<(), RetryError> {
        if !error.is_retryable() {
            return Err(RetryError::Fatal(error));
        }

        if !self.has_remaining() {
            warn!(
                operation = self.operation,
                attempts = self.made,
                error = %error,
                "Out of attempts"
            );
            return Err(RetryError::Exhausted {
                attempts: self.made,
                last_error: error,
            });
        }

        debug!(
            operation = self.operation,
            attempt = self.made,
            max_attempts = self.policy.max_attempts,
            delay = ?self.policy.delay,
            error = %error,
            "Attempt failed, retrying"
        );
        cancellable_sleep(self.cancel, self.policy.delay)
            .await
            .map_err(|_| RetryError::Cancelled)
    }

    /// Record a successful try.
    pub fn succeeded(&self) {
        if self.made > 1 {
            debug!(
                operation = self.operation,
                failures = self.made - 1,
                "Succeeded after retries"
            );
        }
    }
}

/// Execute an async operation under a retry policy.
///
/// # Arguments
///
/// * `policy` - Retry budget and delay
/// * `operation_name` - Name for logging purposes
/// * `cancel` - Token checked before every try and raced against every sleep
/// * `operation` - The async operation to retry
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    cancel: &CancellationToken,
    mut operation: F,
) -> std::result::Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = Attempts::new(policy, operation_name, cancel);
    loop {
        attempts.begin()?;
        match operation().await {
            Ok(value) => {
                attempts.succeeded();
                return Ok(value);
            }
            Err(e) => attempts.failed(e).await?,
        }
    }
}

/// Sleep for `duration` unless the token fires first.
pub async fn cancellable_sleep(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        };
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
