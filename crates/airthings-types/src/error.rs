//! Error types for identity resolution and payload decoding in airthings-types.

use thiserror::Error;

/// Errors that can occur when resolving or decoding Airthings sensor data.
///
/// These are permanent failures: retrying the same bytes or the same
/// model number will never succeed, so the acquisition layer does not retry
/// them.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The model number is not present in the model registry.
    #[error("Airthings model number {0} is not implemented")]
    UnknownModel(String),

    /// The raw payload does not match the model's fixed layout size.
    #[error("Malformed {model} payload: expected {expected} bytes, got {actual}")]
    MalformedPayload {
        /// Human label of the model whose layout was applied.
        model: &'static str,
        /// Layout size in bytes.
        expected: usize,
        /// Payload size actually received.
        actual: usize,
    },

    /// A serial number that is not exactly 10 ASCII digits.
    #[error("Invalid serial number {0:?}: expected 10 ASCII digits")]
    InvalidSerialNumber(String),
}

/// Result type alias using airthings-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
