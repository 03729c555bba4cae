//! Error types for sample parsing in solar-types.

use thiserror::Error;

/// Errors that can occur when turning an upstream sample into a [`Reading`](crate::Reading).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The time label is not a 12-hour clock value with an am/pm marker.
    #[error("Invalid time label: {0:?}")]
    InvalidTime(String),

    /// A numeric field has non-numeric residue after unit stripping.
    #[error("Invalid {field} value: {value:?}")]
    InvalidNumber {
        /// Field name (`energy`, `power`, `temperature`).
        field: &'static str,
        /// The raw label as received.
        value: String,
    },

    /// A field that must be non-negative parsed to a negative number.
    #[error("{field} must be non-negative, got {value}")]
    Negative {
        /// Field name (`energy`, `power`).
        field: &'static str,
        /// The parsed value.
        value: f64,
    },
}

/// Result type alias using solar-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
