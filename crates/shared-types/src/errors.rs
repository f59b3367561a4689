//! # Error Types
//!
//! Parse errors for the wire-level identifiers defined in this crate.

use thiserror::Error;

/// Errors raised while parsing shared identifiers from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// The string is not a known notification type.
    #[error("Unknown notification type: {0}")]
    UnknownNotificationType(String),

    /// The string is not a valid identifier.
    #[error("Invalid {kind} identifier: {value}")]
    InvalidId { kind: &'static str, value: String },
}
