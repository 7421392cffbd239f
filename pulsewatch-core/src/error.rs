//! Core error types for `PulseWatch`.

use thiserror::Error;

/// Core error type for `PulseWatch` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown plan name.
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data from API response.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An observer could not accept an update.
    #[error("Observer unavailable: {0}")]
    ObserverUnavailable(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}
