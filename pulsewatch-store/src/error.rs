//! Store error types.

use pulsewatch_fetch::FetchError;
use thiserror::Error;

/// Errors from persistence, settings and keychain access.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Keychain access failed.
    #[error("Keychain error: {0}")]
    Keychain(String),

    /// The API client could not be built.
    #[error("Client error: {0}")]
    Fetch(#[from] FetchError),

    /// Core error.
    #[error(transparent)]
    Core(#[from] pulsewatch_core::CoreError),
}

impl StoreError {
    /// Returns true if the file simply did not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Errors surfaced by a poll.
#[derive(Debug, Error)]
pub enum PollError {
    /// The fetch failed and there is no earlier snapshot to fall back on.
    #[error("Update failed and no cached data is available: {0}")]
    NoSnapshot(#[source] FetchError),

    /// The response decoded but has no recognisable shape.
    #[error("Unusable response: {0}")]
    Normalize(String),
}

impl PollError {
    /// The underlying fetch error, if any.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            Self::NoSnapshot(e) => Some(e),
            Self::Normalize(_) => None,
        }
    }
}
