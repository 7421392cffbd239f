//! Fetch error types.

use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations.
///
/// Every variant except [`FetchError::Schema`] and [`FetchError::Core`]
/// describes a request that returned no usable body, and such requests are
/// never billed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed at the transport level.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limited by the API.
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after: Option<u64>,
    },

    /// The API key was rejected.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Any other non-2xx status.
    #[error("HTTP {status} for {route}")]
    Status {
        /// Response status code.
        status: u16,
        /// Route that was requested.
        route: String,
    },

    /// Body was not valid JSON.
    #[error("Invalid JSON in response: {0}")]
    Decode(#[source] serde_json::Error),

    /// Invalid response from the API.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Base URL or route could not form a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Schema error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] pulsewatch_core::CoreError),
}

impl FetchError {
    /// Returns true if a later poll might succeed without intervention.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// Schema Error
// ============================================================================

/// Errors raised while compiling the API description.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The document could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A route template did not compile.
    #[error("Invalid route pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The document parsed but is not an API description.
    #[error("Invalid API description: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Timeout(15).is_transient());
        assert!(FetchError::RateLimited { retry_after: Some(30) }.is_transient());
        assert!(
            FetchError::Status {
                status: 503,
                route: "/all-devices".to_string()
            }
            .is_transient()
        );
        assert!(
            !FetchError::Status {
                status: 404,
                route: "/nope".to_string()
            }
            .is_transient()
        );
        assert!(!FetchError::AuthenticationFailed("bad key".to_string()).is_transient());
    }
}
