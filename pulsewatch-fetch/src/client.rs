//! Pulse API clients.
//!
//! [`PulseApi`] is the seam the coordinator and the CLI talk to. Every
//! implementation must bill a response through its [`UsageCounter`]
//! before handing the payload back, so a usage read that happens after a
//! call returned always includes that call.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::FetchError;
use crate::meter::UsageCounter;
use crate::stub::StubClient;

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://api.pulsegrow.com";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Environment variable that forces the stub client when set to `mock`.
pub const API_MODE_ENV: &str = "PULSE_API_MODE";

/// Aggregate route polled by the coordinator.
pub const ALL_DEVICES_ROUTE: &str = "/all-devices";

/// Account users route.
pub const USERS_ROUTE: &str = "/users";

/// Fallback owner name when the account lists no usable user.
pub const DEFAULT_OWNER_NAME: &str = "PulseLabs";

// ============================================================================
// API Trait
// ============================================================================

/// A source of Pulse API responses, metered through a [`UsageCounter`].
#[async_trait]
pub trait PulseApi: Send + Sync {
    /// GETs `route` (path plus optional query) and returns the decoded body.
    ///
    /// On success the response has been billed before this returns. On
    /// failure nothing is billed and the counter's last-call flag is false.
    async fn get(&self, route: &str) -> Result<Value, FetchError>;

    /// The counter this client bills into.
    fn usage(&self) -> &Arc<UsageCounter>;

    /// Latest readings for every device, hub and attached sensor.
    async fn get_all_devices(&self) -> Result<Value, FetchError> {
        self.get(ALL_DEVICES_ROUTE).await
    }

    /// Users on the account.
    async fn get_users(&self) -> Result<Value, FetchError> {
        self.get(USERS_ROUTE).await
    }

    /// Display name of the account owner.
    async fn owner_name(&self) -> Result<String, FetchError> {
        let users = self.get_users().await?;
        Ok(owner_from_users(&users))
    }
}

/// Picks the owner's user name from a `/users` payload.
pub fn owner_from_users(users: &Value) -> String {
    let Some(users) = users.as_array() else {
        return DEFAULT_OWNER_NAME.to_string();
    };

    let name_of = |user: &Value| user.get("userName").and_then(Value::as_str).map(str::to_string);

    users
        .iter()
        .filter(|u| u.get("role").and_then(Value::as_str) == Some("Owner"))
        .find_map(name_of)
        .or_else(|| users.first().and_then(name_of))
        .unwrap_or_else(|| DEFAULT_OWNER_NAME.to_string())
}

// ============================================================================
// HTTP Client
// ============================================================================

/// The HTTP client for the hosted Pulse API.
pub struct PulseClient {
    http: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    usage: Arc<UsageCounter>,
}

impl std::fmt::Debug for PulseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PulseClient {
    /// Starts building a client.
    pub fn builder() -> PulseClientBuilder {
        PulseClientBuilder::default()
    }

    /// The configured base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, route: &str) -> Result<Url, FetchError> {
        let joined = if route.starts_with('/') {
            format!("{}{route}", self.base_url)
        } else {
            format!("{}/{route}", self.base_url)
        };
        Url::parse(&joined).map_err(|e| FetchError::InvalidUrl(format!("{joined}: {e}")))
    }

    fn map_transport(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout.as_secs())
        } else {
            FetchError::Http(e)
        }
    }

    async fn fetch(&self, route: &str) -> Result<Value, FetchError> {
        let url = self.url_for(route)?;

        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, &response, route));
        }

        let body = response.bytes().await.map_err(|e| self.map_transport(e))?;
        serde_json::from_slice(&body).map_err(FetchError::Decode)
    }
}

fn status_error(status: StatusCode, response: &reqwest::Response, route: &str) -> FetchError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            FetchError::RateLimited { retry_after }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            FetchError::AuthenticationFailed(format!("API key rejected ({status})"))
        }
        _ => FetchError::Status {
            status: status.as_u16(),
            route: route.to_string(),
        },
    }
}

#[async_trait]
impl PulseApi for PulseClient {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn get(&self, route: &str) -> Result<Value, FetchError> {
        match self.fetch(route).await {
            Ok(payload) => {
                self.usage.mark_call(true).await;
                let billed = self.usage.register(route, &payload).await;
                debug!(route, billed, "Pulse API call succeeded");
                Ok(payload)
            }
            Err(e) => {
                self.usage.mark_call(false).await;
                warn!(route, error = %e, "Pulse API call failed");
                Err(e)
            }
        }
    }

    fn usage(&self) -> &Arc<UsageCounter> {
        &self.usage
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`PulseClient`].
#[derive(Clone)]
pub struct PulseClientBuilder {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl Default for PulseClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl PulseClientBuilder {
    /// Overrides the API host.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds a client billing into `usage`.
    pub fn build(self, usage: Arc<UsageCounter>) -> Result<PulseClient, FetchError> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| FetchError::AuthenticationFailed("no API key configured".to_string()))?;

        let base_url = self.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| FetchError::InvalidUrl(format!("{base_url}: {e}")))?;

        let http = Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("pulsewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(PulseClient {
            http,
            base_url,
            api_key,
            timeout: self.timeout,
            usage,
        })
    }
}

// ============================================================================
// Client Selection
// ============================================================================

/// Returns true if the stub should stand in for the hosted API.
///
/// `mode` is the value of [`API_MODE_ENV`], if set.
pub fn is_mock_mode(api_key: &str, mode: Option<&str>) -> bool {
    mode.is_some_and(|m| m.trim().eq_ignore_ascii_case("mock")) || api_key.trim().eq_ignore_ascii_case("mock")
}

/// Builds the stub or the HTTP client depending on the key and environment.
pub fn select_api(
    api_key: &str,
    builder: PulseClientBuilder,
    usage: Arc<UsageCounter>,
) -> Result<Arc<dyn PulseApi>, FetchError> {
    let mode = std::env::var(API_MODE_ENV).ok();
    if is_mock_mode(api_key, mode.as_deref()) {
        debug!("Using stub Pulse API");
        return Ok(Arc::new(StubClient::new(usage)));
    }

    Ok(Arc::new(builder.api_key(api_key).build(usage)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaIndex;
    use serde_json::json;

    fn usage() -> Arc<UsageCounter> {
        Arc::new(UsageCounter::new(Arc::new(SchemaIndex::empty())))
    }

    #[test]
    fn test_owner_prefers_owner_role() {
        let users = json!([
            { "userName": "Viewer-1", "role": "Viewer" },
            { "userName": "GrowMaster", "role": "Owner" }
        ]);
        assert_eq!(owner_from_users(&users), "GrowMaster");
    }

    #[test]
    fn test_owner_falls_back_to_first_user() {
        let users = json!([{ "userName": "Alice", "role": "Viewer" }]);
        assert_eq!(owner_from_users(&users), "Alice");
    }

    #[test]
    fn test_owner_default() {
        assert_eq!(owner_from_users(&json!([])), "PulseLabs");
        assert_eq!(owner_from_users(&json!({ "unexpected": true })), "PulseLabs");
        assert_eq!(owner_from_users(&json!([{ "role": "Viewer" }])), "PulseLabs");
    }

    #[test]
    fn test_mock_mode_detection() {
        assert!(is_mock_mode("mock", None));
        assert!(is_mock_mode("MOCK", None));
        assert!(is_mock_mode("real-key", Some("mock")));
        assert!(!is_mock_mode("real-key", Some("live")));
        assert!(!is_mock_mode("real-key", None));
    }

    #[test]
    fn test_builder_requires_key() {
        let err = PulseClient::builder().build(usage()).unwrap_err();
        assert!(matches!(err, FetchError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_builder_rejects_bad_base_url() {
        let err = PulseClient::builder()
            .api_key("k")
            .base_url("not a url")
            .build(usage())
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[test]
    fn test_url_joining_and_redacted_debug() {
        let client = PulseClient::builder()
            .api_key("secret-key")
            .base_url("https://api.example.com/")
            .build(usage())
            .unwrap();

        assert_eq!(client.base_url(), "https://api.example.com");
        assert_eq!(
            client.url_for("/devices/1/data-range?start=x").unwrap().as_str(),
            "https://api.example.com/devices/1/data-range?start=x"
        );
        assert!(!format!("{client:?}").contains("secret-key"));
    }

    #[test]
    fn test_select_api_stub_for_mock_key() {
        let api = select_api("mock", PulseClient::builder(), usage()).unwrap();
        assert_eq!(api.usage().index().len(), 0);
    }
}
