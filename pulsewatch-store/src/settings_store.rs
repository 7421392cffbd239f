//! User settings.

use pulsewatch_core::PlanTier;
use pulsewatch_fetch::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::persistence::{default_settings_path, default_usage_path, load_json, save_json};

/// Default poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Shortest poll interval accepted.
pub const MIN_POLL_INTERVAL_SECS: u64 = 5;

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "PULSE_API_KEY";

/// Default instance identifier.
pub const DEFAULT_INSTANCE_ID: &str = "default";

// ============================================================================
// Settings
// ============================================================================

/// Persisted user settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// API host.
    pub base_url: String,
    /// Subscription plan, used for the displayed limit only.
    pub plan: PlanTier,
    /// Seconds between polls.
    pub poll_interval_secs: u64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Alternative API description to compile instead of the bundled one.
    pub schema_path: Option<PathBuf>,
    /// Keys the persisted usage record and the keychain entry.
    pub instance_id: String,
    /// Use canned responses instead of the hosted API.
    pub mock: bool,
    /// Environment variable checked first for the API key.
    pub api_key_env: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            plan: PlanTier::default(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            schema_path: None,
            instance_id: DEFAULT_INSTANCE_ID.to_string(),
            mock: false,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl Settings {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Daily datapoint limit of the configured plan.
    pub fn daily_limit(&self) -> u64 {
        self.plan.daily_limit()
    }

    /// Where this instance's usage record lives.
    pub fn usage_path(&self) -> PathBuf {
        default_usage_path(&self.instance_id)
    }

    /// Checks values that would make polling misbehave.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.base_url.trim().is_empty() {
            return Err(StoreError::Config("base_url is empty".to_string()));
        }
        if self.poll_interval_secs < MIN_POLL_INTERVAL_SECS {
            return Err(StoreError::Config(format!(
                "poll_interval_secs must be at least {MIN_POLL_INTERVAL_SECS}"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(StoreError::Config("request_timeout_secs must be positive".to_string()));
        }
        if self.instance_id.trim().is_empty() {
            return Err(StoreError::Config("instance_id is empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Settings Store
// ============================================================================

/// Persistent settings store with change notifications.
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
    path: PathBuf,
    notify: watch::Sender<u64>,
}

impl SettingsStore {
    /// Creates a store with default settings backed by `path`.
    pub fn new(path: PathBuf) -> Self {
        Self::with_settings(path, Settings::default())
    }

    fn with_settings(path: PathBuf, settings: Settings) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            settings: Arc::new(RwLock::new(settings)),
            path,
            notify,
        }
    }

    /// Loads settings from the default path.
    pub async fn load_default() -> Result<Self, StoreError> {
        Self::load(default_settings_path()).await
    }

    /// Loads settings from `path`.
    ///
    /// A missing file yields defaults. An unreadable one also yields
    /// defaults, with a warning, so a bad edit never blocks startup.
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let settings = match load_json(&path).await {
            Ok(settings) => {
                info!(path = %path.display(), "Loaded settings");
                settings
            }
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "Settings file not found, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load settings, using defaults");
                Settings::default()
            }
        };

        Ok(Self::with_settings(path, settings))
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the current settings.
    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Mutates settings and notifies subscribers. Does not save.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        f(&mut *self.settings.write().await);
        self.notify.send_modify(|version| *version += 1);
    }

    /// Writes the current settings to disk.
    pub async fn save(&self) -> Result<(), StoreError> {
        let settings = self.get().await;
        save_json(&self.path, &settings).await?;
        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    // ========================================================================
    // Convenience Methods
    // ========================================================================

    /// Sets the plan.
    pub async fn set_plan(&self, plan: PlanTier) {
        self.update(|s| s.plan = plan).await;
    }

    /// Sets the poll interval, rejecting values below the minimum.
    pub async fn set_poll_interval(&self, secs: u64) -> Result<(), StoreError> {
        if secs < MIN_POLL_INTERVAL_SECS {
            return Err(StoreError::Config(format!(
                "poll interval must be at least {MIN_POLL_INTERVAL_SECS} seconds"
            )));
        }
        self.update(|s| s.poll_interval_secs = secs).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.base_url, "https://api.pulsegrow.com");
        assert_eq!(settings.plan, PlanTier::Hobbyist);
        assert_eq!(settings.poll_interval(), Duration::from_secs(60));
        assert_eq!(settings.request_timeout(), Duration::from_secs(15));
        assert_eq!(settings.daily_limit(), 4_800);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{ "plan": "professional" }"#).unwrap();
        assert_eq!(settings.daily_limit(), 120_000);
        assert_eq!(settings.instance_id, "default");
    }

    #[test]
    fn test_validate_rejects_tiny_interval() {
        let settings = Settings {
            poll_interval_secs: 1,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(StoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_update_notifies() {
        let temp_dir = TempDir::new().unwrap();
        let store = SettingsStore::new(temp_dir.path().join("settings.json"));
        let mut rx = store.subscribe();

        store.set_plan(PlanTier::Enthusiast).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
        assert_eq!(store.get().await.daily_limit(), 24_000);
    }

    #[tokio::test]
    async fn test_set_poll_interval_bounds() {
        let temp_dir = TempDir::new().unwrap();
        let store = SettingsStore::new(temp_dir.path().join("settings.json"));

        assert!(store.set_poll_interval(2).await.is_err());
        store.set_poll_interval(120).await.unwrap();
        assert_eq!(store.get().await.poll_interval_secs, 120);
    }
}
