// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `PulseWatch` Store
//!
//! State and the refresh cycle for the `PulseWatch` poller.
//!
//! This crate provides:
//!
//! - **`PollCoordinator`**: Fixed-interval polling with cached fallback
//! - **normalize**: `/all-devices` payload to devices, hubs and sensors
//! - **`UsageStore`**: Latest-wins persistence of the daily usage counter
//! - **`SettingsStore`**: User preferences with persistence
//! - **keychain**: API key storage and resolution
//! - **Session**: All of the above wired together for one instance
//!
//! ## Usage
//!
//! ```ignore
//! use pulsewatch_store::{Session, SettingsStore, keychain};
//!
//! let settings = SettingsStore::load_default().await?.get().await;
//! let (key, _) = keychain::resolve_api_key(&settings)?;
//! let usage_path = settings.usage_path();
//! let session = Session::open(settings, &key, usage_path).await?;
//!
//! let handle = session.coordinator.spawn();
//! let mut rx = session.coordinator.subscribe();
//! while rx.changed().await.is_ok() {
//!     println!("{} datapoints used", session.usage.count_today().await);
//! }
//! ```

pub mod coordinator;
pub mod error;
pub mod keychain;
pub mod normalize;
pub mod persistence;
pub mod session;
pub mod settings_store;
pub mod usage_store;

pub use coordinator::{PollCoordinator, PollOutcome};
pub use error::{PollError, StoreError};
pub use normalize::normalize;
pub use persistence::{
    default_config_dir, default_data_dir, default_settings_path, default_usage_path, load_json,
    load_json_opt, load_json_or_default, save_json,
};
pub use session::{Session, load_schema};
pub use settings_store::{Settings, SettingsStore};
pub use usage_store::UsageStore;
