//! Wires the schema, counter, usage record, client and coordinator
//! together for one instance.

use pulsewatch_fetch::{PulseApi, PulseClient, SchemaIndex, UsageCounter, select_api};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::coordinator::PollCoordinator;
use crate::error::StoreError;
use crate::settings_store::Settings;
use crate::usage_store::UsageStore;

/// Compiles the configured API description.
///
/// Falls back to [`SchemaIndex::empty`] with a warning, in which case every
/// call bills the minimum.
pub fn load_schema(settings: &Settings) -> SchemaIndex {
    let loaded = match &settings.schema_path {
        Some(path) => SchemaIndex::from_path(path),
        None => SchemaIndex::bundled(),
    };

    loaded.unwrap_or_else(|e| {
        warn!(error = %e, "API description unusable, billing every call as one datapoint");
        SchemaIndex::empty()
    })
}

/// Everything one running instance owns.
pub struct Session {
    /// Settings the session was opened with.
    pub settings: Settings,
    /// Datapoint counter.
    pub usage: Arc<UsageCounter>,
    /// Durable usage record, registered as the counter's observer.
    pub usage_store: Arc<UsageStore>,
    /// The client being polled.
    pub api: Arc<dyn PulseApi>,
    /// The refresh loop.
    pub coordinator: Arc<PollCoordinator>,
}

impl Session {
    /// Opens a session, restoring usage from `usage_path`.
    ///
    /// An unreadable usage record is logged and replaced by a fresh one.
    pub async fn open(settings: Settings, api_key: &str, usage_path: PathBuf) -> Result<Self, StoreError> {
        settings.validate()?;

        let usage = Arc::new(UsageCounter::new(Arc::new(load_schema(&settings))));

        let usage_store = Arc::new(UsageStore::open(usage_path));
        match usage_store.load().await {
            Ok(Some(persisted)) => usage.restore(&persisted).await,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable usage record"),
        }
        usage.set_observer(usage_store.clone()).await;

        let builder = PulseClient::builder()
            .base_url(settings.base_url.clone())
            .timeout(settings.request_timeout());
        let api = select_api(api_key, builder, usage.clone())?;

        let coordinator = Arc::new(PollCoordinator::new(api.clone(), settings.poll_interval()));

        info!(
            instance = %settings.instance_id,
            plan = %settings.plan,
            interval_secs = settings.poll_interval_secs,
            "Session opened"
        );

        Ok(Self {
            settings,
            usage,
            usage_store,
            api,
            coordinator,
        })
    }

    /// Writes the latest usage state.
    pub async fn close(&self) -> Result<(), StoreError> {
        self.usage.clear_observer().await;
        self.usage_store.queue(self.usage.snapshot().await);
        self.usage_store.flush().await
    }
}
