//! Durable usage record.
//!
//! [`UsageStore`] is the counter's observer. Each update replaces the
//! pending value in a `watch` channel and a background task writes
//! whatever is newest, so at most one write is in flight and a burst of
//! updates costs one or two writes rather than one each.

use async_trait::async_trait;
use pulsewatch_core::{CoreError, PersistedUsage, UsageObserver, UsageState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::persistence::{load_json_opt, save_json};

// ============================================================================
// Usage Store
// ============================================================================

/// Persists the latest usage state for one instance.
pub struct UsageStore {
    path: PathBuf,
    latest: watch::Sender<Option<UsageState>>,
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for UsageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageStore").field("path", &self.path).finish_non_exhaustive()
    }
}

impl UsageStore {
    /// Opens the store and starts its writer task.
    ///
    /// Must be called inside a Tokio runtime. The writer stops once the
    /// store is dropped and the last pending value has been written.
    pub fn open(path: PathBuf) -> Self {
        let (latest, rx) = watch::channel(None);
        let write_lock = Arc::new(Mutex::new(()));

        tokio::spawn(write_loop(path.clone(), rx, write_lock.clone()));

        Self {
            path,
            latest,
            write_lock,
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored record, if any.
    pub async fn load(&self) -> Result<Option<PersistedUsage>, StoreError> {
        let loaded = load_json_opt::<PersistedUsage>(&self.path).await?;
        if let Some(usage) = &loaded {
            info!(path = %self.path.display(), count = usage.count, "Loaded usage record");
        }
        Ok(loaded)
    }

    /// Queues `state` for writing unless a newer state is already queued.
    ///
    /// Returns true if the state was queued.
    pub fn queue(&self, state: UsageState) -> bool {
        self.latest.send_if_modified(|pending| {
            let newer = pending
                .as_ref()
                .is_none_or(|current| state.last_call_at >= current.last_call_at);
            if newer {
                *pending = Some(state);
            }
            newer
        })
    }

    /// Writes the newest queued state now.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let pending = self.latest.borrow().clone();
        match pending {
            Some(state) => write_state(&self.path, &state, &self.write_lock).await,
            None => Ok(()),
        }
    }
}

async fn write_state(path: &Path, state: &UsageState, lock: &Mutex<()>) -> Result<(), StoreError> {
    let _guard = lock.lock().await;
    save_json(path, &state.to_persisted()).await?;
    debug!(path = %path.display(), count = state.count_today, "Usage record written");
    Ok(())
}

async fn write_loop(path: PathBuf, mut rx: watch::Receiver<Option<UsageState>>, lock: Arc<Mutex<()>>) {
    while rx.changed().await.is_ok() {
        let pending = rx.borrow_and_update().clone();
        let Some(state) = pending else {
            continue;
        };
        if let Err(e) = write_state(&path, &state, &lock).await {
            warn!(path = %path.display(), error = %e, "Failed to persist usage");
        }
    }
    debug!(path = %path.display(), "Usage writer stopped");
}

#[async_trait]
impl UsageObserver for UsageStore {
    async fn usage_updated(&self, state: UsageState) -> Result<(), CoreError> {
        if self.latest.is_closed() {
            return Err(CoreError::ObserverUnavailable("usage writer stopped".to_string()));
        }
        if !self.queue(state) {
            debug!("Skipped out-of-order usage update");
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
