//! Polling coordinator.
//!
//! Polls `/all-devices` on a fixed interval, normalizes the response and
//! publishes the resulting snapshot on a `watch` channel. At most one poll
//! runs at a time: timer ticks that find a poll in flight are skipped, and
//! manual refreshes wait their turn.

use chrono::Utc;
use pulsewatch_core::PulseSnapshot;
use pulsewatch_fetch::{PulseApi, UsageCounter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::error::PollError;
use crate::normalize::normalize;

/// Result of a poll that produced data.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// The snapshot now considered current.
    pub snapshot: Arc<PulseSnapshot>,
    /// False when the poll failed and an earlier snapshot was served.
    pub fresh: bool,
}

// ============================================================================
// Coordinator
// ============================================================================

/// Owns the refresh cycle and the current snapshot.
pub struct PollCoordinator {
    api: Arc<dyn PulseApi>,
    interval: Duration,
    in_flight: Mutex<()>,
    snapshot: watch::Sender<Option<Arc<PulseSnapshot>>>,
}

impl std::fmt::Debug for PollCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollCoordinator")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl PollCoordinator {
    /// Creates a coordinator polling `api` every `interval`.
    pub fn new(api: Arc<dyn PulseApi>, interval: Duration) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            api,
            interval,
            in_flight: Mutex::new(()),
            snapshot,
        }
    }

    /// The poll interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The counter the client bills into.
    pub fn usage(&self) -> &Arc<UsageCounter> {
        self.api.usage()
    }

    /// The client being polled.
    pub fn api(&self) -> &Arc<dyn PulseApi> {
        &self.api
    }

    /// The last successful snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<PulseSnapshot>> {
        self.snapshot.borrow().clone()
    }

    /// Receives every new snapshot. Cached fallbacks are not re-sent.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PulseSnapshot>>> {
        self.snapshot.subscribe()
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// Polls now, waiting for any poll already in flight to finish first.
    ///
    /// A failed poll is served from the last snapshot when there is one.
    /// Only a failure with nothing cached is returned as an error.
    pub async fn refresh(&self) -> Result<PollOutcome, PollError> {
        let _guard = self.in_flight.lock().await;
        self.poll_locked().await
    }

    /// Polls now unless a poll is already in flight, in which case `None`.
    pub async fn try_refresh(&self) -> Option<Result<PollOutcome, PollError>> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Poll already in flight, skipping");
            return None;
        };
        Some(self.poll_locked().await)
    }

    #[instrument(skip(self))]
    async fn poll_locked(&self) -> Result<PollOutcome, PollError> {
        let result = match self.api.get_all_devices().await {
            Ok(payload) => normalize(&payload, Utc::now()),
            Err(e) => Err(PollError::NoSnapshot(e)),
        };

        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.snapshot.send_replace(Some(snapshot.clone()));
                info!(records = snapshot.len(), "Poll succeeded");
                Ok(PollOutcome {
                    snapshot,
                    fresh: true,
                })
            }
            Err(e) => match self.snapshot() {
                Some(cached) => {
                    let age_secs = (Utc::now() - cached.fetched_at).num_seconds();
                    warn!(error = %e, age_secs, "Poll failed, serving cached snapshot");
                    Ok(PollOutcome {
                        snapshot: cached,
                        fresh: false,
                    })
                }
                None => {
                    error!(error = %e, "Poll failed with nothing cached");
                    Err(e)
                }
            },
        }
    }

    /// Starts the fixed-interval loop. The first poll runs immediately.
    ///
    /// Abort the returned handle to stop polling.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(coordinator.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = coordinator.interval.as_secs(), "Polling started");

            loop {
                ticker.tick().await;
                // Errors are already logged by the poll itself.
                let _ = coordinator.try_refresh().await;
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pulsewatch_fetch::{FetchError, SchemaIndex, StubClient};
    use serde_json::{Value, json};
    use tokio::sync::Notify;

    fn stub() -> Arc<StubClient> {
        let usage = Arc::new(UsageCounter::new(Arc::new(SchemaIndex::bundled().unwrap())));
        Arc::new(StubClient::new(usage))
    }

    fn coordinator(api: Arc<StubClient>) -> PollCoordinator {
        PollCoordinator::new(api, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_first_failure_propagates() {
        let api = stub();
        api.fail_route("/all-devices").await;
        let coordinator = coordinator(api);

        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(err, PollError::NoSnapshot(FetchError::Timeout(_))));
        assert!(coordinator.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_failure_serves_cached_snapshot() {
        let api = stub();
        let coordinator = coordinator(api.clone());

        let first = coordinator.refresh().await.unwrap();
        assert!(first.fresh);
        let used = coordinator.usage().count_today().await;

        api.fail_route("/all-devices").await;
        let second = coordinator.refresh().await.unwrap();

        assert!(!second.fresh);
        assert!(Arc::ptr_eq(&first.snapshot, &second.snapshot));
        assert_eq!(coordinator.usage().count_today().await, used);
        assert!(!coordinator.usage().last_call_succeeded().await);
    }

    #[tokio::test]
    async fn test_success_replaces_snapshot() {
        let api = stub();
        let coordinator = coordinator(api.clone());
        let first = coordinator.refresh().await.unwrap();

        api.set_response("/all-devices", json!({ "deviceViewDtos": [{ "id": 1 }] }))
            .await;
        let second = coordinator.refresh().await.unwrap();

        assert!(second.fresh);
        assert_eq!(first.snapshot.devices.len(), 3);
        assert_eq!(second.snapshot.devices.len(), 1);
        assert_eq!(coordinator.snapshot().unwrap().devices.len(), 1);
    }

    #[tokio::test]
    async fn test_unusable_payload_falls_back() {
        let api = stub();
        let coordinator = coordinator(api.clone());
        coordinator.refresh().await.unwrap();

        api.set_response("/all-devices", json!("maintenance")).await;
        let outcome = coordinator.refresh().await.unwrap();
        assert!(!outcome.fresh);
    }

    #[tokio::test]
    async fn test_subscribers_see_new_snapshots() {
        let coordinator = coordinator(stub());
        let mut rx = coordinator.subscribe();

        coordinator.refresh().await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().devices.len(), 3);
    }

    /// Blocks inside `/all-devices` until released.
    struct Gate {
        inner: Arc<StubClient>,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl PulseApi for Gate {
        async fn get(&self, route: &str) -> Result<Value, FetchError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.get(route).await
        }

        fn usage(&self) -> &Arc<UsageCounter> {
            self.inner.usage()
        }
    }

    #[tokio::test]
    async fn test_tick_during_poll_is_skipped() {
        let gate = Arc::new(Gate {
            inner: stub(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let coordinator = Arc::new(PollCoordinator::new(gate.clone(), Duration::from_secs(60)));

        let running = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        gate.entered.notified().await;

        assert!(coordinator.try_refresh().await.is_none());

        gate.release.notify_one();
        running.await.unwrap().unwrap();
        assert_eq!(coordinator.usage().count_today().await, 5);
    }

    #[tokio::test]
    async fn test_spawned_loop_publishes() {
        let coordinator = Arc::new(PollCoordinator::new(stub(), Duration::from_millis(50)));
        let mut rx = coordinator.subscribe();

        let handle = coordinator.spawn();
        rx.changed().await.unwrap();
        handle.abort();

        assert!(coordinator.snapshot().is_some());
    }
}
