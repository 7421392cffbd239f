//! Daily datapoint metering.
//!
//! [`UsageCounter`] turns a decoded response into a billed quantity using
//! the [`SchemaIndex`], and accumulates it into the current local-day
//! window. All mutation goes through [`UsageCounter::increment`]; readers
//! get copies.

use chrono::{DateTime, Local};
use pulsewatch_core::{PersistedUsage, UsageObserver, UsageReport, UsageState};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};

use crate::schema::SchemaIndex;

/// Charge applied to calls that returned nothing countable.
pub const MINIMUM_CHARGE: u64 = 1;

// ============================================================================
// Usage Counter
// ============================================================================

/// Stateful daily counter shared by the client and any usage display.
pub struct UsageCounter {
    index: Arc<SchemaIndex>,
    state: RwLock<UsageState>,
    observer: RwLock<Option<Arc<dyn UsageObserver>>>,
}

impl std::fmt::Debug for UsageCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageCounter")
            .field("routes", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl UsageCounter {
    /// Creates a counter with an empty window opened now.
    pub fn new(index: Arc<SchemaIndex>) -> Self {
        Self::with_state(index, UsageState::new(Local::now()))
    }

    /// Creates a counter starting from `state`.
    pub fn with_state(index: Arc<SchemaIndex>, state: UsageState) -> Self {
        Self {
            index,
            state: RwLock::new(state),
            observer: RwLock::new(None),
        }
    }

    /// The schema index used for counting.
    pub fn index(&self) -> &SchemaIndex {
        &self.index
    }

    // ========================================================================
    // Counting
    // ========================================================================

    /// Number of datapoints a response to `route` costs.
    ///
    /// Unknown routes, and known routes whose pointers find nothing, cost
    /// [`MINIMUM_CHARGE`].
    pub fn count(&self, route: &str, payload: &Value) -> u64 {
        let Some(rule) = self.index.rule_for(route) else {
            trace!(route, "No billing rule, charging minimum");
            return MINIMUM_CHARGE;
        };

        let counted = rule.count(payload);
        trace!(route, template = rule.template(), counted, "Counted billable objects");
        counted.max(MINIMUM_CHARGE)
    }

    /// Bills `amount` datapoints now. See [`increment_at`](Self::increment_at).
    pub async fn increment(&self, amount: u64) -> UsageState {
        self.increment_at(amount, Local::now()).await
    }

    /// Bills `amount` datapoints at `now`, resetting first if `now` is on a
    /// later local date than the previous call.
    ///
    /// The observer is notified on a detached task; its result never
    /// reaches the caller.
    pub async fn increment_at(&self, amount: u64, now: DateTime<Local>) -> UsageState {
        let updated = {
            let mut state = self.state.write().await;
            if state.apply(amount, now) {
                info!(window_start = %state.window_start, "New quota window");
            }
            state.clone()
        };

        debug!(amount, count_today = updated.count_today, "Usage incremented");
        self.notify(updated.clone()).await;
        updated
    }

    /// Counts a response and bills it. Returns the billed amount.
    pub async fn register(&self, route: &str, payload: &Value) -> u64 {
        let amount = self.count(route, payload);
        self.increment(amount).await;
        amount
    }

    async fn notify(&self, state: UsageState) {
        let Some(observer) = self.observer.read().await.clone() else {
            return;
        };

        tokio::spawn(async move {
            if let Err(e) = observer.usage_updated(state).await {
                warn!(error = %e, "Usage observer failed");
            }
        });
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Hydrates the counter from persisted state.
    ///
    /// A record from an earlier day is kept as-is; the next increment
    /// resets it.
    pub async fn restore(&self, persisted: &PersistedUsage) {
        let restored = UsageState::from_persisted(persisted);
        info!(
            count = restored.count_today,
            last_call = %restored.last_call_at,
            "Restored usage state"
        );
        *self.state.write().await = restored;
    }

    /// Records whether the latest request succeeded.
    pub async fn mark_call(&self, succeeded: bool) {
        self.state.write().await.last_call_succeeded = succeeded;
    }

    /// Registers the observer notified after every increment.
    pub async fn set_observer(&self, observer: Arc<dyn UsageObserver>) {
        *self.observer.write().await = Some(observer);
    }

    /// Removes the observer.
    pub async fn clear_observer(&self) {
        *self.observer.write().await = None;
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> UsageState {
        self.state.read().await.clone()
    }

    /// Datapoints billed in the current window.
    pub async fn count_today(&self) -> u64 {
        self.state.read().await.count_today
    }

    /// Whether the last request succeeded.
    pub async fn last_call_succeeded(&self) -> bool {
        self.state.read().await.last_call_succeeded
    }

    /// Usage figures against a daily `limit`. Never resets the window.
    pub async fn report(&self, limit: u64) -> UsageReport {
        let state = self.snapshot().await;
        UsageReport::from_state(&state, limit, Local::now())
    }
}

// ============================================================================
// Tests
// ============================================================================
