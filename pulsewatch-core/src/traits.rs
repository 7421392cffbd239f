//! Trait definitions for `PulseWatch`.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::UsageState;

/// Receives a copy of the usage state after every metered call.
///
/// The usage counter dispatches to its observer on a detached task, so an
/// implementation may be slow or fail without affecting the call that was
/// being metered. Failures are logged by the counter and otherwise dropped.
#[async_trait]
pub trait UsageObserver: Send + Sync {
    /// Called with the state as it stood right after an increment.
    async fn usage_updated(&self, state: UsageState) -> Result<(), CoreError>;
}
