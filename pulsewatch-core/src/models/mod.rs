//! Domain models for `PulseWatch`.
//!
//! ## Submodules
//!
//! - [`usage`] - Daily quota accounting (UsageState, PersistedUsage, UsageReport, PlanTier)
//! - [`snapshot`] - Normalized poll results (PulseSnapshot, Record)
//! - [`device`] - Hardware families (DeviceType)

mod device;
mod snapshot;
mod usage;

// Re-export everything at the models level
pub use device::DeviceType;
pub use snapshot::{PulseSnapshot, Record};
pub use usage::{PersistedUsage, PlanTier, UsageReport, UsageState};
#[cfg(test)]
mod serde_tests;
