// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `PulseWatch` Core
//!
//! Core types, models, and traits for the `PulseWatch` poller.
//!
//! This crate holds everything that does not touch the network or the
//! filesystem:
//!
//! - Domain models (daily usage state, plan tiers, normalized snapshots)
//! - Psychrometric math used for derived telemetry
//! - Error types
//! - The observer trait used to persist usage updates
//!
//! ## Key Types
//!
//! ### Usage Types
//! - [`UsageState`] - Running daily datapoint counter state
//! - [`PersistedUsage`] - The on-disk form of the counter
//! - [`UsageReport`] - Read-only usage figures for display
//! - [`PlanTier`] - Subscription plan and its daily limit
//!
//! ### Snapshot Types
//! - [`PulseSnapshot`] - Normalized devices, hubs and attached sensors
//! - [`Record`] - One flat key/value telemetry record
//! - [`DeviceType`] - Hardware family reported by the API

pub mod error;
pub mod metrics;
pub mod models;
pub mod slug;
pub mod traits;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    // Device types
    DeviceType,
    // Snapshot types
    PulseSnapshot,
    Record,
    // Usage types
    PersistedUsage,
    PlanTier,
    UsageReport,
    UsageState,
};

pub use slug::slugify;

// Re-export traits
pub use traits::UsageObserver;
