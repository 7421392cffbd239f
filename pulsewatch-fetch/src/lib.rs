// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `PulseWatch` Fetch
//!
//! Pulse API access with schema-driven datapoint metering.
//!
//! The Pulse API bills by the number of datapoint objects a response
//! contains. This crate works that number out from the API's own
//! description and bills it before any caller sees the data.
//!
//! ## Metering
//!
//! - [`schema::SchemaIndex`] - Route templates mapped to billable field paths
//! - [`meter::UsageCounter`] - Daily counter with lazy midnight reset
//!
//! ## Clients
//!
//! - [`client::PulseApi`] - The client trait
//! - [`client::PulseClient`] - HTTP client for the hosted API
//! - [`stub::StubClient`] - Canned responses for offline use and tests
//!
//! ## Example
//!
//! ```ignore
//! use pulsewatch_fetch::{PulseApi, PulseClient, SchemaIndex, UsageCounter};
//! use std::sync::Arc;
//!
//! let usage = Arc::new(UsageCounter::new(Arc::new(SchemaIndex::bundled()?)));
//! let client = PulseClient::builder().api_key(key).build(usage.clone())?;
//!
//! let payload = client.get_all_devices().await?;
//! println!("{} datapoints used today", usage.count_today().await);
//! ```

pub mod client;
pub mod error;
pub mod meter;
pub mod schema;
pub mod stub;

// Errors
pub use error::{FetchError, SchemaError};

// Metering
pub use meter::{MINIMUM_CHARGE, UsageCounter};
pub use schema::{BILLABLE_TYPES, FieldPath, RouteRule, SchemaIndex, Segment};

// Clients
pub use client::{
    ALL_DEVICES_ROUTE, API_MODE_ENV, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, PulseApi, PulseClient,
    PulseClientBuilder, USERS_ROUTE, is_mock_mode, select_api,
};
pub use stub::StubClient;
