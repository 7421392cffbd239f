//! Normalized poll results.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One flat telemetry record. Values are never `null`.
pub type Record = Map<String, Value>;

/// The normalized result of one successful `/all-devices` poll.
///
/// A snapshot is assembled once and then only read; a new poll produces a
/// new snapshot rather than editing this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseSnapshot {
    /// Standalone devices keyed by device id.
    pub devices: BTreeMap<String, Record>,
    /// Hubs keyed by hub id.
    pub hubs: BTreeMap<String, Record>,
    /// Hub-attached sensor readings keyed by `{sensorId}_{metric}`.
    pub sensors: BTreeMap<String, Record>,
    /// When the underlying response was received.
    pub fetched_at: DateTime<Utc>,
}

impl PulseSnapshot {
    /// Creates an empty snapshot stamped with the current time.
    pub fn new() -> Self {
        Self {
            devices: BTreeMap::new(),
            hubs: BTreeMap::new(),
            sensors: BTreeMap::new(),
            fetched_at: Utc::now(),
        }
    }

    /// Returns true if the poll returned nothing at all.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.hubs.is_empty() && self.sensors.is_empty()
    }

    /// Total number of records across all three maps.
    pub fn len(&self) -> usize {
        self.devices.len() + self.hubs.len() + self.sensors.len()
    }

    /// Returns true if this snapshot is older than `threshold`.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        Utc::now() - self.fetched_at > threshold
    }

    /// Looks up a device record.
    pub fn device(&self, id: &str) -> Option<&Record> {
        self.devices.get(id)
    }

    /// Looks up a hub record.
    pub fn hub(&self, id: &str) -> Option<&Record> {
        self.hubs.get(id)
    }

    /// All sensor records owned by a hub.
    pub fn sensors_for_hub<'a>(&'a self, hub_id: &'a str) -> impl Iterator<Item = (&'a String, &'a Record)> {
        self.sensors
            .iter()
            .filter(move |(_, record)| record.get("hubId").and_then(Value::as_str) == Some(hub_id))
    }
}

impl Default for PulseSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
