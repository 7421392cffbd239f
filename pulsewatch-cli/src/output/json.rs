//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use pulsewatch_core::{PlanTier, PulseSnapshot, Record, UsageReport};
use pulsewatch_fetch::SchemaIndex;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

// ============================================================================
// Output Types
// ============================================================================

/// One poll: the readings and what they cost.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOutput<'a> {
    pub snapshot: SnapshotOutput<'a>,
    pub usage: UsageOutput,
}

/// A normalized snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotOutput<'a> {
    /// False when the last poll failed and this is the cached result.
    pub fresh: bool,
    #[serde(serialize_with = "serialize_datetime")]
    pub fetched_at: DateTime<Utc>,
    pub devices: &'a BTreeMap<String, Record>,
    pub hubs: &'a BTreeMap<String, Record>,
    pub sensors: &'a BTreeMap<String, Record>,
}

/// Daily datapoint usage.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOutput {
    pub plan: String,
    pub used: u64,
    pub limit: u64,
    pub remaining: u64,
    pub used_percent: f64,
    pub forecast: u64,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_local_opt")]
    pub last_call_at: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_call_succeeded: Option<bool>,
}

/// Connectivity check result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutput {
    pub owner: String,
    pub devices: usize,
    pub hubs: usize,
    pub sensors: usize,
    pub usage: UsageOutput,
}

/// Compiled billing rules.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaOutput {
    pub source: String,
    pub routes: Vec<RouteOutput>,
}

/// One route's billable pointers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOutput {
    pub template: String,
    pub pointers: Vec<String>,
}

// ============================================================================
// Serialization Helpers
// ============================================================================

fn serialize_datetime<S>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&dt.to_rfc3339())
}

#[allow(clippy::ref_option)]
fn serialize_local_opt<S>(dt: &Option<DateTime<Local>>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match dt {
        Some(dt) => s.serialize_str(&dt.to_rfc3339()),
        None => s.serialize_none(),
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Serializes any value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(data)?)
        } else {
            Ok(serde_json::to_string(data)?)
        }
    }

    /// Formats one poll result.
    pub fn format_poll(
        &self,
        snapshot: &PulseSnapshot,
        fresh: bool,
        report: &UsageReport,
        plan: PlanTier,
    ) -> Result<String> {
        let output = PollOutput {
            snapshot: self.snapshot_output(snapshot, fresh),
            usage: self.usage_output(
                report,
                plan,
                Some(report.last_call_at),
                Some(report.last_call_succeeded),
            ),
        };
        self.format(&output)
    }

    /// Borrows a snapshot for output.
    pub fn snapshot_output<'a>(&self, snapshot: &'a PulseSnapshot, fresh: bool) -> SnapshotOutput<'a> {
        SnapshotOutput {
            fresh,
            fetched_at: snapshot.fetched_at,
            devices: &snapshot.devices,
            hubs: &snapshot.hubs,
            sensors: &snapshot.sensors,
        }
    }

    /// Builds usage output. Last-call fields are omitted when unknown.
    pub fn usage_output(
        &self,
        report: &UsageReport,
        plan: PlanTier,
        last_call_at: Option<DateTime<Local>>,
        last_call_succeeded: Option<bool>,
    ) -> UsageOutput {
        UsageOutput {
            plan: plan.to_string(),
            used: report.used,
            limit: report.limit,
            remaining: report.remaining,
            used_percent: (report.used_percent() * 10.0).round() / 10.0,
            forecast: report.forecast,
            last_call_at,
            last_call_succeeded,
        }
    }

    /// Builds connectivity check output.
    pub fn check_output(
        &self,
        owner: &str,
        snapshot: &PulseSnapshot,
        report: &UsageReport,
        plan: PlanTier,
    ) -> CheckOutput {
        CheckOutput {
            owner: owner.to_string(),
            devices: snapshot.devices.len(),
            hubs: snapshot.hubs.len(),
            sensors: snapshot.sensors.len(),
            usage: self.usage_output(
                report,
                plan,
                Some(report.last_call_at),
                Some(report.last_call_succeeded),
            ),
        }
    }

    /// Builds schema output.
    pub fn schema_output(&self, index: &SchemaIndex, source: &str) -> SchemaOutput {
        SchemaOutput {
            source: source.to_string(),
            routes: index
                .rules()
                .iter()
                .map(|rule| RouteOutput {
                    template: rule.template().to_string(),
                    pointers: rule.pointers().iter().map(ToString::to_string).collect(),
                })
                .collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
