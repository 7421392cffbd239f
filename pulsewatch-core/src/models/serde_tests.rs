//! Serde serialization/deserialization tests for core types.
//!
//! These cover the on-disk usage record and the enums that appear in
//! settings files, where a format change would silently lose state.

use chrono::{Local, TimeZone};
use serde_json::json;

use crate::{PersistedUsage, PlanTier, PulseSnapshot, UsageState};

// ============================================================================
// PlanTier Serde Tests
// ============================================================================

#[test]
fn test_plan_tier_serde_roundtrip_all_variants() {
    for plan in PlanTier::all() {
        let json = serde_json::to_string(plan).unwrap();
        let deserialized: PlanTier = serde_json::from_str(&json).unwrap();
        assert_eq!(*plan, deserialized, "Round-trip failed for {:?}", plan);
    }
}

#[test]
fn test_plan_tier_deserialize_lowercase() {
    let plan: PlanTier = serde_json::from_str(r#""enthusiast""#).unwrap();
    assert_eq!(plan, PlanTier::Enthusiast);

    let result: Result<PlanTier, _> = serde_json::from_str(r#""Enterprise""#);
    assert!(result.is_err());
}

// ============================================================================
// PersistedUsage Serde Tests
// ============================================================================

#[test]
fn test_persisted_usage_accepts_legacy_shape() {
    // Files written before window_start existed only carry count + last_call.
    let value = json!({
        "count": 4800,
        "last_call": "2025-07-17T21:15:00+00:00"
    });

    let persisted: PersistedUsage = serde_json::from_value(value).unwrap();
    assert_eq!(persisted.count, 4800);
    assert!(persisted.window_start.is_none());
}

#[test]
fn test_persisted_usage_roundtrip_through_state() {
    let now = Local.with_ymd_and_hms(2025, 7, 18, 9, 30, 0).unwrap();
    let mut state = UsageState::new(now);
    state.apply(7, now);

    let json = serde_json::to_string(&state.to_persisted()).unwrap();
    let restored: PersistedUsage = serde_json::from_str(&json).unwrap();
    let rebuilt = UsageState::from_persisted(&restored);

    assert_eq!(rebuilt.count_today, 7);
    assert_eq!(rebuilt.last_call_at, now);
    assert_eq!(rebuilt.window_start, now);
}

// ============================================================================
// PulseSnapshot Serde Tests
// ============================================================================

#[test]
fn test_snapshot_serializes_three_maps() {
    let snapshot = PulseSnapshot::new();
    let value = serde_json::to_value(&snapshot).unwrap();

    assert!(value.get("devices").is_some());
    assert!(value.get("hubs").is_some());
    assert!(value.get("sensors").is_some());
    assert!(value.get("fetched_at").is_some());
}
