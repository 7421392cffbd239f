//! CLI output formatting tests.
//!
//! These tests verify that CLI output is correctly formatted for both
//! text and JSON output modes, using the canned offline account.

use chrono::{Local, Utc};
use pulsewatch_core::{PlanTier, PulseSnapshot, UsageReport};
use pulsewatch_fetch::SchemaIndex;
use pulsewatch_fetch::stub::canned_all_devices;
use pulsewatch_store::normalize;

fn canned_snapshot() -> PulseSnapshot {
    normalize(&canned_all_devices(), Utc::now()).unwrap()
}

fn report(used: u64, limit: u64, forecast: u64) -> UsageReport {
    UsageReport {
        used,
        limit,
        remaining: limit.saturating_sub(used),
        last_call_succeeded: true,
        last_call_at: Local::now(),
        forecast,
    }
}

#[cfg(test)]
mod text_formatter_tests {
    use super::super::text::TextFormatter;
    use super::*;

    #[test]
    fn test_snapshot_lists_every_entity() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_snapshot(&canned_snapshot(), true);

        assert!(output.contains("Readings (live)"));
        assert!(output.contains("Seedling Tent"));
        assert!(output.contains("Flower Room"));
        assert!(output.contains("Drying Cabinet"));
        assert!(output.contains("Veg Room Hub"));
        assert!(output.contains("Reservoir Probe"));
        assert!(output.contains("Water Temperature"));
    }

    #[test]
    fn test_snapshot_shows_derived_metrics() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_snapshot(&canned_snapshot(), true);

        assert!(output.contains("75.2°F"));
        assert!(output.contains("VPD 1.06 kPa"));
        assert!(output.contains("dew 62.4°F"));
    }

    #[test]
    fn test_cached_snapshot_is_flagged() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_snapshot(&canned_snapshot(), false);
        assert!(output.contains("cached, last update failed"));
    }

    #[test]
    fn test_empty_snapshot() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_snapshot(&PulseSnapshot::new(), true);
        assert!(output.contains("No devices reported"));
    }

    #[test]
    fn test_usage_figures() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_usage(&report(1_200, 4_800, 0), PlanTier::Hobbyist);

        assert!(output.contains("Datapoints (hobbyist)"));
        assert!(output.contains("75% left"));
        assert!(output.contains("1,200 / 4,800 used, 3,600 remaining"));
        assert!(!output.contains("Forecast"));
    }

    #[test]
    fn test_usage_over_limit() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_usage(&report(5_000, 4_800, 9_000), PlanTier::Hobbyist);

        assert!(output.contains("0% left"));
        assert!(output.contains("0 remaining"));
        assert!(output.contains("9,000 by end of day"));
    }

    #[test]
    fn test_forecast_over_limit_is_red() {
        let formatter = TextFormatter::new(true);
        let output = formatter.format_usage(&report(3_000, 4_800, 6_000), PlanTier::Hobbyist);
        assert!(output.contains("\x1b[31m6,000 by end of day"));
    }

    #[test]
    fn test_earlier_day_note() {
        let formatter = TextFormatter::new(false);
        let yesterday = Local::now() - chrono::Duration::days(1);
        let output = formatter.format_earlier_day_note(yesterday);

        assert!(output.contains(&yesterday.format("%Y-%m-%d").to_string()));
        assert!(output.contains("resets on the next billed call"));
    }

    #[test]
    fn test_check_counts() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_check("GrowMaster", &canned_snapshot());

        assert!(output.contains("Owner:   GrowMaster"));
        assert!(output.contains("Devices: 3"));
        assert!(output.contains("Hubs:    1"));
        assert!(output.contains("Sensors: 3"));
    }

    #[test]
    fn test_schema_lists_bundled_routes() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_schema(&SchemaIndex::bundled().unwrap(), "bundled");

        assert!(output.contains("/all-devices"));
        assert!(output.contains("deviceViewDtos[*].lastHourData[*]"));
    }

    #[test]
    fn test_empty_schema_warns() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_schema(&SchemaIndex::empty(), "broken.json");
        assert!(output.contains("every call bills 1 datapoint"));
    }

    #[test]
    fn test_no_colors_has_no_escapes() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_snapshot(&canned_snapshot(), true);
        assert!(!output.contains('\x1b'));
    }
}

#[cfg(test)]
mod json_formatter_tests {
    use super::super::json::JsonFormatter;
    use super::*;

    #[test]
    fn test_poll_output_shape() {
        let formatter = JsonFormatter::new(false);
        let output = formatter
            .format_poll(&canned_snapshot(), true, &report(5, 4_800, 0), PlanTier::Hobbyist)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["snapshot"]["fresh"], true);
        assert_eq!(value["snapshot"]["devices"]["10001"]["name"], "Seedling Tent");
        assert_eq!(value["snapshot"]["hubs"]["40004"]["deviceType"], 2);
        assert_eq!(value["usage"]["used"], 5);
        assert_eq!(value["usage"]["remaining"], 4_795);
        assert_eq!(value["usage"]["lastCallSucceeded"], true);
    }

    #[test]
    fn test_check_output() {
        let formatter = JsonFormatter::new(false);
        let output = formatter.check_output(
            "GrowMaster",
            &canned_snapshot(),
            &report(6, 24_000, 0),
            PlanTier::Enthusiast,
        );
        let value = serde_json::to_value(&output).unwrap();

        assert_eq!(value["owner"], "GrowMaster");
        assert_eq!(value["devices"], 3);
        assert_eq!(value["hubs"], 1);
        assert_eq!(value["sensors"], 3);
        assert_eq!(value["usage"]["plan"], "enthusiast");
    }

    #[test]
    fn test_schema_output() {
        let formatter = JsonFormatter::new(false);
        let output = formatter.schema_output(&SchemaIndex::bundled().unwrap(), "bundled");

        let all_devices = output
            .routes
            .iter()
            .find(|r| r.template == "/all-devices")
            .unwrap();
        assert_eq!(all_devices.pointers.len(), 4);
        assert!(output.routes.iter().all(|r| r.template != "/users"));
    }
}
