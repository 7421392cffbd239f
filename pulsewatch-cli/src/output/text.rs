//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Local};
use pulsewatch_core::{DeviceType, PlanTier, PulseSnapshot, Record, UsageReport};
use pulsewatch_fetch::SchemaIndex;
use serde_json::Value;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    /// Formats a normalized snapshot, one line per record.
    pub fn format_snapshot(&self, snapshot: &PulseSnapshot, fresh: bool) -> String {
        let mut lines = Vec::new();

        let fetched = snapshot.fetched_at.with_timezone(&Local);
        let status = if fresh {
            self.green("live")
        } else {
            self.yellow("cached, last update failed")
        };
        lines.push(format!(
            "{} ({}) {}",
            self.bold("Readings"),
            status,
            self.dim(&fetched.format("%H:%M:%S").to_string())
        ));

        if snapshot.is_empty() {
            lines.push(self.dim("No devices reported"));
            return lines.join("\n");
        }

        if !snapshot.devices.is_empty() {
            lines.push(String::new());
            lines.push(self.bold("Devices"));
            for (id, record) in &snapshot.devices {
                lines.push(self.format_device(id, record));
            }
        }

        if !snapshot.hubs.is_empty() {
            lines.push(String::new());
            lines.push(self.bold("Hubs"));
            for (id, record) in &snapshot.hubs {
                let name = text_field(record, "name").unwrap_or_else(|| id.clone());
                lines.push(format!("  {:<20} {}", name, self.dim(&format!("#{id}"))));
                for (_, sensor) in snapshot.sensors_for_hub(id) {
                    lines.push(self.format_sensor(sensor));
                }
            }
        }

        let orphans: Vec<_> = snapshot
            .sensors
            .values()
            .filter(|s| {
                s.get("hubId")
                    .and_then(Value::as_str)
                    .is_none_or(|hub| !snapshot.hubs.contains_key(hub))
            })
            .collect();
        if !orphans.is_empty() {
            lines.push(String::new());
            lines.push(self.bold("Sensors"));
            for sensor in orphans {
                lines.push(self.format_sensor(sensor));
            }
        }

        lines.join("\n")
    }

    fn format_device(&self, id: &str, record: &Record) -> String {
        let name = text_field(record, "name").unwrap_or_else(|| id.to_string());
        let model = DeviceType::parse(record.get("deviceType"));

        let mut readings = Vec::new();
        if let Some(t) = number_field(record, "temperatureF") {
            readings.push(format!("{t:.1}°F"));
        }
        if let Some(rh) = number_field(record, "humidityRh") {
            readings.push(format!("{rh:.1}% RH"));
        }
        if let Some(vpd) = number_field(record, "avpd_calculated") {
            readings.push(format!("VPD {vpd:.2} kPa"));
        }
        if let Some(vpd) = number_field(record, "lvpd_calculated") {
            readings.push(format!("leaf {vpd:.2} kPa"));
        }
        if let Some(dp) = number_field(record, "dpF_calculated") {
            readings.push(format!("dew {dp:.1}°F"));
        }

        let readings = if readings.is_empty() {
            self.dim("no data")
        } else {
            self.cyan(&readings.join("  "))
        };

        format!("  {:<20} {:<14} {}", name, self.dim(model.model_name()), readings)
    }

    fn format_sensor(&self, record: &Record) -> String {
        let sensor = text_field(record, "sensorName").unwrap_or_default();
        let Some(metric) = text_field(record, "valueName") else {
            return format!("    {:<18} {}", sensor, self.dim("no data"));
        };

        let value = match record.get("value") {
            Some(Value::Number(n)) => n.as_f64().map_or_else(|| n.to_string(), |v| format!("{v:.2}")),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "−".to_string(),
        };
        let unit = text_field(record, "measuringUnit").unwrap_or_default();

        format!(
            "    {:<18} {:<18} {}",
            sensor,
            metric,
            self.cyan(format!("{value} {unit}").trim_end())
        )
    }

    /// Formats the result of a connectivity check.
    pub fn format_check(&self, owner: &str, snapshot: &PulseSnapshot) -> String {
        let mut lines = Vec::new();
        lines.push(format!("{} {}", self.green("✓"), self.bold("Connected")));
        lines.push(format!("Owner:   {}", self.cyan(owner)));
        lines.push(format!("Devices: {}", snapshot.devices.len()));
        lines.push(format!("Hubs:    {}", snapshot.hubs.len()));
        lines.push(format!("Sensors: {}", snapshot.sensors.len()));
        lines.join("\n")
    }

    // ========================================================================
    // Usage
    // ========================================================================

    /// Formats daily datapoint usage with a progress bar of what is left.
    #[allow(clippy::cast_precision_loss)]
    pub fn format_usage(&self, report: &UsageReport, plan: PlanTier) -> String {
        let mut lines = Vec::new();

        lines.push(format!("{} ({})", self.bold("Datapoints"), plan));

        let remaining_pct = (100.0 - report.used_percent()).max(0.0);
        let bar = self.progress_bar(remaining_pct);
        let pct = self.color_for_percent(remaining_pct, &format!("{remaining_pct:.0}% left"));
        lines.push(format!("{:<9} {} {}", "Today:", bar, pct));
        lines.push(format!(
            "{:<9} {} / {} used, {} remaining",
            "",
            format_count(report.used),
            format_count(report.limit),
            format_count(report.remaining)
        ));

        if report.forecast > 0 {
            let forecast = format!("{} by end of day", format_count(report.forecast));
            let forecast = if report.forecast > report.limit {
                self.red(&forecast)
            } else {
                self.dim(&forecast)
            };
            lines.push(format!("{:<9} {}", "Forecast:", forecast));
        }

        lines.join("\n")
    }

    /// Formats the time and outcome of the last call.
    pub fn format_last_call(&self, at: Option<DateTime<Local>>, succeeded: Option<bool>) -> String {
        let Some(at) = at else {
            return format!("{:<9} {}", "Last call:", self.dim("never"));
        };

        let when = if at.date_naive() == Local::now().date_naive() {
            format!("today at {}", at.format("%H:%M:%S"))
        } else {
            at.format("%Y-%m-%d %H:%M:%S").to_string()
        };

        match succeeded {
            Some(true) => format!("{:<9} {} {}", "Last call:", when, self.green("ok")),
            Some(false) => format!("{:<9} {} {}", "Last call:", when, self.red("failed")),
            None => format!("{:<9} {}", "Last call:", when),
        }
    }

    /// Notes that the figures above belong to an earlier day.
    pub fn format_earlier_day_note(&self, last_call: DateTime<Local>) -> String {
        self.yellow(&format!(
            "Recorded on {}; the count resets on the next billed call",
            last_call.format("%Y-%m-%d")
        ))
    }

    /// Formats a progress bar.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn progress_bar(&self, percent_remaining: f64) -> String {
        let filled = ((percent_remaining / 100.0) * self.bar_width as f64).round() as usize;
        let filled = filled.min(self.bar_width);
        let empty = self.bar_width - filled;

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_percent(percent_remaining, &bar)
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// Formats the compiled route rules.
    pub fn format_schema(&self, index: &SchemaIndex, source: &str) -> String {
        let mut lines = Vec::new();

        lines.push(format!("{} ({})", self.bold("Billing rules"), self.dim(source)));
        lines.push("─".repeat(50));

        if index.is_empty() {
            lines.push(self.yellow("No billable routes: every call bills 1 datapoint"));
            return lines.join("\n");
        }

        for rule in index.rules() {
            lines.push(self.cyan(rule.template()));
            for pointer in rule.pointers() {
                lines.push(format!("  {pointer}"));
            }
        }
        lines.push(String::new());
        lines.push(self.dim("Routes not listed bill 1 datapoint per call."));

        lines.join("\n")
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_percent(&self, percent: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        if percent < 20.0 {
            self.red(text)
        } else if percent < 50.0 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

/// Groups thousands: `24000` → `24,000`.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn text_field(record: &Record, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(record: &Record, key: &str) -> Option<f64> {
    record.get(key).and_then(Value::as_f64)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_full() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.progress_bar(100.0), "██████████");
    }

    #[test]
    fn test_progress_bar_empty() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.progress_bar(0.0), "░░░░░░░░░░");
    }

    #[test]
    fn test_progress_bar_clamps_overflow() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.progress_bar(150.0), "██████████");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(4_800), "4,800");
        assert_eq!(format_count(120_000), "120,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_color_for_percent() {
        let formatter = TextFormatter::new(true);
        assert!(formatter.color_for_percent(15.0, "test").contains(RED));
        assert!(formatter.color_for_percent(35.0, "test").contains(YELLOW));
        assert!(formatter.color_for_percent(75.0, "test").contains(GREEN));
    }

    #[test]
    fn test_last_call_never() {
        let formatter = TextFormatter::new(false);
        assert!(formatter.format_last_call(None, None).contains("never"));
    }
}
