//! Usage command - show the persisted datapoint count.

use anyhow::Result;
use chrono::Local;
use pulsewatch_core::{PersistedUsage, UsageReport, UsageState};
use pulsewatch_store::load_json_opt;
use tracing::{debug, info};

use super::load_settings;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the usage command.
///
/// Reads the usage record without touching the API, so it never bills.
/// A record from an earlier day is shown as recorded, matching what
/// `poll` reports until its first billed call.
pub async fn run(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli).await?;
    let path = settings.usage_path();
    let now = Local::now();

    let persisted: Option<PersistedUsage> = load_json_opt(&path).await?;
    debug!(path = %path.display(), found = persisted.is_some(), "Loaded usage record");

    let (state, last_call) = match &persisted {
        Some(record) => (UsageState::from_persisted(record), Some(record.last_call)),
        None => (UsageState::new(now), None),
    };

    // The record resets on the next billed call, not on read, so an
    // earlier day's total is shown as recorded.
    let earlier_day = persisted.is_some() && state.is_stale_at(now);
    if earlier_day {
        info!(last_call = %state.last_call_at, "Usage record is from an earlier day");
    }

    let report = UsageReport::from_state(&state, settings.daily_limit(), now);

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_usage(&report, settings.plan));
            println!("{}", formatter.format_last_call(last_call, None));
            if earlier_day {
                println!("{}", formatter.format_earlier_day_note(state.last_call_at));
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            let output = formatter.usage_output(&report, settings.plan, last_call, None);
            println!("{}", formatter.format(&output)?);
        }
    }

    Ok(())
}
