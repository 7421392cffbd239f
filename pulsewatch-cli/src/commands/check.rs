//! Check command - one-time connectivity check.

use anyhow::Result;

use super::{load_settings, open_session};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the check command.
///
/// Calls `/users` and `/all-devices` once each; both are billed.
pub async fn run(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli).await?;
    let session = open_session(settings).await?;

    let result = check(&session, cli).await;
    session.close().await?;
    result
}

async fn check(session: &pulsewatch_store::Session, cli: &Cli) -> Result<()> {
    let owner = session.api.owner_name().await?;
    let outcome = session.coordinator.refresh().await?;
    let report = session.usage.report(session.settings.daily_limit()).await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_check(&owner, &outcome.snapshot));
            println!();
            println!("{}", formatter.format_usage(&report, session.settings.plan));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            let output = formatter.check_output(
                &owner,
                &outcome.snapshot,
                &report,
                session.settings.plan,
            );
            println!("{}", formatter.format(&output)?);
        }
    }

    Ok(())
}
