//! Poll command - run the coordinator and print each snapshot.

use anyhow::Result;
use clap::Args;
use pulsewatch_core::PulseSnapshot;
use pulsewatch_store::Session;
use std::io::{Write, stdout};
use tracing::info;

use super::{load_settings, open_session};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the poll command.
#[derive(Args)]
pub struct PollArgs {
    /// Poll once and exit.
    #[arg(long)]
    pub once: bool,

    /// Seconds between polls (overrides the saved setting).
    #[arg(long, short)]
    pub interval: Option<u64>,
}

/// Runs the poll command.
pub async fn run(args: &PollArgs, cli: &Cli) -> Result<()> {
    let mut settings = load_settings(cli).await?;
    if let Some(secs) = args.interval {
        settings.poll_interval_secs = secs;
    }

    let session = open_session(settings).await?;

    let result = if args.once {
        poll_once(&session, cli).await
    } else {
        poll_forever(&session, cli).await
    };

    session.close().await?;
    result
}

async fn poll_once(session: &Session, cli: &Cli) -> Result<()> {
    let outcome = session.coordinator.refresh().await?;
    print_poll(session, cli, &outcome.snapshot, outcome.fresh, false).await
}

async fn poll_forever(session: &Session, cli: &Cli) -> Result<()> {
    let mut rx = session.coordinator.subscribe();
    let handle = session.coordinator.spawn();

    info!(
        interval_secs = session.settings.poll_interval_secs,
        "Polling until interrupted"
    );

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            changed = rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let latest = rx.borrow_and_update().clone();
                if let Some(snapshot) = latest {
                    if let Err(e) = print_poll(session, cli, &snapshot, true, true).await {
                        break Err(e);
                    }
                }
            }
        }
    };

    handle.abort();
    result
}

async fn print_poll(
    session: &Session,
    cli: &Cli,
    snapshot: &PulseSnapshot,
    fresh: bool,
    live: bool,
) -> Result<()> {
    let report = session.usage.report(session.settings.daily_limit()).await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            if live {
                // Clear screen
                print!("\x1b[2J\x1b[H");
                stdout().flush()?;
                let now = chrono::Local::now();
                println!(
                    "PulseWatch - {} (every {}s, Ctrl+C to exit)",
                    now.format("%H:%M:%S"),
                    session.settings.poll_interval_secs
                );
                println!("{}", "─".repeat(50));
                println!();
            }
            println!("{}", formatter.format_snapshot(snapshot, fresh));
            println!();
            println!("{}", formatter.format_usage(&report, session.settings.plan));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!(
                "{}",
                formatter.format_poll(snapshot, fresh, &report, session.settings.plan)?
            );
        }
    }

    Ok(())
}
