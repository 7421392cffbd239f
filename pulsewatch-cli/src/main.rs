// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `PulseWatch` CLI - quota-aware polling of the Pulse sensor cloud.
//!
//! # Examples
//!
//! ```bash
//! # Show today's datapoint usage
//! pulsewatch
//!
//! # Poll once and print the snapshot
//! pulsewatch poll --once
//!
//! # Poll every two minutes
//! pulsewatch poll --interval 120
//!
//! # Offline, against canned data
//! pulsewatch --mock poll --once
//!
//! # JSON output
//! pulsewatch --format json --pretty usage
//!
//! # Compiled billing rules
//! pulsewatch schema
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{check, config, poll, schema, usage};

// ============================================================================
// CLI Definition
// ============================================================================

/// `PulseWatch` CLI - Pulse sensor polling with datapoint accounting.
#[derive(Parser)]
#[command(name = "pulsewatch")]
#[command(about = "Quota-aware Pulse sensor poller")]
#[command(long_about = r#"
PulseWatch polls the Pulse Labs cloud API for the latest readings of your
devices, hubs and attached sensors, and keeps a running count of the
datapoints each call bills against your plan's daily limit.

Plans:
  • hobbyist       4,800 datapoints/day
  • enthusiast    24,000 datapoints/day
  • professional 120,000 datapoints/day

Examples:
  pulsewatch                      # Today's usage
  pulsewatch poll --once          # One poll, print the snapshot
  pulsewatch poll                 # Poll on the configured interval
  pulsewatch --mock check         # Connectivity check against canned data
  pulsewatch config set-key KEY   # Store the API key in the keychain
"#)]
#[command(version)]
#[command(author = "PulseWatch Contributors")]
pub struct Cli {
    /// Subcommand to run. If none, runs 'usage' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Use canned responses instead of the hosted API.
    #[arg(long, global = true)]
    pub mock: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show today's datapoint usage (default if no command specified).
    #[command(visible_alias = "u")]
    Usage,

    /// Poll the API and print normalized readings.
    #[command(visible_alias = "p")]
    Poll(poll::PollArgs),

    /// One-time connectivity check.
    Check,

    /// Show the compiled per-route billing rules.
    Schema,

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// No API key or invalid settings.
    ConfigError = 2,
    /// The API could not be reached and nothing was cached.
    FetchFailed = 3,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("pulsewatch=debug,info")
        } else {
            EnvFilter::new("pulsewatch=warn")
        }
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Usage) | None => usage::run(&cli).await,
        Some(Commands::Poll(args)) => poll::run(args, &cli).await,
        Some(Commands::Check) => check::run(&cli).await,
        Some(Commands::Schema) => schema::run(&cli).await,
        Some(Commands::Config(args)) => config::run(args, &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(exit_code_for(&e) as i32);
    }

    Ok(())
}

fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    if let Some(store) = error.downcast_ref::<pulsewatch_store::StoreError>() {
        if matches!(store, pulsewatch_store::StoreError::Config(_)) {
            return ExitCode::ConfigError;
        }
    }
    if error.downcast_ref::<pulsewatch_store::PollError>().is_some() {
        return ExitCode::FetchFailed;
    }
    ExitCode::Error
}
