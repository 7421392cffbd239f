//! Config command - manage configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use pulsewatch_core::PlanTier;
use pulsewatch_store::keychain::{self, KeySource};
use pulsewatch_store::{Settings, SettingsStore, default_config_dir, default_settings_path};
use std::io::BufRead;
use tracing::info;

use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Set the subscription plan used for the daily limit.
    SetPlan {
        /// Plan: hobbyist, enthusiast, professional.
        plan: String,
    },

    /// Set the poll interval.
    SetInterval {
        /// Seconds between polls.
        secs: u64,
    },

    /// Store the API key in the system keychain.
    SetKey {
        /// The key. Read from stdin when omitted.
        key: Option<String>,
    },

    /// Remove the API key from the system keychain.
    ClearKey,

    /// Reset to defaults.
    Reset,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli).await,
        ConfigAction::Path => show_paths(cli).await,
        ConfigAction::SetPlan { plan } => set_plan(plan).await,
        ConfigAction::SetInterval { secs } => set_interval(*secs).await,
        ConfigAction::SetKey { key } => set_key(key.as_deref()).await,
        ConfigAction::ClearKey => clear_key().await,
        ConfigAction::Reset => reset_config().await,
    }
}

fn key_status(settings: &Settings) -> String {
    match keychain::resolve_api_key(settings) {
        Ok((_, KeySource::Mock)) => "not needed (mock)".to_string(),
        Ok((_, KeySource::Environment)) => format!("from ${}", settings.api_key_env),
        Ok((_, KeySource::Keychain)) => "from keychain".to_string(),
        Err(_) => "not set".to_string(),
    }
}

async fn show_config(cli: &Cli) -> Result<()> {
    let store = SettingsStore::load_default().await?;
    let settings = store.get().await;

    match cli.format {
        OutputFormat::Text => {
            println!("PulseWatch Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("API host:      {}", settings.base_url);
            println!(
                "Plan:          {} ({} datapoints/day)",
                settings.plan,
                settings.daily_limit()
            );
            println!("Poll interval: {}s", settings.poll_interval_secs);
            println!("Timeout:       {}s", settings.request_timeout_secs);
            println!(
                "API schema:    {}",
                settings
                    .schema_path
                    .as_ref()
                    .map_or_else(|| "bundled".to_string(), |p| p.display().to_string())
            );
            println!("Instance:      {}", settings.instance_id);
            println!("Mock mode:     {}", settings.mock);
            println!("API key:       {}", key_status(&settings));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            let mut output = serde_json::to_value(&settings)?;
            output["api_key"] = serde_json::Value::String(key_status(&settings));
            println!("{}", formatter.format(&output)?);
        }
    }

    Ok(())
}

async fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let settings_path = default_settings_path();
    let usage_path = SettingsStore::load_default().await?.get().await.usage_path();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Settings file: {}", settings_path.display());
            println!("Usage record:  {}", usage_path.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "settings_file": settings_path.display().to_string(),
                "usage_file": usage_path.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

async fn set_plan(plan: &str) -> Result<()> {
    let plan: PlanTier = plan.parse()?;

    let store = SettingsStore::load_default().await?;
    store.set_plan(plan).await;
    store.save().await?;

    info!(plan = %plan, "Plan updated");
    println!("Plan set to: {plan} ({} datapoints/day)", plan.daily_limit());

    Ok(())
}

async fn set_interval(secs: u64) -> Result<()> {
    let store = SettingsStore::load_default().await?;
    store.set_poll_interval(secs).await?;
    store.save().await?;

    info!(interval_secs = secs, "Poll interval updated");
    println!("Poll interval set to: {secs}s");

    Ok(())
}

async fn set_key(key: Option<&str>) -> Result<()> {
    let key = match key {
        Some(key) => key.trim().to_string(),
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim().to_string()
        }
    };
    if key.is_empty() {
        anyhow::bail!("API key is empty");
    }

    let settings = SettingsStore::load_default().await?.get().await;
    keychain::store_api_key(&settings.instance_id, &key)?;

    println!("API key stored for instance: {}", settings.instance_id);
    Ok(())
}

async fn clear_key() -> Result<()> {
    let settings = SettingsStore::load_default().await?.get().await;
    keychain::delete_api_key(&settings.instance_id)?;

    println!("API key removed for instance: {}", settings.instance_id);
    Ok(())
}

async fn reset_config() -> Result<()> {
    let path = default_settings_path();

    if path.exists() {
        tokio::fs::remove_file(&path).await?;
        info!(path = %path.display(), "Settings reset");
        println!("Configuration reset to defaults");
    } else {
        println!("No configuration file to reset");
    }

    Ok(())
}
