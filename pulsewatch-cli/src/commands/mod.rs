//! CLI command implementations.

pub mod check;
pub mod config;
pub mod poll;
pub mod schema;
pub mod usage;

use anyhow::Result;
use pulsewatch_store::{Session, Settings, SettingsStore, keychain};
use tracing::debug;

use crate::Cli;

/// Loads settings, applying `--mock` on top of the saved value.
pub async fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = SettingsStore::load_default().await?.get().await;
    if cli.mock {
        settings.mock = true;
    }
    Ok(settings)
}

/// Opens a session for `settings`, resolving the API key first.
pub async fn open_session(settings: Settings) -> Result<Session> {
    let (api_key, source) = keychain::resolve_api_key(&settings)?;
    debug!(source = ?source, "Resolved API key");

    let usage_path = settings.usage_path();
    Ok(Session::open(settings, &api_key, usage_path).await?)
}
