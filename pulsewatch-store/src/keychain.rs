//! API key storage in the system keychain.
//!
//! - macOS: Keychain Services
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet)
//!
//! Each instance gets its own service entry, `PulseWatch-<instance>`.

use keyring::Entry;
use tracing::debug;

use crate::error::StoreError;
use crate::settings_store::Settings;

/// Service name prefix.
const SERVICE_PREFIX: &str = "PulseWatch";

/// Account name under the service.
const ACCOUNT: &str = "api_key";

/// Keychain service name for an instance.
pub fn service_name(instance_id: &str) -> String {
    format!("{SERVICE_PREFIX}-{instance_id}")
}

fn entry(instance_id: &str) -> Result<Entry, StoreError> {
    Entry::new(&service_name(instance_id), ACCOUNT)
        .map_err(|e| StoreError::Keychain(format!("failed to open keychain entry: {e}")))
}

/// Stores an API key.
pub fn store_api_key(instance_id: &str, api_key: &str) -> Result<(), StoreError> {
    entry(instance_id)?
        .set_password(api_key)
        .map_err(|e| StoreError::Keychain(format!("failed to store API key: {e}")))?;

    debug!(instance = instance_id, "API key stored in keychain");
    Ok(())
}

/// Reads an API key. Missing, empty and unreadable entries are all `None`.
pub fn get_api_key(instance_id: &str) -> Option<String> {
    let key = entry(instance_id).ok()?.get_password().ok()?;
    if key.trim().is_empty() {
        return None;
    }

    debug!(instance = instance_id, "API key read from keychain");
    Some(key)
}

/// Deletes an API key. Deleting a missing key succeeds.
pub fn delete_api_key(instance_id: &str) -> Result<(), StoreError> {
    match entry(instance_id)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => {
            debug!(instance = instance_id, "API key removed from keychain");
            Ok(())
        }
        Err(e) => Err(StoreError::Keychain(format!("failed to delete API key: {e}"))),
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Where a resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// The environment variable named in settings.
    Environment,
    /// The system keychain.
    Keychain,
    /// Mock mode, no key needed.
    Mock,
}

/// Finds the API key: mock mode first, then the environment, then the
/// keychain.
pub fn resolve_api_key(settings: &Settings) -> Result<(String, KeySource), StoreError> {
    resolve_with(settings, |name| std::env::var(name).ok(), get_api_key)
}

fn resolve_with(
    settings: &Settings,
    env: impl Fn(&str) -> Option<String>,
    keychain: impl Fn(&str) -> Option<String>,
) -> Result<(String, KeySource), StoreError> {
    if settings.mock {
        return Ok(("mock".to_string(), KeySource::Mock));
    }

    if let Some(key) = env(&settings.api_key_env).filter(|k| !k.trim().is_empty()) {
        return Ok((key.trim().to_string(), KeySource::Environment));
    }

    if let Some(key) = keychain(&settings.instance_id) {
        return Ok((key, KeySource::Keychain));
    }

    Err(StoreError::Config(format!(
        "no API key: set {} or run `pulsewatch config set-key`",
        settings.api_key_env
    )))
}
