/*!
 * Credential storage.
 *
 * The core never persists keys itself; it reads them through a [`SecretStore`]
 * for the lifetime of one provider configuration. Keys are addressed by
 * [`EngineIdentifier::secret_key`](crate::engine::EngineIdentifier::secret_key).
 */

use anyhow::Context;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Where we store secrets in the OS keyring
const SERVICE: &str = "screentrans";

/// Environment variable prefix read by [`EnvSecretStore`]
const ENV_PREFIX: &str = "SCREENTRANS";

/// Credentials for one engine or engine instance
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl Secret {
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: key.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &str| if v.is_empty() { "" } else { "[REDACTED]" };
        f.debug_struct("Secret")
            .field("api_key", &redact(&self.api_key))
            .field("app_id", &self.app_id)
            .field("extra", &self.extra.as_deref().map(redact))
            .finish()
    }
}

/// Synchronized credential storage provided by the host
pub trait SecretStore: Send + Sync {
    fn get_secret(&self, key: &str) -> anyhow::Result<Option<Secret>>;

    fn set_secret(&self, key: &str, secret: &Secret) -> anyhow::Result<()>;

    fn delete_secret(&self, key: &str) -> anyhow::Result<()>;

    /// Whether a non-empty key is stored, without touching the network
    fn has_secret(&self, key: &str) -> bool {
        matches!(self.get_secret(key), Ok(Some(secret)) if !secret.is_empty())
    }
}

/// Process-local store, used by tests and embedding hosts
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<String, Secret>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, key: &str, secret: Secret) -> Self {
        self.secrets.write().insert(key.to_string(), secret);
        self
    }
}

impl SecretStore for InMemorySecretStore {
    fn get_secret(&self, key: &str) -> anyhow::Result<Option<Secret>> {
        Ok(self.secrets.read().get(key).cloned())
    }

    fn set_secret(&self, key: &str, secret: &Secret) -> anyhow::Result<()> {
        self.secrets.write().insert(key.to_string(), secret.clone());
        Ok(())
    }

    fn delete_secret(&self, key: &str) -> anyhow::Result<()> {
        self.secrets.write().remove(key);
        Ok(())
    }
}

/// Read-only store backed by `SCREENTRANS_<KEY>_API_KEY` / `_APP_ID` variables
#[derive(Debug, Default, Clone)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    fn variable(key: &str, suffix: &str) -> String {
        format!("{}_{}_{}", ENV_PREFIX, key.to_uppercase(), suffix)
    }
}

impl SecretStore for EnvSecretStore {
    fn get_secret(&self, key: &str) -> anyhow::Result<Option<Secret>> {
        let api_key = match std::env::var(Self::variable(key, "API_KEY")) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => return Ok(None),
        };
        Ok(Some(Secret {
            api_key,
            app_id: std::env::var(Self::variable(key, "APP_ID")).ok(),
            extra: None,
        }))
    }

    fn set_secret(&self, key: &str, _secret: &Secret) -> anyhow::Result<()> {
        anyhow::bail!("environment secrets are read-only (set {})", Self::variable(key, "API_KEY"))
    }

    fn delete_secret(&self, key: &str) -> anyhow::Result<()> {
        anyhow::bail!("environment secrets are read-only (unset {})", Self::variable(key, "API_KEY"))
    }
}

/// OS keyring store; each entry holds the JSON-encoded [`Secret`]
#[derive(Debug, Default, Clone)]
pub struct KeyringSecretStore;

impl KeyringSecretStore {
    fn entry(key: &str) -> anyhow::Result<keyring::Entry> {
        keyring::Entry::new(SERVICE, &entry_user(key)).context("create keyring entry")
    }
}

fn entry_user(key: &str) -> String {
    format!("{}_credentials", key)
}

impl SecretStore for KeyringSecretStore {
    fn get_secret(&self, key: &str) -> anyhow::Result<Option<Secret>> {
        let entry = Self::entry(key)?;
        match entry.get_password() {
            Ok(raw) => {
                let secret = serde_json::from_str(&raw).unwrap_or_else(|_| Secret::api_key(raw));
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow::Error::new(e)).context("get secret"),
        }
    }

    fn set_secret(&self, key: &str, secret: &Secret) -> anyhow::Result<()> {
        let raw = serde_json::to_string(secret).context("encode secret")?;
        Self::entry(key)?.set_password(&raw).context("set secret")
    }

    fn delete_secret(&self, key: &str) -> anyhow::Result<()> {
        match Self::entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e)).context("delete secret"),
        }
    }
}
