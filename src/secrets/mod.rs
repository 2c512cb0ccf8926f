//! Async key/value lookup of backend secrets.
//!
//! The gateway only needs two secrets (the backend base URL and its API key),
//! fetched once by [`crate::credentials::CredentialResolver`]. The store itself
//! is an opaque collaborator behind [`SecretStore`].

mod env;
mod vault;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::config::{SecretProvider, SecretsConfig};

pub use env::EnvSecretStore;
pub use vault::VaultSecretStore;

/// Failure to look up a secret.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret '{0}' not found")]
    NotFound(String),
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Look up one secret value by name.
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;

    /// Look up several secrets in one session, in order.
    async fn get_secrets(&self, names: &[&str]) -> Result<Vec<String>, SecretError> {
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            values.push(self.get_secret(name).await?);
        }
        Ok(values)
    }

    /// Short label for logs.
    fn describe(&self) -> &'static str;
}

pub type SharedSecretStore = Arc<dyn SecretStore>;

/// In-memory store, used for local development and tests.
#[derive(Default)]
pub struct StaticSecretStore {
    values: RwLock<FxHashMap<String, String>>,
}

impl StaticSecretStore {
    #[must_use]
    pub fn new<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(name.into(), value.into());
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        self.values
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }

    fn describe(&self) -> &'static str {
        "static"
    }
}

/// Build the secret store selected by configuration.
#[must_use]
pub fn build_secret_store(config: &SecretsConfig) -> SharedSecretStore {
    match config.provider {
        SecretProvider::Static => Arc::new(StaticSecretStore::new(
            config
                .values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        )),
        SecretProvider::Env => Arc::new(EnvSecretStore::new(config.env_prefix.clone())),
        SecretProvider::Vault => Arc::new(VaultSecretStore::new(
            config.effective_vault_url().unwrap_or_default(),
            config.access_token_env.clone(),
        )),
    }
}
