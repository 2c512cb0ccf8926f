use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{SecretError, SecretStore};

const VAULT_API_VERSION: &str = "7.4";
const VAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct SecretBundle {
    #[serde(default)]
    value: Option<String>,
}

/// Key-Vault-compatible REST secret store.
///
/// Each lookup batch opens one short-lived HTTP session authenticated with a
/// bearer token read from `access_token_env`, and drops it afterwards.
pub struct VaultSecretStore {
    vault_url: String,
    access_token_env: String,
}

impl VaultSecretStore {
    #[must_use]
    pub fn new(vault_url: impl Into<String>, access_token_env: impl Into<String>) -> Self {
        Self {
            vault_url: vault_url.into(),
            access_token_env: access_token_env.into(),
        }
    }

    fn secret_url(&self, name: &str) -> Result<url::Url, SecretError> {
        let mut url = url::Url::parse(&self.vault_url)
            .map_err(|e| SecretError::Unavailable(format!("invalid vault URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| SecretError::Unavailable("vault URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("secrets")
            .push(name);
        url.query_pairs_mut()
            .append_pair("api-version", VAULT_API_VERSION);
        Ok(url)
    }

    fn access_token(&self) -> Result<String, SecretError> {
        std::env::var(&self.access_token_env).map_err(|_| {
            SecretError::Unavailable(format!(
                "vault access token variable {} is not set",
                self.access_token_env
            ))
        })
    }

    fn open_session() -> Result<reqwest::Client, SecretError> {
        reqwest::Client::builder()
            .timeout(VAULT_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| SecretError::Unavailable(format!("failed to open vault session: {e}")))
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        token: &str,
        name: &str,
    ) -> Result<String, SecretError> {
        let url = self.secret_url(name)?;
        let response = client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SecretError::Unavailable(format!("vault request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound(name.to_string()));
        }
        if !status.is_success() {
            return Err(SecretError::Unavailable(format!(
                "vault returned status {} for secret '{name}'",
                status.as_u16()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SecretError::Unavailable(format!("failed to read vault response: {e}")))?;
        let bundle: SecretBundle = serde_json::from_slice(&body)
            .map_err(|e| SecretError::Unavailable(format!("invalid vault response: {e}")))?;
        bundle
            .value
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let token = self.access_token()?;
        let client = Self::open_session()?;
        self.fetch(&client, &token, name).await
    }

    async fn get_secrets(&self, names: &[&str]) -> Result<Vec<String>, SecretError> {
        let token = self.access_token()?;
        let client = Self::open_session()?;
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            values.push(self.fetch(&client, &token, name).await?);
        }
        tracing::debug!(count = names.len(), "vault session closed");
        Ok(values)
    }

    fn describe(&self) -> &'static str {
        "vault"
    }
}
