use async_trait::async_trait;

use super::{SecretError, SecretStore};

/// Reads secrets from environment variables.
///
/// A secret named `foundry-endpoint` with prefix `GATEWAY_` is read from
/// `GATEWAY_FOUNDRY_ENDPOINT`.
pub struct EnvSecretStore {
    prefix: String,
}

impl EnvSecretStore {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn variable_name(&self, secret_name: &str) -> String {
        let mut out = String::with_capacity(self.prefix.len() + secret_name.len());
        out.push_str(&self.prefix);
        for ch in secret_name.chars() {
            if ch.is_ascii_alphanumeric() {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push('_');
            }
        }
        out
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let var = self.variable_name(name);
        match std::env::var(&var) {
            Ok(value) => Ok(value),
            Err(std::env::VarError::NotPresent) => Err(SecretError::NotFound(name.to_string())),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::Unavailable(format!(
                "environment variable {var} is not valid unicode"
            ))),
        }
    }

    fn describe(&self) -> &'static str {
        "env"
    }
}
