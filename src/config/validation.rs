use super::{AppConfig, ConfigError, SecretProvider};

const VALID_LOG_LEVELS: &[&str] = &[
    "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "TRACE", "DISABLED",
];

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_backend_config(config)?;
    validate_secrets_config(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.port == 0 {
        return Err(validation_err("server.port must be greater than 0"));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_backend_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.backend.api_version.trim().is_empty() {
        return Err(validation_err("backend.api_version cannot be empty"));
    }
    for (field, value) in [
        ("default_deployment", &config.backend.default_deployment),
        (
            "default_embedding_deployment",
            &config.backend.default_embedding_deployment,
        ),
    ] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(validation_err(format!(
                "backend.{field} cannot be blank when set"
            )));
        }
    }
    Ok(())
}

fn validate_secrets_config(config: &AppConfig) -> Result<(), ConfigError> {
    let secrets = &config.secrets;
    if secrets.endpoint_secret.trim().is_empty() {
        return Err(validation_err("secrets.endpoint_secret cannot be empty"));
    }
    if secrets.key_secret.trim().is_empty() {
        return Err(validation_err("secrets.key_secret cannot be empty"));
    }

    match secrets.provider {
        SecretProvider::Vault => {
            let Some(url) = secrets.effective_vault_url() else {
                return Err(validation_err(
                    "secrets.vault_name or secrets.vault_url is required for the vault provider",
                ));
            };
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(validation_err(
                    "secrets.vault_url must start with http:// or https://",
                ));
            }
            if secrets.access_token_env.trim().is_empty() {
                return Err(validation_err("secrets.access_token_env cannot be empty"));
            }
        }
        SecretProvider::Static => {
            for name in [&secrets.endpoint_secret, &secrets.key_secret] {
                if !secrets.values.contains_key(name) {
                    return Err(validation_err(format!(
                        "secrets.values is missing '{name}' for the static provider"
                    )));
                }
            }
        }
        SecretProvider::Env => {}
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "features.log_level '{}' is invalid. Must be one of: {}",
            config.features.log_level,
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}
