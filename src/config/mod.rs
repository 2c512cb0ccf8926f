pub mod validation;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Where backend secrets are looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretProvider {
    #[default]
    Vault,
    Env,
    Static,
}

impl fmt::Display for SecretProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretProvider::Vault => write!(f, "vault"),
            SecretProvider::Env => write!(f, "env"),
            SecretProvider::Static => write!(f, "static"),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Default timeout in seconds for non-streaming backend calls.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    pub http_pool_idle_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_base_path() -> String {
    "/api/v1".to_string()
}
fn default_timeout() -> u64 {
    60
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            base_path: default_base_path(),
            timeout: default_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            runtime_worker_threads: None,
        }
    }
}

/// Inference backend defaults applied by the request shaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Deployment used for chat routes when the caller names none.
    #[serde(default)]
    pub default_deployment: Option<String>,
    /// Deployment used for embedding routes; falls back to `default_deployment`.
    #[serde(default)]
    pub default_embedding_deployment: Option<String>,
}

fn default_api_version() -> String {
    "2024-05-01-preview".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            default_deployment: None,
            default_embedding_deployment: None,
        }
    }
}

/// Secret store location and the names of the two backend secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default)]
    pub provider: SecretProvider,
    #[serde(default)]
    pub vault_name: Option<String>,
    #[serde(default)]
    pub vault_url: Option<String>,
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    #[serde(default)]
    pub env_prefix: String,
    pub endpoint_secret: String,
    pub key_secret: String,
    #[serde(default, skip_serializing)]
    pub values: FxHashMap<String, String>,
}

fn default_access_token_env() -> String {
    "AZURE_ACCESS_TOKEN".to_string()
}

impl SecretsConfig {
    /// Vault base URL, derived from `vault_name` when not given explicitly.
    #[must_use]
    pub fn effective_vault_url(&self) -> Option<String> {
        if let Some(url) = self.vault_url.as_deref().map(str::trim) {
            if !url.is_empty() {
                return Some(url.trim_end_matches('/').to_string());
            }
        }
        self.vault_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| format!("https://{name}.vault.azure.net"))
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] or [`ConfigError::Validation`].
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}
