use std::sync::Arc;

use crate::client::InferenceClient;
use crate::config::AppConfig;
use crate::secrets::SharedSecretStore;
use crate::services::Services;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub client: Arc<InferenceClient>,
    pub services: Services,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, client: Arc<InferenceClient>) -> Self {
        let services = Services::new(&client);
        Self {
            config,
            client,
            services,
        }
    }

    /// Build state with the secret store selected by configuration.
    #[must_use]
    pub fn from_config(config: AppConfig) -> Self {
        let client = Arc::new(InferenceClient::from_config(&config));
        Self::new(config, client)
    }

    /// Build state over an explicit secret store.
    #[must_use]
    pub fn with_secret_store(config: AppConfig, store: SharedSecretStore) -> Self {
        let client = Arc::new(InferenceClient::from_config_with_store(&config, store));
        Self::new(config, client)
    }
}
