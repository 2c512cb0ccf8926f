use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;

use crate::config::SecretsConfig;
use crate::error::GatewayError;
use crate::secrets::SharedSecretStore;

/// Resolved backend location and key. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendCredentials {
    base_url: String,
    api_key: String,
}

impl BackendCredentials {
    /// Build credentials from already-resolved values. Trailing `/` on the
    /// base URL is dropped.
    #[must_use]
    pub fn new(base_url: impl AsRef<str>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.as_ref().trim().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for BackendCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendCredentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// One-time initialization gate over the secret store.
///
/// Concurrent first callers share a single in-flight lookup. A failed lookup
/// leaves the gate unset, so a later call performs a fresh attempt; nothing is
/// retried internally.
pub struct CredentialResolver {
    store: SharedSecretStore,
    endpoint_secret: String,
    key_secret: String,
    resolved: OnceCell<Arc<BackendCredentials>>,
}

impl CredentialResolver {
    #[must_use]
    pub fn new(
        store: SharedSecretStore,
        endpoint_secret: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        Self {
            store,
            endpoint_secret: endpoint_secret.into(),
            key_secret: key_secret.into(),
            resolved: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &SecretsConfig, store: SharedSecretStore) -> Self {
        Self::new(
            store,
            config.endpoint_secret.clone(),
            config.key_secret.clone(),
        )
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.initialized()
    }

    /// Return the credentials, resolving them on first use.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Initialization`] when the secret store fails, a
    /// secret is missing, or a resolved value is empty.
    pub async fn resolve(&self) -> Result<Arc<BackendCredentials>, GatewayError> {
        self.resolved
            .get_or_try_init(|| self.fetch())
            .await
            .cloned()
    }

    async fn fetch(&self) -> Result<Arc<BackendCredentials>, GatewayError> {
        let started = Instant::now();
        let values = self
            .store
            .get_secrets(&[self.endpoint_secret.as_str(), self.key_secret.as_str()])
            .await
            .map_err(|e| {
                tracing::error!(store = self.store.describe(), error = %e, "backend secret resolution failed");
                GatewayError::Initialization(format!("failed to resolve backend secrets: {e}"))
            })?;
        let [endpoint, api_key] = <[String; 2]>::try_from(values).map_err(|values| {
            GatewayError::Initialization(format!(
                "secret store returned {} values for 2 names",
                values.len()
            ))
        })?;

        let credentials = BackendCredentials::new(endpoint, api_key.trim());
        if credentials.base_url.is_empty() {
            return Err(GatewayError::Initialization(format!(
                "secret '{}' resolved to an empty endpoint",
                self.endpoint_secret
            )));
        }
        if credentials.api_key.is_empty() {
            return Err(GatewayError::Initialization(format!(
                "secret '{}' resolved to an empty key",
                self.key_secret
            )));
        }
        if http::HeaderValue::from_str(&credentials.api_key).is_err() {
            return Err(GatewayError::Initialization(format!(
                "secret '{}' is not usable as an api-key header value",
                self.key_secret
            )));
        }

        tracing::info!(
            store = self.store.describe(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend credentials resolved"
        );
        Ok(Arc::new(credentials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{SecretError, SecretStore, StaticSecretStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingStore {
        inner: StaticSecretStore,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl SecretStore for CountingStore {
        async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.inner.get_secret(name).await
        }

        fn describe(&self) -> &'static str {
            "counting"
        }
    }

    fn counting_store(values: &[(&str, &str)]) -> Arc<CountingStore> {
        Arc::new(CountingStore {
            inner: StaticSecretStore::new(values.iter().copied()),
            lookups: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_lookup() {
        let store = counting_store(&[("ep", "https://backend.example/models/"), ("key", "k")]);
        let resolver = CredentialResolver::new(store.clone(), "ep", "key");

        let results =
            futures_util::future::join_all((0..8).map(|_| resolver.resolve())).await;
        for result in results {
            let creds = result.unwrap();
            assert_eq!(creds.base_url(), "https://backend.example/models");
            assert_eq!(creds.api_key(), "k");
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);

        resolver.resolve().await.unwrap();
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
        assert!(resolver.is_resolved());
    }

    #[tokio::test]
    async fn test_missing_secret_is_initialization_error() {
        let store = counting_store(&[("ep", "https://backend.example")]);
        let resolver = CredentialResolver::new(store, "ep", "key");
        let err = resolver.resolve().await.unwrap_err();
        assert!(matches!(err, GatewayError::Initialization(ref msg) if msg.contains("'key'")));
        assert!(!resolver.is_resolved());
    }

    #[tokio::test]
    async fn test_failed_attempt_does_not_poison_gate() {
        let store = Arc::new(StaticSecretStore::new([("ep", "https://backend.example")]));
        let resolver = CredentialResolver::new(store.clone(), "ep", "key");
        assert!(resolver.resolve().await.is_err());

        store.insert("key", "late-key");
        let creds = resolver.resolve().await.unwrap();
        assert_eq!(creds.api_key(), "late-key");
    }

    #[tokio::test]
    async fn test_empty_values_rejected() {
        let store = Arc::new(StaticSecretStore::new([("ep", " / "), ("key", "k")]));
        let resolver = CredentialResolver::new(store, "ep", "key");
        assert!(matches!(
            resolver.resolve().await,
            Err(GatewayError::Initialization(_))
        ));

        let store = Arc::new(StaticSecretStore::new([("ep", "http://b"), ("key", "  ")]));
        let resolver = CredentialResolver::new(store, "ep", "key");
        assert!(matches!(
            resolver.resolve().await,
            Err(GatewayError::Initialization(_))
        ));
    }

    #[tokio::test]
    async fn test_key_with_control_characters_rejected() {
        let store = Arc::new(StaticSecretStore::new([
            ("ep", "http://b"),
            ("key", "abc\ndef"),
        ]));
        let resolver = CredentialResolver::new(store.clone(), "ep", "key");
        let err = resolver.resolve().await.unwrap_err();
        assert!(matches!(err, GatewayError::Initialization(ref msg) if msg.contains("'key'")));
        assert!(!resolver.is_resolved());

        store.insert("key", "abcdef");
        assert_eq!(resolver.resolve().await.unwrap().api_key(), "abcdef");
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = BackendCredentials::new("http://b/", "super-secret");
        assert_eq!(creds.base_url(), "http://b");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
