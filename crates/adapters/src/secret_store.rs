//! Secret store adapters

use async_trait::async_trait;
use ibai_ports::{SecretStore, SecretStoreError, SecretValue};
use std::collections::HashMap;

/// Secret store backed by a fixed map, for embedding hosts and tests
pub struct StaticSecretStore {
    secrets: HashMap<String, SecretValue>,
}

impl StaticSecretStore {
    pub fn new(secrets: HashMap<String, String>) -> Self {
        Self {
            secrets: secrets
                .into_iter()
                .map(|(k, v)| (k, SecretValue::new(v)))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            secrets: HashMap::new(),
        }
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn resolve(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, SecretValue>, SecretStoreError> {
        let mut resolved = HashMap::new();
        for name in names {
            let value = self
                .secrets
                .get(name)
                .cloned()
                .ok_or_else(|| SecretStoreError::Missing(name.clone()))?;
            resolved.insert(name.clone(), value);
        }
        Ok(resolved)
    }
}

/// Secret store reading process environment variables under a prefix
///
/// A secret named `ANALYSIS_TOKEN` resolves from `<PREFIX>ANALYSIS_TOKEN`.
pub struct EnvSecretStore {
    prefix: String,
}

impl EnvSecretStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn resolve(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, SecretValue>, SecretStoreError> {
        let mut resolved = HashMap::new();
        for name in names {
            let var = format!("{}{}", self.prefix, name);
            let value = std::env::var(&var)
                .map_err(|_| SecretStoreError::Missing(name.clone()))?;
            resolved.insert(name.clone(), SecretValue::new(value));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_store_resolves_or_fails() {
        let mut secrets = HashMap::new();
        secrets.insert("ANALYSIS_TOKEN".to_string(), "t0k3n".to_string());
        let store = StaticSecretStore::new(secrets);

        let resolved = store
            .resolve(&["ANALYSIS_TOKEN".to_string()])
            .await
            .unwrap();
        assert_eq!(resolved["ANALYSIS_TOKEN"].expose(), "t0k3n");

        let missing = store.resolve(&["OTHER".to_string()]).await;
        assert!(matches!(missing, Err(SecretStoreError::Missing(_))));
    }

    #[tokio::test]
    async fn test_env_store_reads_prefixed_variables() {
        std::env::set_var("IBAI_TEST_SECRET_PAGES_TOKEN", "abc");
        let store = EnvSecretStore::new("IBAI_TEST_SECRET_");

        let resolved = store.resolve(&["PAGES_TOKEN".to_string()]).await.unwrap();
        assert_eq!(resolved["PAGES_TOKEN"].expose(), "abc");
        std::env::remove_var("IBAI_TEST_SECRET_PAGES_TOKEN");
    }
}
