//! Secret Store Port
//!
//! Supplies named secret values injected into a job's environment at
//! execution time. The core resolves secrets once per run and never persists
//! them beyond it.

use async_trait::async_trait;
use std::collections::HashMap;

/// Secret store error types
#[derive(thiserror::Error, Debug)]
pub enum SecretStoreError {
    #[error("secret '{0}' is not defined")]
    Missing(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Secret value wrapper that never leaks through Debug or Display
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretValue(***)")
    }
}

/// Secret store port
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Resolve every named secret or fail with the first missing name.
    async fn resolve(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, SecretValue>, SecretStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_value_redacts_debug() {
        let secret = SecretValue::new("hunter2");
        assert_eq!(format!("{:?}", secret), "SecretValue(***)");
        assert_eq!(secret.expose(), "hunter2");
    }
}
