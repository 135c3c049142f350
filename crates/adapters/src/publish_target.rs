//! In-memory publish target adapter
//!
//! Hosts one live deployment per environment and hands out stable public
//! URLs. Upload counting makes idempotency observable in tests.

use async_trait::async_trait;
use ibai_core::{Artifact, EnvironmentName};
use ibai_ports::{LiveDeployment, PublishError, PublishTarget};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

struct Hosted {
    live: LiveDeployment,
    upload_count: u64,
}

/// In-memory static-file hosting target
pub struct InMemoryPublishTarget {
    environments: Arc<RwLock<HashMap<EnvironmentName, Hosted>>>,
}

impl InMemoryPublishTarget {
    pub fn new() -> Self {
        Self {
            environments: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of actual uploads an environment has received.
    pub async fn upload_count(&self, environment: &EnvironmentName) -> u64 {
        self.environments
            .read()
            .await
            .get(environment)
            .map(|h| h.upload_count)
            .unwrap_or(0)
    }
}

impl Default for InMemoryPublishTarget {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PublishTarget for InMemoryPublishTarget {
    async fn current_deployment(
        &self,
        environment: &EnvironmentName,
    ) -> Result<Option<LiveDeployment>, PublishError> {
        Ok(self
            .environments
            .read()
            .await
            .get(environment)
            .map(|h| h.live.clone()))
    }

    async fn upload(
        &self,
        environment: &EnvironmentName,
        artifact: &Artifact,
    ) -> Result<LiveDeployment, PublishError> {
        let content_hash = artifact.content_hash();
        let live = LiveDeployment {
            url: format!("https://{}.pages.example/{}", environment, content_hash.short()),
            content_hash,
        };

        let mut environments = self.environments.write().await;
        let hosted = environments
            .entry(environment.clone())
            .or_insert_with(|| Hosted {
                live: live.clone(),
                upload_count: 0,
            });
        hosted.live = live.clone();
        hosted.upload_count += 1;

        info!(
            "published artifact '{}' to environment '{}' at {}",
            artifact.name, environment, live.url
        );
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibai_core::Blob;

    #[tokio::test]
    async fn test_upload_and_current_deployment() {
        let target = InMemoryPublishTarget::new();
        let env = EnvironmentName::from("pages");
        let artifact = Artifact::new("site", Blob::new().with_file("index.html", b"v1".to_vec()));

        assert!(target.current_deployment(&env).await.unwrap().is_none());

        let live = target.upload(&env, &artifact).await.unwrap();
        assert_eq!(live.content_hash, artifact.content_hash());

        let current = target.current_deployment(&env).await.unwrap().unwrap();
        assert_eq!(current.url, live.url);
        assert_eq!(target.upload_count(&env).await, 1);
    }
}
