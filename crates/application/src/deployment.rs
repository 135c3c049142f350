//! Deployment Publisher
//!
//! Takes a named artifact and an environment and performs an idempotent
//! publish. The invoking run must hold environment-scoped write
//! authorization; its absence is fatal and never retried.

use ibai_core::deployment::{DeploymentRecord, RunAuthorization};
use ibai_core::{Artifact, DomainError, EnvironmentName, Result};
use ibai_ports::{EventPublisher, PublishTarget, SystemEvent};
use std::sync::Arc;
use tracing::{info, warn};

/// Deployment Publisher service
pub struct DeploymentPublisher<P, E>
where
    P: PublishTarget + Send + Sync,
    E: EventPublisher + Send + Sync,
{
    target: Arc<P>,
    event_bus: Arc<E>,
}

impl<P, E> DeploymentPublisher<P, E>
where
    P: PublishTarget + Send + Sync,
    E: EventPublisher + Send + Sync,
{
    pub fn new(target: Arc<P>, event_bus: Arc<E>) -> Self {
        Self { target, event_bus }
    }

    /// Publish an artifact to an environment.
    ///
    /// Idempotent per (environment, content hash): re-publishing identical
    /// content skips the upload and still returns a success record.
    pub async fn publish(
        &self,
        authorization: &RunAuthorization,
        environment: &EnvironmentName,
        artifact: &Artifact,
    ) -> Result<DeploymentRecord> {
        if !authorization.allows(environment) {
            return Err(DomainError::Authorization(format!(
                "run is not authorized to deploy to environment '{}'",
                environment
            )));
        }

        let content_hash = artifact.content_hash();

        let current = self
            .target
            .current_deployment(environment)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("publish target: {}", e)))?;

        let (live, reused) = match current {
            Some(live) if live.content_hash == content_hash => {
                info!(
                    "environment '{}' already serves {}, skipping upload",
                    environment,
                    content_hash.short()
                );
                (live, true)
            }
            _ => {
                let live = self
                    .target
                    .upload(environment, artifact)
                    .await
                    .map_err(|e| DomainError::Infrastructure(format!("publish target: {}", e)))?;
                (live, false)
            }
        };

        let record = DeploymentRecord {
            environment: environment.clone(),
            content_hash,
            url: live.url.clone(),
            published_at: chrono::Utc::now(),
            reused,
        };

        if let Err(e) = self
            .event_bus
            .publish(SystemEvent::DeploymentPublished {
                environment: environment.to_string(),
                url: live.url,
                reused,
            })
            .await
        {
            warn!("failed to publish deployment event: {}", e);
        }

        Ok(record)
    }
}
