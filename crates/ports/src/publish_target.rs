//! Publish Target Port
//!
//! The hosting collaborator that receives a published artifact directory and
//! returns a public URL.

use async_trait::async_trait;
use ibai_core::{Artifact, ContentHash, EnvironmentName};

/// Publish target error types
#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("publish target unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// What is currently live in an environment
#[derive(Debug, Clone)]
pub struct LiveDeployment {
    pub content_hash: ContentHash,
    pub url: String,
}

/// Publish target port
#[async_trait]
pub trait PublishTarget: Send + Sync {
    /// The deployment currently live in the environment, if any. Used to
    /// detect identical-content republishes.
    async fn current_deployment(
        &self,
        environment: &EnvironmentName,
    ) -> Result<Option<LiveDeployment>, PublishError>;

    /// Upload an artifact directory and return its public URL.
    async fn upload(
        &self,
        environment: &EnvironmentName,
        artifact: &Artifact,
    ) -> Result<LiveDeployment, PublishError>;
}
