//! Deployment value objects
//!
//! Publishing is a capability-checked, idempotent operation: the invoking run
//! must hold environment-scoped write authorization, and re-publishing
//! identical content is a no-op that still yields a success record.

use crate::blob::ContentHash;
use crate::workflow::Permissions;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Deployment environment name - Value Object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentName(String);

impl EnvironmentName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EnvironmentName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Environment-scoped write capability held by a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunAuthorization {
    environments: HashSet<String>,
}

impl RunAuthorization {
    pub fn from_permissions(permissions: &Permissions) -> Self {
        Self {
            environments: permissions.deploy_environments.iter().cloned().collect(),
        }
    }

    pub fn allows(&self, environment: &EnvironmentName) -> bool {
        self.environments.contains(environment.as_str())
    }
}

/// Successful publish record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub environment: EnvironmentName,
    pub content_hash: ContentHash,
    pub url: String,
    pub published_at: chrono::DateTime<chrono::Utc>,
    /// True when identical content was already live and the upload was skipped.
    pub reused: bool,
}
