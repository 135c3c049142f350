//! Execution Environment Port
//!
//! The provisioner supplies a disposable environment matching an OS
//! identifier. The core treats it as opaque compute with a shell-command
//! execution capability plus file seed/snapshot for cache and artifact
//! movement.

use async_trait::async_trait;
use ibai_core::Blob;
use std::collections::HashMap;

/// Execution environment error types
#[derive(thiserror::Error, Debug)]
pub enum EnvironmentError {
    #[error("failed to provision environment: {0}")]
    Provision(String),

    #[error("command failed to launch: {0}")]
    Command(String),

    #[error("workspace io error: {0}")]
    Io(String),
}

/// Outcome of one shell command
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Captured output as log lines, stdout first.
    pub fn log_lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(|l| l.to_string())
            .collect()
    }
}

/// One isolated, disposable execution environment
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    /// Run a shell command in the environment's workspace.
    async fn run_command(
        &self,
        command: &str,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutcome, EnvironmentError>;

    /// Materialize a snapshot under a workspace-relative path.
    async fn seed_files(&self, dest: &str, blob: &Blob) -> Result<(), EnvironmentError>;

    /// Capture a workspace-relative file or directory as a snapshot.
    async fn snapshot_files(&self, path: &str) -> Result<Blob, EnvironmentError>;
}

/// Environment provisioner port
#[async_trait]
pub trait EnvironmentProvisioner: Send + Sync {
    /// Supply a fresh environment for the given OS image id. The environment
    /// is disposed when dropped.
    async fn acquire(
        &self,
        os_image: &str,
    ) -> Result<Box<dyn ExecutionEnvironment>, EnvironmentError>;
}
