//! Local process execution environment
//!
//! Provisions disposable workspaces on the local machine: each environment is
//! a temporary directory plus a shell. The orchestration core treats it as
//! opaque compute; the OS image id is accepted and logged only.

use async_trait::async_trait;
use ibai_core::Blob;
use ibai_ports::{CommandOutcome, EnvironmentError, EnvironmentProvisioner, ExecutionEnvironment};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Provisioner that backs environments with local temporary directories
pub struct LocalProcessProvisioner;

impl LocalProcessProvisioner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalProcessProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnvironmentProvisioner for LocalProcessProvisioner {
    async fn acquire(
        &self,
        os_image: &str,
    ) -> Result<Box<dyn ExecutionEnvironment>, EnvironmentError> {
        let workspace = tempfile::tempdir()
            .map_err(|e| EnvironmentError::Provision(format!("tempdir: {}", e)))?;
        debug!(
            "provisioned local environment for image '{}' at {}",
            os_image,
            workspace.path().display()
        );
        Ok(Box::new(LocalProcessEnvironment { workspace }))
    }
}

/// One disposable workspace; dropped together with its directory
pub struct LocalProcessEnvironment {
    workspace: TempDir,
}

impl LocalProcessEnvironment {
    fn resolve(&self, relative: &str) -> Result<PathBuf, EnvironmentError> {
        let candidate = Path::new(relative);
        if candidate.is_absolute()
            || candidate
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(EnvironmentError::Io(format!(
                "path escapes the workspace: {}",
                relative
            )));
        }
        Ok(self.workspace.path().join(candidate))
    }
}

#[async_trait]
impl ExecutionEnvironment for LocalProcessEnvironment {
    async fn run_command(
        &self,
        command: &str,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutcome, EnvironmentError> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(self.workspace.path())
            .envs(env)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EnvironmentError::Command(format!("{}: {}", command, e)))?;

        Ok(CommandOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn seed_files(&self, dest: &str, blob: &Blob) -> Result<(), EnvironmentError> {
        let root = self.resolve(dest)?;
        for (path, bytes) in blob.files() {
            let target = {
                let candidate = Path::new(path);
                if candidate.is_absolute()
                    || candidate
                        .components()
                        .any(|c| matches!(c, Component::ParentDir))
                {
                    return Err(EnvironmentError::Io(format!(
                        "snapshot path escapes the workspace: {}",
                        path
                    )));
                }
                root.join(candidate)
            };
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| EnvironmentError::Io(e.to_string()))?;
            }
            tokio::fs::write(&target, bytes)
                .await
                .map_err(|e| EnvironmentError::Io(e.to_string()))?;
        }
        Ok(())
    }

    async fn snapshot_files(&self, path: &str) -> Result<Blob, EnvironmentError> {
        let root = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&root)
            .await
            .map_err(|_| EnvironmentError::Io(format!("no such workspace path: {}", path)))?;

        let mut blob = Blob::new();
        if metadata.is_file() {
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string());
            let bytes = tokio::fs::read(&root)
                .await
                .map_err(|e| EnvironmentError::Io(e.to_string()))?;
            blob.insert(name, bytes);
            return Ok(blob);
        }

        // Directory snapshot with paths relative to the snapshot root.
        let mut pending: Vec<PathBuf> = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| EnvironmentError::Io(e.to_string()))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| EnvironmentError::Io(e.to_string()))?
            {
                let entry_path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| EnvironmentError::Io(e.to_string()))?;
                if file_type.is_dir() {
                    pending.push(entry_path);
                } else if file_type.is_file() {
                    let relative = entry_path
                        .strip_prefix(&root)
                        .map_err(|e| EnvironmentError::Io(e.to_string()))?
                        .to_string_lossy()
                        .into_owned();
                    let bytes = tokio::fs::read(&entry_path)
                        .await
                        .map_err(|e| EnvironmentError::Io(e.to_string()))?;
                    blob.insert(relative, bytes);
                }
            }
        }
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn environment() -> Box<dyn ExecutionEnvironment> {
        LocalProcessProvisioner::new()
            .acquire("ubuntu-24.04")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_command_captures_output_and_exit_code() {
        let env = environment().await;

        let ok = env
            .run_command("echo hello", &HashMap::new())
            .await
            .unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "hello");

        let failed = env.run_command("exit 3", &HashMap::new()).await.unwrap();
        assert!(!failed.success());
        assert_eq!(failed.exit_code, 3);
    }

    #[tokio::test]
    async fn test_env_vars_are_injected() {
        let env = environment().await;
        let mut vars = HashMap::new();
        vars.insert("GREETING".to_string(), "hola".to_string());

        let outcome = env.run_command("echo \"$GREETING\"", &vars).await.unwrap();
        assert_eq!(outcome.stdout.trim(), "hola");
    }

    #[tokio::test]
    async fn test_seed_and_snapshot_round_trip() {
        let env = environment().await;
        let blob = Blob::new()
            .with_file("index.html", b"<html/>".to_vec())
            .with_file("assets/app.js", b"console.log(1)".to_vec());

        env.seed_files("dist", &blob).await.unwrap();
        let snapshot = env.snapshot_files("dist").await.unwrap();
        assert_eq!(snapshot, blob);
    }

    #[tokio::test]
    async fn test_snapshot_of_single_file() {
        let env = environment().await;
        env.run_command("echo lock > package-lock.json", &HashMap::new())
            .await
            .unwrap();

        let snapshot = env.snapshot_files("package-lock.json").await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.file("package-lock.json").is_some());
    }

    #[tokio::test]
    async fn test_workspace_escape_is_rejected() {
        let env = environment().await;
        assert!(env.snapshot_files("../outside").await.is_err());
        assert!(env.snapshot_files("/etc").await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_of_missing_path_is_an_error() {
        let env = environment().await;
        assert!(env.snapshot_files("does-not-exist").await.is_err());
    }
}
