use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{ArchiveClient, ClientProcess, Invocation};

/// Default name of the tarsnap executable, resolved through `PATH`.
pub const TARSNAP: &str = "tarsnap";

/// Archive client backed by the `tarsnap` binary
pub struct TarsnapClient {
    program: PathBuf,
}

impl TarsnapClient {
    pub fn new(program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for TarsnapClient {
    fn default() -> Self {
        Self::new(Path::new(TARSNAP))
    }
}

#[async_trait]
impl ArchiveClient for TarsnapClient {
    async fn spawn(&self, invocation: &Invocation) -> Result<ClientProcess> {
        let args = invocation.args();
        tracing::debug!(program = %self.program.display(), ?args, "Spawning archive client");

        let mut command = Command::new(&self.program);
        command.args(&args).stdin(Stdio::null());

        match invocation {
            Invocation::List { .. } => {
                command.stdout(Stdio::piped()).stderr(Stdio::inherit());
                let mut child = command
                    .spawn()
                    .with_context(|| format!("Failed to start {}", self.program.display()))?;
                let stdout = child.stdout.take().ok_or_else(|| {
                    anyhow!("Failed to capture stdout of {}", self.program.display())
                })?;
                Ok(ClientProcess::spawned(child, stdout))
            }
            Invocation::Extract { .. } => {
                command.stdout(Stdio::null()).stderr(Stdio::piped());
                let mut child = command
                    .spawn()
                    .with_context(|| format!("Failed to start {}", self.program.display()))?;
                let stderr = child.stderr.take().ok_or_else(|| {
                    anyhow!("Failed to capture stderr of {}", self.program.display())
                })?;
                Ok(ClientProcess::spawned(child, stderr))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_program() {
        assert_eq!(TarsnapClient::default().program(), Path::new("tarsnap"));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let client = TarsnapClient::new(Path::new("/nonexistent/tarsnap-binary"));
        let invocation = Invocation::List {
            archive: "nightly".to_string(),
            directory: None,
            options: vec![],
        };
        let err = client.spawn(&invocation).await.err().unwrap();
        assert!(err.to_string().contains("Failed to start"));
    }
}
