//! The remote node handle used by deploy states.
//!
//! A `Target` pairs a node name with a `Connection` capability: something
//! that can run a shell command on the node and upload a local file to it.
//! The capability is injected so tests can substitute a scripted fake
//! without any transport.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::KuskError;

/// Captured output of a remote command that exited zero.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Transport capability for one remote node.
///
/// A non-zero remote exit status is an error, not a `CommandOutput`.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn run_command(&self, command: &str) -> Result<CommandOutput, KuskError>;
    async fn upload_file(&self, local: &Path, remote: &Path) -> Result<(), KuskError>;
}

/// One remote node reachable for command execution and file transfer.
pub struct Target {
    node_name: String,
    connection: Box<dyn Connection>,
}

impl Target {
    pub fn new(node_name: impl Into<String>, connection: Box<dyn Connection>) -> Self {
        Self {
            node_name: node_name.into(),
            connection,
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Run a shell command on the node.
    pub async fn ssh(&self, command: &str) -> Result<CommandOutput, KuskError> {
        let output = self.connection.run_command(command).await?;
        if !output.stdout.is_empty() {
            debug!("[{}] {}: {}", self.node_name, command, output.stdout.trim());
        }
        if !output.stderr.is_empty() {
            debug!("[{}] {} (stderr): {}", self.node_name, command, output.stderr.trim());
        }
        Ok(output)
    }

    /// Upload a local file to a path on the node.
    pub async fn upload(&self, local: &Path, remote: &Path) -> Result<(), KuskError> {
        self.connection.upload_file(local, remote).await
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{Action, MockConnection};
    use super::*;

    #[tokio::test]
    async fn test_target_records_commands() {
        let (conn, log) = MockConnection::recording();
        let target = Target::new("worker-0", Box::new(conn));
        target.ssh("echo hello").await.unwrap();
        assert_eq!(target.node_name(), "worker-0");
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &[Action::Command("echo hello".to_string())]
        );
    }

    #[tokio::test]
    async fn test_mock_failure_marker() {
        let (conn, _log) = MockConnection::failing_on("rm -rf");
        let target = Target::new("worker-0", Box::new(conn));
        assert!(target.ssh("ls /etc").await.is_ok());
        let err = target.ssh("rm -rf /tmp/scratch").await.unwrap_err();
        assert!(matches!(err, KuskError::RemoteCommand { .. }));
    }

    #[tokio::test]
    async fn test_mock_records_uploads() {
        let (conn, log) = MockConnection::recording();
        let target = Target::new("worker-0", Box::new(conn));
        target
            .upload(Path::new("/local/a.conf"), Path::new("/tmp/a.conf"))
            .await
            .unwrap();
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &[Action::Upload {
                local: "/local/a.conf".to_string(),
                remote: "/tmp/a.conf".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_mock_failing_uploads() {
        let (conn, _log) = MockConnection::failing_uploads();
        let target = Target::new("worker-0", Box::new(conn));
        let err = target
            .upload(Path::new("/local/a.conf"), Path::new("/tmp/a.conf"))
            .await
            .unwrap_err();
        assert!(matches!(err, KuskError::Upload { .. }));
    }
}
