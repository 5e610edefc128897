//! `Connection` implementation over the system ssh/scp binaries.
//!
//! Transport configuration beyond host, user and port (keys, agents,
//! known-hosts policy) is the operator's ~/.ssh/config business, not ours.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::target::{CommandOutput, Connection};
use crate::error::KuskError;

/// SSH reachability of one node.
#[derive(Debug, Clone)]
pub struct SshConnection {
    host: String,
    user: String,
    port: u16,
}

impl SshConnection {
    pub fn new(host: impl Into<String>, user: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            port,
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

#[async_trait]
impl Connection for SshConnection {
    async fn run_command(&self, command: &str) -> Result<CommandOutput, KuskError> {
        debug!("[{}] running: {}", self.host, command);
        let output = Command::new("ssh")
            .arg("-p")
            .arg(self.port.to_string())
            .arg("-o")
            .arg("BatchMode=yes")
            .arg(self.destination())
            .arg("--")
            .arg(format!("sudo sh -c '{}'", command))
            .output()
            .await
            .map_err(|e| KuskError::RemoteCommand {
                node: self.host.clone(),
                command: command.to_string(),
                detail: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(KuskError::RemoteCommand {
                node: self.host.clone(),
                command: command.to_string(),
                detail: if stderr.trim().is_empty() {
                    output.status.to_string()
                } else {
                    stderr.trim().to_string()
                },
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }

    async fn upload_file(&self, local: &Path, remote: &Path) -> Result<(), KuskError> {
        debug!(
            "[{}] uploading {} to {}",
            self.host,
            local.display(),
            remote.display()
        );
        // scp cannot create the remote parent directory itself.
        if let Some(parent) = remote.parent() {
            self.run_command(&format!("mkdir -p {}", parent.display()))
                .await?;
        }

        let upload_err = |detail: String| KuskError::Upload {
            node: self.host.clone(),
            local: local.display().to_string(),
            remote: remote.display().to_string(),
            detail,
        };

        let output = Command::new("scp")
            .arg("-P")
            .arg(self.port.to_string())
            .arg("-o")
            .arg("BatchMode=yes")
            .arg(local)
            .arg(format!("{}:{}", self.destination(), remote.display()))
            .output()
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(upload_err(stderr.trim().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_format() {
        let conn = SshConnection::new("10.0.0.5", "sles", 22);
        assert_eq!(conn.destination(), "sles@10.0.0.5");
    }

    #[test]
    fn test_connection_is_cloneable_per_node() {
        let conn = SshConnection::new("worker-0.example.com", "root", 2222);
        let clone = conn.clone();
        assert_eq!(clone.port, 2222);
        assert_eq!(clone.host, "worker-0.example.com");
    }
}
