//! Custom error types for kusk.

use thiserror::Error;

/// Errors that can occur while planning or applying node upgrades.
#[derive(Error, Debug)]
pub enum KuskError {
    #[error("could not find node {0} in the cluster snapshot")]
    NodeNotFound(String),

    #[error("Invalid version format: {0}")]
    InvalidVersion(String),

    #[error(
        "at least one schedulable worker node has drifted behind version {cluster_version}, \
         upgrading node {node_name} would leave it unable to communicate with the control plane. \
         Upgrade that worker, cordon it or remove it from the cluster"
    )]
    SkewProtection {
        node_name: String,
        cluster_version: String,
    },

    #[error("cannot infer how to upgrade node {node_name} from version {from} to version {to}")]
    InconsistentState {
        node_name: String,
        from: String,
        to: String,
    },

    #[error("{node_name} is not upgradeable until all control plane nodes are upgraded")]
    MissingControlPlaneUpgrade { node_name: String },

    #[error("Kubernetes API error: {0}")]
    KubernetesApi(String),

    #[error("[{node}] command `{command}` failed: {detail}")]
    RemoteCommand {
        node: String,
        command: String,
        detail: String,
    },

    #[error("[{node}] could not upload {local} to {remote}: {detail}")]
    Upload {
        node: String,
        local: String,
        remote: String,
        detail: String,
    },

    #[error("could not parse template: {0}")]
    TemplateParse(String),

    #[error("could not render configuration: {0}")]
    TemplateRender(String),
}

impl KuskError {
    /// Returns true if the error is an expected rollout-ordering condition
    /// rather than a hard failure. Callers should retry later instead of
    /// aborting the whole run.
    pub const fn is_ordering(&self) -> bool {
        matches!(self, Self::MissingControlPlaneUpgrade { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_node_not_found() {
        let err = KuskError::NodeNotFound("worker-0".to_string());
        assert_eq!(
            err.to_string(),
            "could not find node worker-0 in the cluster snapshot"
        );
    }

    #[test]
    fn test_error_display_invalid_version() {
        let err = KuskError::InvalidVersion("not-a-version".to_string());
        assert_eq!(err.to_string(), "Invalid version format: not-a-version");
    }

    #[test]
    fn test_error_display_missing_control_plane_upgrade() {
        let err = KuskError::MissingControlPlaneUpgrade {
            node_name: "worker-1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "worker-1 is not upgradeable until all control plane nodes are upgraded"
        );
    }

    #[test]
    fn test_error_display_skew_protection_names_node_and_version() {
        let err = KuskError::SkewProtection {
            node_name: "master-0".to_string(),
            cluster_version: "1.18.0".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("master-0"));
        assert!(msg.contains("1.18.0"));
        assert!(msg.contains("cordon"));
    }

    #[test]
    fn test_error_display_inconsistent_state() {
        let err = KuskError::InconsistentState {
            node_name: "master-0".to_string(),
            from: "1.19.0".to_string(),
            to: "1.18.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot infer how to upgrade node master-0 from version 1.19.0 to version 1.18.0"
        );
    }

    #[test]
    fn test_error_display_remote_command() {
        let err = KuskError::RemoteCommand {
            node: "worker-0".to_string(),
            command: "systemctl enable --now crio".to_string(),
            detail: "exit status 1".to_string(),
        };
        assert!(err.to_string().contains("[worker-0]"));
        assert!(err.to_string().contains("systemctl enable --now crio"));
    }

    #[test]
    fn test_is_ordering() {
        assert!(
            KuskError::MissingControlPlaneUpgrade {
                node_name: "w".to_string()
            }
            .is_ordering()
        );
        assert!(!KuskError::NodeNotFound("w".to_string()).is_ordering());
        assert!(
            !KuskError::SkewProtection {
                node_name: "m".to_string(),
                cluster_version: "1.18.0".to_string()
            }
            .is_ordering()
        );
    }
}
