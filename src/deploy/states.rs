//! Named deploy states and their dispatch.
//!
//! The state vocabulary is a closed enum resolved by `match`: the mapping
//! from name to operation is fixed at compile time and cannot change at
//! runtime. Sequencing across states is the caller's business; `apply`
//! implements the conventional fail-fast order for one node.

use std::fmt;

use anyhow::{Context, Result};
use tracing::info;

use super::cri;
use super::target::Target;
use crate::upgrade::node::NodeVersionInfoUpdate;

pub use super::cri::CriConfiguration;

/// The configuration operations kusk knows how to run on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    CriConfigure,
    CriSysconfig,
    CriStart,
    CriMigrateConfig,
}

impl DeployState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::CriConfigure => "cri.configure",
            Self::CriSysconfig => "cri.sysconfig",
            Self::CriStart => "cri.start",
            Self::CriMigrateConfig => "cri.migrate-config",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cri.configure" => Some(Self::CriConfigure),
            "cri.sysconfig" => Some(Self::CriSysconfig),
            "cri.start" => Some(Self::CriStart),
            "cri.migrate-config" => Some(Self::CriMigrateConfig),
            _ => None,
        }
    }
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run a single state against a target. Failures carry the state name and
/// the node so the operator knows exactly what to look at.
pub async fn run_state(
    state: DeployState,
    target: &Target,
    payload: &CriConfiguration,
) -> Result<()> {
    let result = match state {
        DeployState::CriConfigure => cri::configure(target, payload).await,
        DeployState::CriSysconfig => cri::sysconfig(target, payload).await,
        DeployState::CriStart => cri::start(target).await,
        DeployState::CriMigrateConfig => cri::migrate_config(target, payload).await,
    };
    result.with_context(|| format!("could not apply state {} on node {}", state, target.node_name()))
}

/// Run a state sequence for one node, aborting at the first failure.
///
/// States for different nodes have no ordering constraints; this sequence
/// is the per-node contract only.
pub async fn apply(
    target: &Target,
    states: &[DeployState],
    payload: &CriConfiguration,
) -> Result<()> {
    for state in states {
        info!("Applying state {} on node {}", state, target.node_name());
        run_state(*state, target, payload).await?;
    }
    Ok(())
}

/// The state sequence implied by a resolved update decision.
///
/// A container runtime major/minor bump needs the legacy configuration
/// migrated before the new configuration is staged.
pub fn states_for_update(update: &NodeVersionInfoUpdate) -> Vec<DeployState> {
    let mut states = Vec::new();
    let runtime_bump = update.update.container_runtime_version.major
        > update.current.container_runtime_version.major
        || update.update.container_runtime_version.minor
            > update.current.container_runtime_version.minor;
    if runtime_bump {
        states.push(DeployState::CriMigrateConfig);
    }
    states.extend([
        DeployState::CriConfigure,
        DeployState::CriSysconfig,
        DeployState::CriStart,
    ]);
    states
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::snapshot::fixtures::worker_node;
    use crate::deploy::target::mock::{Action, MockConnection};
    use semver::Version;
    use std::fs;

    fn test_payload(tag: &str) -> CriConfiguration {
        let dir = std::env::temp_dir().join(format!("kusk-states-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("01-caasp.conf"), "[crio]\n").unwrap();
        fs::write(dir.join("default_flags"), "CRIO_OPTIONS=\n").unwrap();
        CriConfiguration {
            strict_cap_defaults: false,
            pause_image: "registry/pause:3.1".to_string(),
            conf_source_dir: dir.clone(),
            sysconfig_source_dir: dir.clone(),
            migration_output_path: dir.join("rendered.conf"),
        }
    }

    fn cleanup_payload(payload: &CriConfiguration) {
        let _ = fs::remove_dir_all(&payload.conf_source_dir);
    }

    #[test]
    fn test_state_names_round_trip() {
        for state in [
            DeployState::CriConfigure,
            DeployState::CriSysconfig,
            DeployState::CriStart,
            DeployState::CriMigrateConfig,
        ] {
            assert_eq!(DeployState::from_name(state.name()), Some(state));
        }
        assert_eq!(DeployState::from_name("cri.unknown"), None);
    }

    #[test]
    fn test_states_for_update_plain_patch() {
        let current = worker_node("worker-0", &Version::new(1, 18, 0));
        let update = worker_node("worker-0", &Version::new(1, 18, 2));
        let decision = NodeVersionInfoUpdate { current, update };
        assert_eq!(
            states_for_update(&decision),
            vec![
                DeployState::CriConfigure,
                DeployState::CriSysconfig,
                DeployState::CriStart,
            ]
        );
    }

    #[test]
    fn test_states_for_update_runtime_minor_bump_prepends_migration() {
        let current = worker_node("worker-0", &Version::new(1, 18, 0));
        let mut updated = worker_node("worker-0", &Version::new(1, 19, 0));
        updated.container_runtime_version = Version::new(1, 19, 0);
        let decision = NodeVersionInfoUpdate {
            current,
            update: updated,
        };
        assert_eq!(
            states_for_update(&decision),
            vec![
                DeployState::CriMigrateConfig,
                DeployState::CriConfigure,
                DeployState::CriSysconfig,
                DeployState::CriStart,
            ]
        );
    }

    #[tokio::test]
    async fn test_run_state_wraps_error_with_state_name() {
        let (conn, _log) = MockConnection::failing_on("systemctl");
        let target = Target::new("worker-0", Box::new(conn));
        let payload = test_payload("wrap");

        let err = run_state(DeployState::CriStart, &target, &payload)
            .await
            .unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.contains("cri.start"));
        assert!(chain.contains("worker-0"));

        cleanup_payload(&payload);
    }

    #[tokio::test]
    async fn test_apply_runs_states_in_order() {
        let (conn, log) = MockConnection::recording();
        let target = Target::new("worker-0", Box::new(conn));
        let payload = test_payload("order");

        apply(
            &target,
            &[DeployState::CriConfigure, DeployState::CriStart],
            &payload,
        )
        .await
        .unwrap();

        let actions = log.lock().unwrap().clone();
        let last = actions.last().unwrap();
        assert_eq!(
            last,
            &Action::Command("systemctl enable --now crio".to_string())
        );

        cleanup_payload(&payload);
    }

    #[tokio::test]
    async fn test_apply_aborts_sequence_on_first_failure() {
        let (conn, log) = MockConnection::failing_on("mv -f /tmp/crio.conf.d");
        let target = Target::new("worker-0", Box::new(conn));
        let payload = test_payload("failfast");

        let err = apply(
            &target,
            &[DeployState::CriConfigure, DeployState::CriStart],
            &payload,
        )
        .await
        .unwrap_err();
        assert!(format!("{:#}", err).contains("cri.configure"));

        // cri.start never ran.
        let actions = log.lock().unwrap().clone();
        assert!(
            !actions
                .iter()
                .any(|a| matches!(a, Action::Command(cmd) if cmd.contains("systemctl"))),
            "{:?}",
            actions
        );

        cleanup_payload(&payload);
    }

    #[test]
    fn test_display_matches_name() {
        assert_eq!(DeployState::CriMigrateConfig.to_string(), "cri.migrate-config");
    }
}
