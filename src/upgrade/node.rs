//! Per-node upgrade decision logic.
//!
//! Given a consistent cluster snapshot and the platform catalog capability,
//! decides whether a node may move and to exactly which version, enforcing
//! the skew invariant: the control plane never lags a worker, and no worker
//! moves ahead of the published cluster version.

use crate::cluster::inquirer::VersionInquirer;
use crate::cluster::snapshot::{ClusterSnapshot, NodeVersionInfo};
use crate::error::KuskError;
use crate::version::upgrade_path_with_available_versions;

/// The decision for one node: where it is and where it may go.
///
/// `update` is either equal to `current` (nothing to do) or a single-step
/// later version.
#[derive(Debug, Clone)]
pub struct NodeVersionInfoUpdate {
    pub current: NodeVersionInfo,
    pub update: NodeVersionInfo,
}

impl NodeVersionInfoUpdate {
    /// True when applying the update bumps a component's major or minor
    /// version: the API server for control plane nodes, or the kubelet or
    /// container runtime for any role.
    pub fn has_major_or_minor_update(&self) -> bool {
        if self.current.is_control_plane() {
            if let (Some(current), Some(update)) = (
                self.current.api_server_version.as_ref(),
                self.update.api_server_version.as_ref(),
            ) {
                if update.major > current.major || update.minor > current.minor {
                    return true;
                }
            }
        }
        self.update.kubelet_version.major > self.current.kubelet_version.major
            || self.update.kubelet_version.minor > self.current.kubelet_version.minor
            || self.update.container_runtime_version.major
                > self.current.container_runtime_version.major
            || self.update.container_runtime_version.minor
                > self.current.container_runtime_version.minor
    }

    /// True when the node is already at the decided version.
    ///
    /// Kubelet and container runtime tolerate an update patch level at or
    /// below the current one: a node whose patch is ahead of the catalog
    /// still counts as updated on re-check.
    pub fn is_updated(&self) -> bool {
        self.current.api_server_version == self.update.api_server_version
            && self.current.controller_manager_version == self.update.controller_manager_version
            && self.current.scheduler_version == self.update.scheduler_version
            && self.current.etcd_version == self.update.etcd_version
            && self.current.kubelet_version.major == self.update.kubelet_version.major
            && self.current.kubelet_version.minor == self.update.kubelet_version.minor
            && self.current.kubelet_version.patch >= self.update.kubelet_version.patch
            && self.current.container_runtime_version.major
                == self.update.container_runtime_version.major
            && self.current.container_runtime_version.minor
                == self.update.container_runtime_version.minor
            && self.current.container_runtime_version.patch
                >= self.update.container_runtime_version.patch
    }

    /// True when this node would be the first control plane node to move:
    /// it is control plane, every control plane node still matches the
    /// cluster version, and so does its own kubelet.
    pub fn is_first_control_plane_node_to_be_upgraded(&self, snapshot: &ClusterSnapshot) -> bool {
        self.current.is_control_plane()
            && snapshot.all_control_planes_match_version()
            && self
                .current
                .matches_cluster_version(&snapshot.cluster_version)
    }
}

/// Resolve the update decision for `node_name` against a snapshot.
///
/// Pure: the only side effects are the injected inquirer calls. Callers
/// resolving several nodes must reuse one snapshot so the decisions are
/// consistent with each other.
pub fn resolve_update(
    snapshot: &ClusterSnapshot,
    node_name: &str,
    inquirer: &dyn VersionInquirer,
) -> Result<NodeVersionInfoUpdate, KuskError> {
    let node = snapshot
        .nodes
        .get(node_name)
        .ok_or_else(|| KuskError::NodeNotFound(node_name.to_string()))?;

    if node.is_control_plane() {
        control_plane_update_status(snapshot, node, inquirer)
    } else {
        worker_update_status(snapshot, node, inquirer)
    }
}

fn control_plane_update_status(
    snapshot: &ClusterSnapshot,
    node: &NodeVersionInfo,
    inquirer: &dyn VersionInquirer,
) -> Result<NodeVersionInfoUpdate, KuskError> {
    // There are two different cases for control plane upgrade:
    //   1. This is the first control plane to be upgraded
    //     1.1. All control planes and schedulable worker nodes are in the same version
    //     1.2. There's a new platform version available
    //   2. This is a secondary control plane to be upgraded
    //     2.1. The current cluster version is newer than the component versions in this node
    //     2.2. All schedulable worker nodes are at this control plane version
    let cluster_version = &snapshot.cluster_version;

    if node.less_than_cluster_version(cluster_version) {
        // Second case: the cluster version was bumped by another control
        // plane that got upgraded first. Catch up, no path computation.
        return Ok(NodeVersionInfoUpdate {
            current: node.clone(),
            update: inquirer.node_version_info_for_cluster_version(node, cluster_version),
        });
    }

    let upgrade_path = upgrade_path_with_available_versions(
        cluster_version,
        &inquirer.available_platform_versions(),
    );

    if let Some(next_version) = upgrade_path.first() {
        // A platform update exists. Advancing this node is only safe while
        // no schedulable worker has already drifted behind the current
        // cluster version.
        if !snapshot.schedulable_workers_aligned(cluster_version) {
            return Err(KuskError::SkewProtection {
                node_name: node.node_name.clone(),
                cluster_version: cluster_version.to_string(),
            });
        }
        return Ok(NodeVersionInfoUpdate {
            current: node.clone(),
            update: inquirer.node_version_info_for_cluster_version(node, next_version),
        });
    }

    if !node.equals_cluster_version(cluster_version) {
        return Err(KuskError::InconsistentState {
            node_name: node.node_name.clone(),
            from: node.to_string(),
            to: cluster_version.to_string(),
        });
    }

    // Up to date, and no newer platform version exists.
    Ok(NodeVersionInfoUpdate {
        current: node.clone(),
        update: node.clone(),
    })
}

fn worker_update_status(
    snapshot: &ClusterSnapshot,
    node: &NodeVersionInfo,
    inquirer: &dyn VersionInquirer,
) -> Result<NodeVersionInfoUpdate, KuskError> {
    // A worker differs from a control plane node: an upgrade may already be
    // underway on the control plane, or every node may still be on the same
    // version (nothing started yet). In both situations the worker has to
    // wait for the control plane tier to start and fully converge.
    let all_nodes_match_cluster_version = snapshot.all_nodes_match_cluster_version();
    let control_planes_match_version = snapshot.all_control_planes_match_version();

    let newer_platform_exists = inquirer
        .available_platform_versions()
        .last()
        .is_some_and(|latest| snapshot.cluster_version < *latest);

    if newer_platform_exists && (all_nodes_match_cluster_version || !control_planes_match_version) {
        return Err(KuskError::MissingControlPlaneUpgrade {
            node_name: node.node_name.clone(),
        });
    }

    // Workers only ever chase the current cluster version; the version bump
    // itself is the first control plane's job.
    Ok(NodeVersionInfoUpdate {
        current: node.clone(),
        update: inquirer.node_version_info_for_cluster_version(node, &snapshot.cluster_version),
    })
}
