//! Per-node version observations and the cluster-wide snapshot.
//!
//! Everything here is transient: a snapshot is rebuilt from live cluster
//! state on every resolution call and never cached across calls.

use std::collections::BTreeMap;
use std::fmt;

use semver::Version;

/// Component versions and role flags observed for one node.
///
/// The control-plane-only component versions are `None` on worker nodes;
/// a node is control-plane exactly when it reports an API server version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeVersionInfo {
    pub node_name: String,
    pub api_server_version: Option<Version>,
    pub controller_manager_version: Option<Version>,
    pub scheduler_version: Option<Version>,
    pub etcd_version: Option<Version>,
    pub kubelet_version: Version,
    pub container_runtime_version: Version,
    pub unschedulable: bool,
}

impl NodeVersionInfo {
    pub fn is_control_plane(&self) -> bool {
        self.api_server_version.is_some()
    }

    /// True when the kubelet major/minor does not match the reference
    /// cluster version. Patch differences are not drift.
    pub fn drifts_from_cluster_version(&self, cluster_version: &Version) -> bool {
        self.kubelet_version.major != cluster_version.major
            || self.kubelet_version.minor != cluster_version.minor
    }

    /// True when the node is strictly behind the reference cluster version.
    pub fn less_than_cluster_version(&self, cluster_version: &Version) -> bool {
        self.kubelet_version < *cluster_version
    }

    /// True when the node is exactly at the reference cluster version.
    pub fn equals_cluster_version(&self, cluster_version: &Version) -> bool {
        self.kubelet_version == *cluster_version
    }

    /// True when the node is at the reference cluster version, tolerating a
    /// node patch level above the cluster's (major/minor equal, cluster
    /// patch ≤ node patch).
    pub fn matches_cluster_version(&self, cluster_version: &Version) -> bool {
        cluster_version.major == self.kubelet_version.major
            && cluster_version.minor == self.kubelet_version.minor
            && cluster_version.patch <= self.kubelet_version.patch
    }

    /// True for a worker that the scheduler may still place pods on. These
    /// are the nodes the skew protection must not strand.
    pub fn is_schedulable_worker(&self) -> bool {
        !self.unschedulable && !self.is_control_plane()
    }
}

impl fmt::Display for NodeVersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kubelet_version)
    }
}

/// All observed nodes, keyed by node name.
pub type NodeVersionInfoMap = BTreeMap<String, NodeVersionInfo>;

/// A consistent cluster-wide observation: the authoritative cluster version
/// plus every node's version info, taken at a single point in time.
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    pub cluster_version: Version,
    pub nodes: NodeVersionInfoMap,
}

impl ClusterSnapshot {
    /// True when no node drifts from the cluster version, i.e. no upgrade
    /// has been started anywhere.
    pub fn all_nodes_match_cluster_version(&self) -> bool {
        self.nodes
            .values()
            .all(|node| !node.drifts_from_cluster_version(&self.cluster_version))
    }

    /// True when every control plane node is at least at the cluster version.
    pub fn all_control_planes_match_version(&self) -> bool {
        self.nodes
            .values()
            .filter(|node| node.is_control_plane())
            .all(|node| node.matches_cluster_version(&self.cluster_version))
    }

    /// True when every schedulable worker is still aligned with the given
    /// reference version.
    pub fn schedulable_workers_aligned(&self, reference: &Version) -> bool {
        self.nodes
            .values()
            .filter(|node| node.is_schedulable_worker())
            .all(|node| !node.drifts_from_cluster_version(reference))
    }
}
