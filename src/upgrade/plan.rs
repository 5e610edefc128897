//! Cluster-wide upgrade planning.
//!
//! Resolves every node against one shared snapshot and classifies the
//! outcomes for display. Ordering conditions (a worker waiting on the
//! control plane) are normal mid-rollout states, not failures; skew and
//! inconsistency findings are kept as blocked rows so the operator sees
//! them next to the nodes they affect.

use semver::Version;

use crate::cluster::inquirer::VersionInquirer;
use crate::cluster::snapshot::ClusterSnapshot;
use crate::error::KuskError;
use super::node::{NodeVersionInfoUpdate, resolve_update};

/// What a single node should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeDecision {
    /// Move to this version.
    Target(Version),
    /// Already at the decided version.
    UpToDate,
    /// Must wait until the control plane tier has converged.
    WaitingForControlPlane,
    /// Cannot proceed; operator action required.
    Blocked(String),
}

/// One row of the cluster plan.
#[derive(Debug, Clone)]
pub struct NodePlanRow {
    pub node_name: String,
    pub is_control_plane: bool,
    pub current_version: Version,
    pub decision: NodeDecision,
}

/// The resolved plan for every node in a snapshot.
#[derive(Debug, Clone)]
pub struct ClusterPlan {
    pub cluster_version: Version,
    pub rows: Vec<NodePlanRow>,
}

impl ClusterPlan {
    /// Returns true if no node has an actionable update.
    pub fn is_empty(&self) -> bool {
        self.rows
            .iter()
            .all(|row| !matches!(row.decision, NodeDecision::Target(_)))
    }

    /// Returns true if any node is blocked on operator action.
    pub fn has_blocked_nodes(&self) -> bool {
        self.rows
            .iter()
            .any(|row| matches!(row.decision, NodeDecision::Blocked(_)))
    }
}

/// Resolve one node and classify the outcome.
///
/// Hard input errors (unknown node) propagate; everything else becomes a
/// decision the caller can display or act on.
pub fn plan_node(
    snapshot: &ClusterSnapshot,
    node_name: &str,
    inquirer: &dyn VersionInquirer,
) -> Result<NodePlanRow, KuskError> {
    let node = snapshot
        .nodes
        .get(node_name)
        .ok_or_else(|| KuskError::NodeNotFound(node_name.to_string()))?;

    let decision = match resolve_update(snapshot, node_name, inquirer) {
        Ok(update) => decision_for_update(&update),
        Err(err) if err.is_ordering() => NodeDecision::WaitingForControlPlane,
        Err(KuskError::NodeNotFound(name)) => return Err(KuskError::NodeNotFound(name)),
        Err(err) => NodeDecision::Blocked(err.to_string()),
    };

    Ok(NodePlanRow {
        node_name: node.node_name.clone(),
        is_control_plane: node.is_control_plane(),
        current_version: node.kubelet_version.clone(),
        decision,
    })
}

/// Resolve every node in the snapshot into a display-ready plan.
pub fn plan_cluster(
    snapshot: &ClusterSnapshot,
    inquirer: &dyn VersionInquirer,
) -> Result<ClusterPlan, KuskError> {
    let mut rows = Vec::with_capacity(snapshot.nodes.len());
    for node_name in snapshot.nodes.keys() {
        rows.push(plan_node(snapshot, node_name, inquirer)?);
    }
    Ok(ClusterPlan {
        cluster_version: snapshot.cluster_version.clone(),
        rows,
    })
}

fn decision_for_update(update: &NodeVersionInfoUpdate) -> NodeDecision {
    if update.is_updated() {
        NodeDecision::UpToDate
    } else {
        NodeDecision::Target(update.update.kubelet_version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::inquirer::{PlatformRelease, StaticVersionInquirer};
    use crate::cluster::snapshot::fixtures::{control_plane_node, snapshot, worker_node};

    fn v(s: &str) -> Version {
        crate::version::parse_cluster_version(s).unwrap()
    }

    fn release(version: &str) -> PlatformRelease {
        PlatformRelease {
            version: v(version),
            etcd_version: Version::new(3, 4, 3),
            container_runtime_version: v(version),
        }
    }

    #[test]
    fn test_plan_cluster_all_up_to_date() {
        let inquirer = StaticVersionInquirer::new(vec![release("1.18.0")]);
        let snap = snapshot(
            &v("1.18.0"),
            vec![
                control_plane_node("master-0", &v("1.18.0")),
                worker_node("worker-0", &v("1.18.0")),
            ],
        );
        let plan = plan_cluster(&snap, &inquirer).unwrap();
        assert!(plan.is_empty());
        assert!(!plan.has_blocked_nodes());
        assert!(
            plan.rows
                .iter()
                .all(|row| row.decision == NodeDecision::UpToDate)
        );
    }

    #[test]
    fn test_plan_cluster_rollout_start() {
        let inquirer = StaticVersionInquirer::new(vec![release("1.18.0"), release("1.19.0")]);
        let snap = snapshot(
            &v("1.18.0"),
            vec![
                control_plane_node("master-0", &v("1.18.0")),
                worker_node("worker-0", &v("1.18.0")),
            ],
        );
        let plan = plan_cluster(&snap, &inquirer).unwrap();
        assert!(!plan.is_empty());

        let master = plan.rows.iter().find(|r| r.node_name == "master-0").unwrap();
        assert_eq!(master.decision, NodeDecision::Target(v("1.19.0")));

        let worker = plan.rows.iter().find(|r| r.node_name == "worker-0").unwrap();
        assert_eq!(worker.decision, NodeDecision::WaitingForControlPlane);
    }

    #[test]
    fn test_plan_cluster_blocked_by_drifted_worker() {
        let inquirer = StaticVersionInquirer::new(vec![release("1.18.0"), release("1.19.0")]);
        let snap = snapshot(
            &v("1.18.0"),
            vec![
                control_plane_node("master-0", &v("1.18.0")),
                worker_node("worker-0", &v("1.17.0")),
            ],
        );
        let plan = plan_cluster(&snap, &inquirer).unwrap();
        assert!(plan.has_blocked_nodes());

        let master = plan.rows.iter().find(|r| r.node_name == "master-0").unwrap();
        assert!(matches!(&master.decision, NodeDecision::Blocked(reason) if reason.contains("drifted")));
    }

    #[test]
    fn test_plan_node_unknown_node_propagates() {
        let inquirer = StaticVersionInquirer::new(vec![release("1.18.0")]);
        let snap = snapshot(&v("1.18.0"), vec![worker_node("worker-0", &v("1.18.0"))]);
        assert!(matches!(
            plan_node(&snap, "ghost", &inquirer),
            Err(KuskError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_plan_worker_mid_rollout_targets_cluster_version() {
        let inquirer = StaticVersionInquirer::new(vec![release("1.18.0"), release("1.19.0")]);
        let snap = snapshot(
            &v("1.18.0"),
            vec![
                control_plane_node("master-0", &v("1.18.0")),
                worker_node("worker-0", &v("1.17.4")),
            ],
        );
        let row = plan_node(&snap, "worker-0", &inquirer).unwrap();
        assert_eq!(row.decision, NodeDecision::Target(v("1.18.0")));
    }
}
