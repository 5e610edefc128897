//! Table formatting for CLI output.

use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cluster::snapshot::ClusterSnapshot;
use crate::upgrade::plan::{ClusterPlan, NodeDecision, NodePlanRow};

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ROLE")]
    role: String,
    #[tabled(rename = "SCHEDULABLE")]
    schedulable: String,
    #[tabled(rename = "KUBELET")]
    kubelet: String,
    #[tabled(rename = "CONTAINER-RUNTIME")]
    runtime: String,
    #[tabled(rename = "UP-TO-DATE")]
    up_to_date: String,
}

/// Print the per-node status table for a snapshot.
pub fn print_status(snapshot: &ClusterSnapshot) {
    println!(
        "{} {}",
        "Cluster version:".bold(),
        snapshot.cluster_version
    );
    println!();

    let rows: Vec<StatusRow> = snapshot
        .nodes
        .values()
        .map(|node| StatusRow {
            name: node.node_name.clone(),
            role: role_label(node.is_control_plane()).to_string(),
            schedulable: yes_no(!node.unschedulable).to_string(),
            kubelet: node.kubelet_version.to_string(),
            runtime: node.container_runtime_version.to_string(),
            up_to_date: yes_no(node.matches_cluster_version(&snapshot.cluster_version))
                .to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    apply_table_style(&mut table);
    println!("{}", table);
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ROLE")]
    role: String,
    #[tabled(rename = "CURRENT")]
    current: String,
    #[tabled(rename = "DECISION")]
    decision: String,
}

/// Print the resolved cluster plan.
pub fn print_plan(plan: &ClusterPlan) {
    println!("{} {}", "Cluster version:".bold(), plan.cluster_version);
    println!();

    let rows: Vec<PlanRow> = plan.rows.iter().map(plan_row).collect();
    let mut table = Table::new(rows);
    apply_table_style(&mut table);
    println!("{}", table);

    if plan.is_empty() && !plan.has_blocked_nodes() {
        println!();
        println!(
            "{}",
            "All nodes are up to date with the current cluster version."
                .green()
                .bold()
        );
    }
    if plan.has_blocked_nodes() {
        println!();
        println!(
            "{}",
            "Some nodes are blocked and need operator action before retrying."
                .red()
                .bold()
        );
    }
}

fn plan_row(row: &NodePlanRow) -> PlanRow {
    PlanRow {
        name: row.node_name.clone(),
        role: role_label(row.is_control_plane).to_string(),
        current: row.current_version.to_string(),
        decision: decision_label(&row.decision),
    }
}

fn decision_label(decision: &NodeDecision) -> String {
    match decision {
        NodeDecision::Target(version) => format!("upgrade to {}", version),
        NodeDecision::UpToDate => "up to date".to_string(),
        NodeDecision::WaitingForControlPlane => "waiting for control plane".to_string(),
        NodeDecision::Blocked(reason) => format!("blocked: {}", reason),
    }
}

const fn role_label(is_control_plane: bool) -> &'static str {
    if is_control_plane {
        "control-plane"
    } else {
        "worker"
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Apply kubectl-style table formatting: no borders, no separators, 2-space column gap.
fn apply_table_style(table: &mut Table) {
    use tabled::settings::object::Columns;
    use tabled::settings::themes::Theme;
    use tabled::settings::{Modify, Padding};

    let mut theme = Theme::from_style(Style::empty());
    theme.remove_horizontal_lines();
    table.with(theme);
    table.with(Modify::new(Columns::new(..)).with(Padding::new(0, 2, 0, 0)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    #[test]
    fn test_decision_label_target() {
        let label = decision_label(&NodeDecision::Target(Version::new(1, 19, 0)));
        assert_eq!(label, "upgrade to 1.19.0");
    }

    #[test]
    fn test_decision_label_waiting() {
        assert_eq!(
            decision_label(&NodeDecision::WaitingForControlPlane),
            "waiting for control plane"
        );
    }

    #[test]
    fn test_decision_label_blocked_carries_reason() {
        let label = decision_label(&NodeDecision::Blocked("worker drifted".to_string()));
        assert!(label.starts_with("blocked:"));
        assert!(label.contains("worker drifted"));
    }

    #[test]
    fn test_role_and_schedulable_labels() {
        assert_eq!(role_label(true), "control-plane");
        assert_eq!(role_label(false), "worker");
        assert_eq!(yes_no(true), "yes");
        assert_eq!(yes_no(false), "no");
    }
}
