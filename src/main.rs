//! kusk - cluster upgrade support tool.
//!
//! Plans rolling upgrades for kubeadm-style clusters:
//! - Per-node version skew resolution (control plane first, workers chase)
//! - Skew protection against stranding drifted workers
//! - Container runtime configuration states applied over SSH

mod cluster;
mod config;
mod deploy;
mod error;
mod output;
mod upgrade;
mod version;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use dialoguer::{Confirm, theme::ColorfulTheme};
use tracing::{debug, error};

use cluster::inquirer::StaticVersionInquirer;
use cluster::snapshot::ClusterSnapshot;
use cluster::VersionInquirer;
use config::{Args, Command, Config};
use upgrade::plan::ClusterPlan;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = Config::from_args(args);

    // Initialize logging
    if let Err(e) = init_tracing(&config.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    debug!("Starting kusk - cluster upgrade support tool");

    if let Err(e) = run(&config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing subscriber.
fn init_tracing(log_level: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to initialize log filter: {}", e))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

/// Main application logic.
async fn run(config: &Config) -> Result<()> {
    let client = cluster::kube::build_client(config.context.as_deref()).await?;
    // One snapshot per invocation: every decision below is made against the
    // same observation of the cluster.
    let snapshot = cluster::kube::collect_snapshot(&client).await?;
    let inquirer = StaticVersionInquirer::default();

    match &config.command {
        Command::Status => {
            output::print_status(&snapshot);
            Ok(())
        }
        Command::Plan { node } => run_plan(&snapshot, &inquirer, node.as_deref()),
        Command::Apply { .. } => run_apply(config, &snapshot, &inquirer).await,
    }
}

/// Resolve and print the plan for one node or the whole cluster.
fn run_plan(
    snapshot: &ClusterSnapshot,
    inquirer: &dyn VersionInquirer,
    node: Option<&str>,
) -> Result<()> {
    let plan = match node {
        Some(node_name) => ClusterPlan {
            cluster_version: snapshot.cluster_version.clone(),
            rows: vec![upgrade::plan_node(snapshot, node_name, inquirer)?],
        },
        None => upgrade::plan_cluster(snapshot, inquirer)?,
    };
    output::print_plan(&plan);
    Ok(())
}

/// Resolve one node and run the implied deploy states against it.
async fn run_apply(
    config: &Config,
    snapshot: &ClusterSnapshot,
    inquirer: &dyn VersionInquirer,
) -> Result<()> {
    let Command::Apply {
        node,
        host,
        user,
        port,
        cri_conf_dir,
        cri_sysconfig_dir,
        migration_output,
        pause_image,
        strict_cap_defaults,
        states: state_names,
    } = &config.command
    else {
        unreachable!("run_apply is only called for the apply subcommand");
    };

    let update = match upgrade::resolve_update(snapshot, node, inquirer) {
        Ok(update) => update,
        Err(err) if err.is_ordering() => {
            // Normal mid-rollout condition, not a failure: report and leave
            // the retry to the operator.
            println!("{}", err.to_string().yellow());
            println!("Retry once the control plane has finished upgrading.");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    if update.is_updated() {
        println!(
            "{}",
            format!("Node {} is already up to date. Nothing to apply.", node)
                .green()
                .bold()
        );
        return Ok(());
    }

    let states = if state_names.is_empty() {
        deploy::states_for_update(&update)
    } else {
        state_names
            .iter()
            .map(|name| {
                deploy::DeployState::from_name(name)
                    .ok_or_else(|| anyhow::anyhow!("unknown state name: {}", name))
            })
            .collect::<Result<Vec<_>>>()?
    };

    println!(
        "Node {}: {} -> {}",
        node.bold(),
        update.current.kubelet_version,
        update.update.kubelet_version
    );
    if update.is_first_control_plane_node_to_be_upgraded(snapshot) {
        println!(
            "{}",
            "This is the first control plane node to move; applying it bumps the cluster version."
                .cyan()
        );
    }
    if update.has_major_or_minor_update() {
        println!(
            "{}",
            "This update changes a component's major or minor version and restarts node services."
                .yellow()
        );
    }
    println!(
        "States to apply: {}",
        states
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    if config.dry_run {
        println!("{}", "[DRY RUN] No states were applied.".yellow());
        return Ok(());
    }

    if !config.yes {
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Apply {} state(s) to {}?", states.len(), node))
            .default(false)
            .interact()?;
        if !proceed {
            println!("{}", "Aborted.".red());
            return Ok(());
        }
    }

    let payload = deploy::CriConfiguration {
        strict_cap_defaults: *strict_cap_defaults,
        pause_image: pause_image.clone(),
        conf_source_dir: cri_conf_dir.clone(),
        sysconfig_source_dir: cri_sysconfig_dir.clone(),
        migration_output_path: migration_output.clone(),
    };
    let ssh_host = host.clone().unwrap_or_else(|| node.clone());
    let connection = deploy::SshConnection::new(ssh_host, user.clone(), *port);
    let target = deploy::Target::new(node.clone(), Box::new(connection));

    deploy::apply(&target, &states, &payload).await?;

    println!(
        "{}",
        format!("Node {} upgraded successfully.", node).green().bold()
    );
    Ok(())
}
