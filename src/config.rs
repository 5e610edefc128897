//! CLI configuration and argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Cluster version skew resolver and node upgrade executor.
///
/// Decides, per node, whether an upgrade is permitted and to which version,
/// and applies the resulting container runtime configuration states over SSH.
#[derive(Parser, Debug, Clone)]
#[command(name = "kusk")]
#[command(about = "Cluster version skew resolver and node upgrade executor")]
#[command(version = const_format::formatcp!(
    "{} (commit: {}, build date: {})",
    VERSION, COMMIT, BUILD_DATE
))]
pub struct Args {
    /// Kubernetes context to use
    #[arg(long, global = true, env = "KUBECONFIG_CONTEXT")]
    pub context: Option<String>,

    /// Show planned changes without executing
    #[arg(long, global = true, default_value = "false")]
    pub dry_run: bool,

    /// Skip confirmation prompts
    #[arg(short, long, global = true, default_value = "false")]
    pub yes: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "KUSK_LOG_LEVEL")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show per-node versions and upgrade readiness
    Status,

    /// Resolve the upgrade decision for one node or the whole cluster
    Plan {
        /// Only plan this node
        #[arg(value_name = "NODE")]
        node: Option<String>,
    },

    /// Apply the pending upgrade states to a node over SSH
    #[command(after_help = r#"Examples:
  kusk apply worker-0                     Upgrade worker-0, connecting as root
  kusk apply worker-0 --user sles -p 2222 Upgrade via a non-default SSH setup"#)]
    Apply {
        /// Node to upgrade
        #[arg(value_name = "NODE")]
        node: String,

        /// SSH host (defaults to the node name)
        #[arg(long)]
        host: Option<String>,

        /// SSH user
        #[arg(short, long, default_value = "root")]
        user: String,

        /// SSH port
        #[arg(short, long, default_value = "22")]
        port: u16,

        /// Local directory holding the crio.conf.d drop-ins to stage
        #[arg(long, default_value = "/usr/share/kusk/cri/conf.d")]
        cri_conf_dir: PathBuf,

        /// Local directory holding the runtime sysconfig files to stage
        #[arg(long, default_value = "/usr/share/kusk/cri/sysconfig")]
        cri_sysconfig_dir: PathBuf,

        /// Where the migration state writes its rendered drop-in
        #[arg(long, default_value = "/etc/crio/crio.conf.d/01-caasp.conf")]
        migration_output: PathBuf,

        /// Pause container image written by the migration state
        #[arg(long, default_value = "k8s.gcr.io/pause:3.2")]
        pause_image: String,

        /// Keep the runtime's built-in default capability list
        #[arg(long, default_value = "false")]
        strict_cap_defaults: bool,

        /// Run these states instead of the derived sequence
        /// (comma-separated, e.g. cri.configure,cri.start)
        #[arg(long, value_delimiter = ',', value_name = "STATE")]
        states: Vec<String>,
    },
}

/// Application configuration derived from CLI args.
#[derive(Debug, Clone)]
pub struct Config {
    pub context: Option<String>,
    pub dry_run: bool,
    pub yes: bool,
    pub log_level: String,
    pub command: Command,
}

impl Config {
    /// Create config from CLI arguments.
    pub fn from_args(args: Args) -> Self {
        Self {
            context: args.context,
            dry_run: args.dry_run,
            yes: args.yes,
            log_level: args.log_level,
            command: args.command,
        }
    }
}
