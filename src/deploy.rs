//! Applying configuration to remote nodes.
//!
//! `target` defines the transport capability, `ssh` implements it over the
//! system ssh/scp binaries, `states` names the operations and `cri` holds
//! their implementations.

pub mod cri;
pub mod ssh;
pub mod states;
pub mod target;
pub mod template;

pub use cri::CriConfiguration;
pub use ssh::SshConnection;
pub use states::{DeployState, apply, run_state, states_for_update};
pub use target::{CommandOutput, Connection, Target};
