//! Cluster state: node version observations, live snapshot collection, and
//! the platform version catalog capability.

pub mod inquirer;
pub mod kube;
pub mod snapshot;

pub use inquirer::{PlatformRelease, StaticVersionInquirer, VersionInquirer};
pub use snapshot::{ClusterSnapshot, NodeVersionInfo, NodeVersionInfoMap};
