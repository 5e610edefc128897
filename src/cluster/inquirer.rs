//! The version inquirer capability.
//!
//! The resolver never talks to a catalog directly; it receives this
//! capability so tests can substitute a deterministic version source.

use semver::Version;

use super::snapshot::NodeVersionInfo;

/// Answers the two catalog questions the resolver needs: which platform
/// versions exist, and what a node would look like after adopting one.
pub trait VersionInquirer {
    /// All known platform versions, ascending. Callers filter to the ones
    /// reachable from their current version.
    fn available_platform_versions(&self) -> Vec<Version>;

    /// The version info `node` would report after adopting `cluster_version`.
    /// Role and schedulability are preserved; only component versions change.
    fn node_version_info_for_cluster_version(
        &self,
        node: &NodeVersionInfo,
        cluster_version: &Version,
    ) -> NodeVersionInfo;
}

/// One platform release and the component versions it ships.
#[derive(Debug, Clone)]
pub struct PlatformRelease {
    pub version: Version,
    pub etcd_version: Version,
    pub container_runtime_version: Version,
}

/// Version inquirer backed by the compiled-in platform release table.
#[derive(Debug, Clone)]
pub struct StaticVersionInquirer {
    releases: Vec<PlatformRelease>,
}

impl StaticVersionInquirer {
    pub fn new(mut releases: Vec<PlatformRelease>) -> Self {
        releases.sort_by(|a, b| a.version.cmp(&b.version));
        Self { releases }
    }

    fn release_for(&self, cluster_version: &Version) -> Option<&PlatformRelease> {
        self.releases
            .iter()
            .find(|r| r.version == *cluster_version)
    }
}

impl Default for StaticVersionInquirer {
    /// The platform releases this build knows how to reach.
    fn default() -> Self {
        Self::new(vec![
            PlatformRelease {
                version: Version::new(1, 17, 4),
                etcd_version: Version::new(3, 4, 3),
                container_runtime_version: Version::new(1, 17, 4),
            },
            PlatformRelease {
                version: Version::new(1, 18, 0),
                etcd_version: Version::new(3, 4, 3),
                container_runtime_version: Version::new(1, 18, 0),
            },
            PlatformRelease {
                version: Version::new(1, 19, 0),
                etcd_version: Version::new(3, 4, 13),
                container_runtime_version: Version::new(1, 19, 0),
            },
        ])
    }
}

impl VersionInquirer for StaticVersionInquirer {
    fn available_platform_versions(&self) -> Vec<Version> {
        self.releases.iter().map(|r| r.version.clone()).collect()
    }

    fn node_version_info_for_cluster_version(
        &self,
        node: &NodeVersionInfo,
        cluster_version: &Version,
    ) -> NodeVersionInfo {
        let (etcd, runtime) = match self.release_for(cluster_version) {
            Some(release) => (
                release.etcd_version.clone(),
                release.container_runtime_version.clone(),
            ),
            // Unknown release: assume components track the platform version.
            None => (node.etcd_version.clone().unwrap_or_else(|| Version::new(3, 4, 3)), cluster_version.clone()),
        };

        NodeVersionInfo {
            node_name: node.node_name.clone(),
            api_server_version: node
                .api_server_version
                .as_ref()
                .map(|_| cluster_version.clone()),
            controller_manager_version: node
                .controller_manager_version
                .as_ref()
                .map(|_| cluster_version.clone()),
            scheduler_version: node
                .scheduler_version
                .as_ref()
                .map(|_| cluster_version.clone()),
            etcd_version: node.etcd_version.as_ref().map(|_| etcd),
            kubelet_version: cluster_version.clone(),
            container_runtime_version: runtime,
            unschedulable: node.unschedulable,
        }
    }
}
