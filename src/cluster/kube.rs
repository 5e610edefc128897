//! Live cluster snapshot collection.
//!
//! Reads the authoritative cluster version from the kubeadm-config ConfigMap
//! and builds the node version info map from node status plus the
//! control-plane static pod images.

use std::collections::BTreeMap;

use anyhow::Result;
use k8s_openapi::api::core::v1::{ConfigMap, Node, Pod};
use kube::Api;
use kube::api::ListParams;
use semver::Version;
use tracing::debug;

use super::snapshot::{ClusterSnapshot, NodeVersionInfo, NodeVersionInfoMap};
use crate::error::KuskError;
use crate::version::parse_component_version;

const KUBEADM_CONFIG_NAMESPACE: &str = "kube-system";
const KUBEADM_CONFIG_NAME: &str = "kubeadm-config";

/// Build a Kubernetes client from kubeconfig.
///
/// Uses the specified context if provided, otherwise uses the default context.
pub async fn build_client(context: Option<&str>) -> Result<kube::Client> {
    let client = match context {
        Some(ctx) => {
            debug!("Using kubeconfig context: {}", ctx);
            let kubeconfig = kube::config::Kubeconfig::read()?;
            let config = kube::Config::from_custom_kubeconfig(
                kubeconfig,
                &kube::config::KubeConfigOptions {
                    context: Some(ctx.to_string()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| KuskError::KubernetesApi(format!("context '{}': {}", ctx, e)))?;
            kube::Client::try_from(config)
                .map_err(|e| KuskError::KubernetesApi(format!("context '{}': {}", ctx, e)))?
        }
        None => {
            debug!("Using default kubeconfig context");
            kube::Client::try_default()
                .await
                .map_err(|e| KuskError::KubernetesApi(e.to_string()))?
        }
    };

    Ok(client)
}

/// Take a consistent snapshot of the cluster: authoritative cluster version
/// plus every node's observed component versions.
pub async fn collect_snapshot(client: &kube::Client) -> Result<ClusterSnapshot> {
    let cluster_version = current_cluster_version(client).await?;
    let nodes = all_nodes_version_info(client).await?;
    debug!(
        "Snapshot taken: cluster version {}, {} nodes",
        cluster_version,
        nodes.len()
    );
    Ok(ClusterSnapshot {
        cluster_version,
        nodes,
    })
}

/// Read the cluster version the control plane has converged on from the
/// kubeadm-config ConfigMap. Never cached: callers take a fresh snapshot
/// per resolution batch.
pub async fn current_cluster_version(client: &kube::Client) -> Result<Version> {
    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), KUBEADM_CONFIG_NAMESPACE);
    let kubeadm_config = config_maps.get(KUBEADM_CONFIG_NAME).await.map_err(|e| {
        KuskError::KubernetesApi(format!("Failed to read {}: {}", KUBEADM_CONFIG_NAME, e))
    })?;

    let cluster_configuration = kubeadm_config
        .data
        .as_ref()
        .and_then(|data| data.get("ClusterConfiguration"))
        .ok_or_else(|| {
            KuskError::KubernetesApi(format!(
                "{} has no ClusterConfiguration entry",
                KUBEADM_CONFIG_NAME
            ))
        })?;

    cluster_version_from_configuration(cluster_configuration).map_err(Into::into)
}

/// Extract `kubernetesVersion` from a kubeadm ClusterConfiguration document.
fn cluster_version_from_configuration(configuration: &str) -> Result<Version, KuskError> {
    let doc: serde_yaml::Value = serde_yaml::from_str(configuration)
        .map_err(|e| KuskError::KubernetesApi(format!("Invalid ClusterConfiguration: {}", e)))?;
    let version = doc
        .get("kubernetesVersion")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            KuskError::KubernetesApi("ClusterConfiguration has no kubernetesVersion".to_string())
        })?;
    parse_component_version(version)
}

/// Build the node version info map for every node in the cluster.
pub async fn all_nodes_version_info(client: &kube::Client) -> Result<NodeVersionInfoMap> {
    let nodes: Api<Node> = Api::all(client.clone());
    let node_list = nodes
        .list(&ListParams::default())
        .await
        .map_err(|e| KuskError::KubernetesApi(format!("Failed to list nodes: {}", e)))?;

    // Control-plane component versions live in the static pod images.
    let pods: Api<Pod> = Api::namespaced(client.clone(), KUBEADM_CONFIG_NAMESPACE);
    let control_plane_pods = pods
        .list(&ListParams::default().labels("tier=control-plane"))
        .await
        .map_err(|e| {
            KuskError::KubernetesApi(format!("Failed to list control plane pods: {}", e))
        })?;

    let mut component_versions: BTreeMap<(String, String), Version> = BTreeMap::new();
    for pod in &control_plane_pods.items {
        let Some(component) = pod
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get("component"))
        else {
            continue;
        };
        let Some(node_name) = pod.spec.as_ref().and_then(|spec| spec.node_name.as_deref()) else {
            continue;
        };
        let Some(image) = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.containers.first())
            .and_then(|container| container.image.as_deref())
        else {
            continue;
        };
        if let Ok(version) = image_tag_version(image) {
            component_versions.insert((node_name.to_string(), component.clone()), version);
        }
    }

    let mut map = NodeVersionInfoMap::new();
    for node in &node_list.items {
        let info = node_version_info(node, &component_versions)?;
        map.insert(info.node_name.clone(), info);
    }
    Ok(map)
}

fn node_version_info(
    node: &Node,
    component_versions: &BTreeMap<(String, String), Version>,
) -> Result<NodeVersionInfo, KuskError> {
    let node_name = node
        .metadata
        .name
        .clone()
        .ok_or_else(|| KuskError::KubernetesApi("node without a name".to_string()))?;

    let node_info = node
        .status
        .as_ref()
        .and_then(|status| status.node_info.as_ref())
        .ok_or_else(|| {
            KuskError::KubernetesApi(format!("node {} reports no node info", node_name))
        })?;

    let kubelet_version = parse_component_version(&node_info.kubelet_version)?;
    let container_runtime_version = parse_component_version(&node_info.container_runtime_version)?;

    let is_control_plane = node
        .metadata
        .labels
        .as_ref()
        .is_some_and(has_control_plane_label);

    let component = |name: &str| -> Option<Version> {
        if !is_control_plane {
            return None;
        }
        // Static pod image tag, or the kubelet version when the pod has not
        // been observed (a control plane component is never older than its
        // kubelet on a kubeadm cluster).
        Some(
            component_versions
                .get(&(node_name.clone(), name.to_string()))
                .cloned()
                .unwrap_or_else(|| kubelet_version.clone()),
        )
    };

    let etcd_version = if is_control_plane {
        // Fall back to the platform's baseline etcd when the static pod has
        // not been observed yet.
        Some(
            component_versions
                .get(&(node_name.clone(), "etcd".to_string()))
                .cloned()
                .unwrap_or_else(|| Version::new(3, 4, 3)),
        )
    } else {
        None
    };

    Ok(NodeVersionInfo {
        api_server_version: component("kube-apiserver"),
        controller_manager_version: component("kube-controller-manager"),
        scheduler_version: component("kube-scheduler"),
        etcd_version,
        kubelet_version,
        container_runtime_version,
        unschedulable: node
            .spec
            .as_ref()
            .and_then(|spec| spec.unschedulable)
            .unwrap_or(false),
        node_name,
    })
}

/// Both the legacy and the current kubeadm control plane role labels count.
fn has_control_plane_label(labels: &std::collections::BTreeMap<String, String>) -> bool {
    labels.contains_key("node-role.kubernetes.io/control-plane")
        || labels.contains_key("node-role.kubernetes.io/master")
}

/// Parse the version out of a container image tag, e.g.
/// `registry.suse.com/caasp/v4/kube-apiserver:1.18.0` → `1.18.0`.
fn image_tag_version(image: &str) -> Result<Version, KuskError> {
    let after_slash = image.rsplit('/').next().unwrap_or(image);
    let tag = after_slash
        .rsplit_once(':')
        .map(|(_, tag)| tag)
        .ok_or_else(|| KuskError::InvalidVersion(image.to_string()))?;
    parse_component_version(tag)
}
