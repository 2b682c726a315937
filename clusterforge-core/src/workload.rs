//! Workload cluster access
//!
//! Clients here talk to a provisioned cluster's own API server using the
//! credential bundle fetched from the control plane. That is a separate trust
//! domain, so every failure is reported as a workload-cluster error.

use crate::context::OperationContext;
use async_trait::async_trait;
use clusterforge_common::{Error, NodeInfo, NodeStatus, Result};
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

const ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";
const DEFAULT_ROLE: &str = "worker";

const REGION_LABELS: &[&str] = &[
    "topology.kubernetes.io/region",
    "failure-domain.beta.kubernetes.io/region",
];
const ZONE_LABELS: &[&str] = &[
    "topology.kubernetes.io/zone",
    "failure-domain.beta.kubernetes.io/zone",
];
const INSTANCE_TYPE_LABELS: &[&str] = &[
    "node.kubernetes.io/instance-type",
    "beta.kubernetes.io/instance-type",
];

/// Lists nodes of a workload cluster given its credential bundle
#[async_trait]
pub trait WorkloadClusterClient: Send + Sync {
    async fn list_nodes(
        &self,
        ctx: &OperationContext,
        cluster: &str,
        kubeconfig: &[u8],
    ) -> Result<Vec<Node>>;
}

/// Builds an ephemeral kube-rs client per call; nothing is cached
#[derive(Debug, Clone, Default)]
pub struct KubeWorkloadClient;

impl KubeWorkloadClient {
    async fn client_for(cluster: &str, kubeconfig: &[u8]) -> Result<Client> {
        let yaml = std::str::from_utf8(kubeconfig).map_err(|e| {
            Error::workload_cluster(cluster, "kubeconfig is not valid UTF-8").with_source(e)
        })?;

        let kubeconfig = Kubeconfig::from_yaml(yaml).map_err(|e| {
            Error::workload_cluster(cluster, "failed to parse workload kubeconfig").with_source(e)
        })?;

        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                Error::workload_cluster(cluster, "workload kubeconfig is incomplete")
                    .with_source(e)
            })?;

        Client::try_from(config).map_err(|e| {
            Error::workload_cluster(cluster, "failed to create workload cluster client")
                .with_source(e)
        })
    }
}

#[async_trait]
impl WorkloadClusterClient for KubeWorkloadClient {
    async fn list_nodes(
        &self,
        ctx: &OperationContext,
        cluster: &str,
        kubeconfig: &[u8],
    ) -> Result<Vec<Node>> {
        ctx.run("list_nodes", async {
            let client = Self::client_for(cluster, kubeconfig).await?;
            let nodes: Api<Node> = Api::all(client);
            let list = nodes.list(&ListParams::default()).await.map_err(|e| {
                Error::workload_cluster(cluster, "failed to list workload cluster nodes")
                    .with_source(e)
            })?;
            Ok(list.items)
        })
        .await
    }
}

fn first_label(
    labels: &std::collections::BTreeMap<String, String>,
    keys: &[&str],
) -> Option<String> {
    keys.iter().find_map(|k| labels.get(*k).cloned())
}

/// Summarise a workload node
pub fn node_to_info(node: Node) -> NodeInfo {
    let metadata = node.metadata;
    let spec = node.spec.unwrap_or_default();
    let status = node.status.unwrap_or_default();

    // Ready condition decides status; no condition at all is Unknown
    let conditions = status.conditions.unwrap_or_default();
    let node_status = match conditions.iter().find(|c| c.type_ == "Ready") {
        Some(c) if c.status == "True" => NodeStatus::Ready,
        Some(c) if c.status == "False" => NodeStatus::NotReady,
        _ => NodeStatus::Unknown,
    };

    let labels = metadata.labels.unwrap_or_default();
    let mut roles: Vec<String> = labels
        .keys()
        .filter_map(|k| k.strip_prefix(ROLE_LABEL_PREFIX))
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect();
    if roles.is_empty() {
        roles.push(DEFAULT_ROLE.to_string());
    }

    let addresses = status.addresses.unwrap_or_default();
    let address = |kind: &str| {
        addresses
            .iter()
            .find(|a| a.type_ == kind)
            .map(|a| a.address.clone())
    };

    let node_info = status.node_info;

    NodeInfo {
        name: metadata.name.unwrap_or_default(),
        status: node_status,
        roles,
        internal_ip: address("InternalIP"),
        external_ip: address("ExternalIP"),
        region: first_label(&labels, REGION_LABELS),
        zone: first_label(&labels, ZONE_LABELS),
        instance_type: first_label(&labels, INSTANCE_TYPE_LABELS),
        provider_id: spec.provider_id,
        kubelet_version: node_info.as_ref().map(|i| i.kubelet_version.clone()),
        os_image: node_info.as_ref().map(|i| i.os_image.clone()),
        container_runtime: node_info.map(|i| i.container_runtime_version),
        created_at: metadata.creation_timestamp.map(|t| t.0),
    }
}
