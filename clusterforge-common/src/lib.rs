//! Common types shared between clusterforge-core and clusterforge-cli

pub mod error;

pub use error::{Error, ErrorCode, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Free-form provider variable bag supplied at cluster creation
pub type Variables = BTreeMap<String, Value>;

/// Lifecycle phase as reported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusterPhase {
    Pending,
    Provisioning,
    Provisioned,
    Deleting,
    Failed,
    #[default]
    Unknown,
}

impl ClusterPhase {
    /// Map a control-plane phase string; anything unrecognised is `Unknown`
    pub fn from_reported(phase: &str) -> Self {
        match phase.to_ascii_lowercase().as_str() {
            "pending" => ClusterPhase::Pending,
            "provisioning" => ClusterPhase::Provisioning,
            "provisioned" | "ready" => ClusterPhase::Provisioned,
            "deleting" => ClusterPhase::Deleting,
            "failed" => ClusterPhase::Failed,
            _ => ClusterPhase::Unknown,
        }
    }

    /// Provisioned and Failed end a create; nothing follows them but deletion
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClusterPhase::Provisioned | ClusterPhase::Failed)
    }
}

impl fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Provisioning => write!(f, "provisioning"),
            Self::Provisioned => write!(f, "provisioned"),
            Self::Deleting => write!(f, "deleting"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Cluster as returned by get/list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub name: String,
    pub namespace: String,
    pub phase: ClusterPhase,
    /// Phase string exactly as the control plane reported it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub control_plane_ready: bool,
    pub infrastructure_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_pools: Vec<NodePoolInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<BTreeMap<String, Value>>,
}

/// Independently scalable worker group bound to one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePoolInfo {
    pub name: String,
    pub cluster: String,
    pub replicas: u32,
    pub ready_replicas: u32,
    pub updated_replicas: u32,
    pub available_replicas: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// Workload cluster node status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Ready,
    NotReady,
    Unknown,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::NotReady => write!(f, "NotReady"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Node of a workload cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub status: NodeStatus,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubelet_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_runtime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Outcome of a create request
///
/// Creation is reported as initiated; `phase` is the first phase the control
/// plane reported, or `None` if none appeared before the wait ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClusterResult {
    pub name: String,
    pub namespace: String,
    pub provider: String,
    pub template: String,
    pub version: String,
    pub phase: Option<ClusterPhase>,
    pub wait_timed_out: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteStatus {
    /// Resource observed absent
    Deleted,
    /// Deletion submitted but still in progress at the wait ceiling
    Deleting,
}

impl fmt::Display for DeleteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deleted => write!(f, "deleted"),
            Self::Deleting => write!(f, "deleting"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteClusterResult {
    pub name: String,
    pub status: DeleteStatus,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleStatus {
    /// Desired replicas changed, convergence in progress
    Scaling,
    /// Already at the requested replica count
    Ready,
}

impl fmt::Display for ScaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scaling => write!(f, "scaling"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleClusterResult {
    pub cluster: String,
    pub node_pool: String,
    pub old_replicas: u32,
    pub new_replicas: u32,
    pub status: ScaleStatus,
    pub message: String,
}

/// Credential bundle for a workload cluster
///
/// `Debug` never prints the payload.
#[derive(Clone, Serialize, Deserialize)]
pub struct KubeconfigResult {
    pub cluster: String,
    pub kubeconfig: String,
}

impl fmt::Debug for KubeconfigResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeconfigResult")
            .field("cluster", &self.cluster)
            .field("kubeconfig", &"<redacted>")
            .finish()
    }
}

/// Result of a validate-only request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub name: String,
    pub template: String,
    pub version: String,
    pub provider: String,
}

/// Registered provider summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_region: Option<String>,
    pub supported_versions: Vec<String>,
}

/// Cluster topology template (ClusterClass)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
