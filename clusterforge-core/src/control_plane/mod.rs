//! Control-plane client facade
//!
//! The only component that talks to the Cluster API management cluster.
//! Calls are never cached or retried here; every call is a fresh read or
//! write raced against the caller's [`OperationContext`]. Failures come back
//! already classified (not-found, unauthorized, backend error, ...).

mod convert;
mod kube_client;

pub use convert::{cluster_from_object, cluster_to_object, node_pool_from_object, template_from_object};
pub use kube_client::{classify_kube_error, KubeControlPlane};

use crate::context::OperationContext;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clusterforge_common::{Error, Result, Variables};
use std::collections::BTreeMap;

/// Label CAPI puts on every object owned by a cluster
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";
/// Label recording which provider a cluster was created for
pub const PROVIDER_LABEL: &str = "clusterforge.io/provider";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "clusterforge";

/// Reference to a provider infrastructure object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

/// Cluster as read from the control plane
#[derive(Debug, Clone, Default)]
pub struct ClusterRecord {
    pub name: String,
    pub namespace: String,
    /// Topology class (template) name
    pub class: Option<String>,
    pub version: Option<String>,
    /// Phase string as reported, `None` until the reconciler sets one
    pub phase: Option<String>,
    pub control_plane_ready: bool,
    pub infrastructure_ready: bool,
    pub infrastructure_ref: Option<ObjectRef>,
    pub variables: Variables,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
    pub deletion_requested: bool,
    pub failure_message: Option<String>,
}

/// Worker group that belongs to a cluster
#[derive(Debug, Clone, Default)]
pub struct NodePoolRecord {
    pub name: String,
    pub namespace: String,
    pub cluster: String,
    pub replicas: u32,
    pub ready_replicas: u32,
    pub updated_replicas: u32,
    pub available_replicas: u32,
    pub phase: Option<String>,
}

/// Cluster topology template
#[derive(Debug, Clone, Default)]
pub struct TemplateRecord {
    pub name: String,
    pub namespace: String,
    /// Variable names the template declares
    pub variables: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Declarative cluster submitted on create
#[derive(Debug, Clone)]
pub struct NewCluster {
    pub name: String,
    pub class: String,
    pub version: String,
    pub variables: Variables,
    pub labels: BTreeMap<String, String>,
    /// Initial worker pool, when the request asked for a node count
    pub workers: Option<WorkerPool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPool {
    pub class: String,
    pub name: String,
    pub replicas: u32,
}

/// Narrow verb set over the control plane
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    /// Namespace all records live in
    fn namespace(&self) -> &str;

    async fn get_cluster(&self, ctx: &OperationContext, name: &str) -> Result<ClusterRecord>;

    async fn list_clusters(&self, ctx: &OperationContext) -> Result<Vec<ClusterRecord>>;

    async fn create_cluster(&self, ctx: &OperationContext, cluster: &NewCluster)
        -> Result<ClusterRecord>;

    async fn delete_cluster(&self, ctx: &OperationContext, name: &str) -> Result<()>;

    async fn get_template(&self, ctx: &OperationContext, name: &str) -> Result<TemplateRecord>;

    async fn list_templates(&self, ctx: &OperationContext) -> Result<Vec<TemplateRecord>>;

    /// Fetch a node pool, `NotFound` unless it belongs to `cluster`
    async fn get_node_pool(
        &self,
        ctx: &OperationContext,
        cluster: &str,
        name: &str,
    ) -> Result<NodePoolRecord>;

    async fn list_node_pools(
        &self,
        ctx: &OperationContext,
        cluster: &str,
    ) -> Result<Vec<NodePoolRecord>>;

    /// Set desired replicas, returning the updated pool
    async fn update_node_pool_replicas(
        &self,
        ctx: &OperationContext,
        cluster: &str,
        name: &str,
        replicas: u32,
    ) -> Result<NodePoolRecord>;

    /// Raw credential bundle from the `<cluster>-kubeconfig` secret
    ///
    /// Returns an empty payload when the secret exists without data.
    async fn get_kubeconfig(&self, ctx: &OperationContext, cluster: &str) -> Result<Vec<u8>>;
}

/// Stand-in used when no control plane is configured
///
/// Every call fails with `Unavailable`, leaving validation and provider
/// metadata operations usable.
#[derive(Debug, Clone)]
pub struct UnavailableControlPlane {
    namespace: String,
    reason: String,
}

impl UnavailableControlPlane {
    pub fn new(namespace: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            reason: reason.into(),
        }
    }

    fn unavailable<T>(&self) -> Result<T> {
        Err(Error::unavailable(format!(
            "control plane unavailable: {}",
            self.reason
        )))
    }
}

#[async_trait]
impl ControlPlaneClient for UnavailableControlPlane {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get_cluster(&self, _ctx: &OperationContext, _name: &str) -> Result<ClusterRecord> {
        self.unavailable()
    }

    async fn list_clusters(&self, _ctx: &OperationContext) -> Result<Vec<ClusterRecord>> {
        self.unavailable()
    }

    async fn create_cluster(
        &self,
        _ctx: &OperationContext,
        _cluster: &NewCluster,
    ) -> Result<ClusterRecord> {
        self.unavailable()
    }

    async fn delete_cluster(&self, _ctx: &OperationContext, _name: &str) -> Result<()> {
        self.unavailable()
    }

    async fn get_template(&self, _ctx: &OperationContext, _name: &str) -> Result<TemplateRecord> {
        self.unavailable()
    }

    async fn list_templates(&self, _ctx: &OperationContext) -> Result<Vec<TemplateRecord>> {
        self.unavailable()
    }

    async fn get_node_pool(
        &self,
        _ctx: &OperationContext,
        _cluster: &str,
        _name: &str,
    ) -> Result<NodePoolRecord> {
        self.unavailable()
    }

    async fn list_node_pools(
        &self,
        _ctx: &OperationContext,
        _cluster: &str,
    ) -> Result<Vec<NodePoolRecord>> {
        self.unavailable()
    }

    async fn update_node_pool_replicas(
        &self,
        _ctx: &OperationContext,
        _cluster: &str,
        _name: &str,
        _replicas: u32,
    ) -> Result<NodePoolRecord> {
        self.unavailable()
    }

    async fn get_kubeconfig(&self, _ctx: &OperationContext, _cluster: &str) -> Result<Vec<u8>> {
        self.unavailable()
    }
}
