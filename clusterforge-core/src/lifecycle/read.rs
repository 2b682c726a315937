use super::ClusterService;
use crate::context::OperationContext;
use crate::control_plane::{ClusterRecord, NodePoolRecord, TemplateRecord};
use crate::provider::CloudProvider;
use crate::validation;
use crate::workload::node_to_info;
use clusterforge_common::{
    ClusterInfo, ClusterPhase, Error, KubeconfigResult, NodeInfo, NodePoolInfo, Result,
    TemplateInfo,
};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

/// Key under which a readiness diagnosis is added to provider status
const READINESS_KEY: &str = "readiness";

/// Node pool lookups in flight at once while listing clusters
pub const LIST_ENRICHMENT_CONCURRENCY: usize = 8;

impl ClusterService {
    /// Read one cluster with node count, node pools and provider status
    ///
    /// Enrichment is best-effort; a failed lookup leaves that field empty.
    pub async fn get_cluster(&self, ctx: &OperationContext, name: &str) -> Result<ClusterInfo> {
        let ctx = ctx.with_timeout(self.timeouts.read());
        self.observe("get_cluster", Some(name), async {
            validation::validate_cluster_name(name)?;
            let record = self.control_plane.get_cluster(&ctx, name).await?;
            let pools = self.pools_best_effort(&ctx, &record.name).await;

            let mut info = self.cluster_info(record, pools.as_deref());
            if let Some(pools) = pools {
                info.node_pools = pools.into_iter().map(pool_info).collect();
            }
            Ok(info)
        })
        .await
    }

    /// Read every cluster in the namespace
    ///
    /// Node counts are looked up with bounded concurrency; node pools are
    /// not included.
    pub async fn list_clusters(&self, ctx: &OperationContext) -> Result<Vec<ClusterInfo>> {
        let ctx = ctx.with_timeout(self.timeouts.read());
        self.observe("list_clusters", None, async {
            let records = self.control_plane.list_clusters(&ctx).await?;

            let pools: Vec<_> = stream::iter(&records)
                .map(|record| self.pools_best_effort(&ctx, &record.name))
                .buffered(LIST_ENRICHMENT_CONCURRENCY)
                .collect()
                .await;

            Ok(records
                .into_iter()
                .zip(pools)
                .map(|(record, pools)| self.cluster_info(record, pools.as_deref()))
                .collect())
        })
        .await
    }

    /// Fetch the workload cluster's credential bundle
    pub async fn get_cluster_kubeconfig(
        &self,
        ctx: &OperationContext,
        cluster: &str,
    ) -> Result<KubeconfigResult> {
        let ctx = ctx.with_timeout(self.timeouts.read());
        self.observe("get_cluster_kubeconfig", Some(cluster), async {
            let bytes = self.fetch_kubeconfig(&ctx, cluster).await?;
            let kubeconfig = String::from_utf8(bytes).map_err(|e| {
                Error::internal(format!("kubeconfig for cluster '{}' is not valid UTF-8", cluster))
                    .with_source(e)
            })?;

            Ok(KubeconfigResult {
                cluster: cluster.to_string(),
                kubeconfig,
            })
        })
        .await
    }

    /// List the nodes of a workload cluster through its own API
    pub async fn get_cluster_nodes(
        &self,
        ctx: &OperationContext,
        cluster: &str,
    ) -> Result<Vec<NodeInfo>> {
        let ctx = ctx.with_timeout(self.timeouts.read());
        self.observe("get_cluster_nodes", Some(cluster), async {
            let kubeconfig = self.fetch_kubeconfig(&ctx, cluster).await?;
            let nodes = self.workloads.list_nodes(&ctx, cluster, &kubeconfig).await?;
            Ok(nodes.into_iter().map(node_to_info).collect())
        })
        .await
    }

    /// Node pools bound to an existing cluster
    pub async fn list_node_pools(
        &self,
        ctx: &OperationContext,
        cluster: &str,
    ) -> Result<Vec<NodePoolInfo>> {
        let ctx = ctx.with_timeout(self.timeouts.read());
        self.observe("list_node_pools", Some(cluster), async {
            validation::validate_cluster_name(cluster)?;
            self.control_plane.get_cluster(&ctx, cluster).await?;
            let pools = self.control_plane.list_node_pools(&ctx, cluster).await?;
            Ok(pools.into_iter().map(pool_info).collect())
        })
        .await
    }

    /// Cluster templates available in the namespace
    pub async fn list_templates(&self, ctx: &OperationContext) -> Result<Vec<TemplateInfo>> {
        let ctx = ctx.with_timeout(self.timeouts.read());
        self.observe("list_templates", None, async {
            let templates = self.control_plane.list_templates(&ctx).await?;
            Ok(templates.into_iter().map(template_info).collect())
        })
        .await
    }

    /// Raw, non-empty credential bundle
    async fn fetch_kubeconfig(&self, ctx: &OperationContext, cluster: &str) -> Result<Vec<u8>> {
        validation::validate_cluster_name(cluster)?;

        let bytes = self.control_plane.get_kubeconfig(ctx, cluster).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::internal(format!(
                "kubeconfig secret for cluster '{}' is empty",
                cluster
            ))
            .with_detail("resource", "secret"));
        }
        Ok(bytes)
    }

    async fn pools_best_effort(
        &self,
        ctx: &OperationContext,
        cluster: &str,
    ) -> Option<Vec<NodePoolRecord>> {
        match self.control_plane.list_node_pools(ctx, cluster).await {
            Ok(pools) => Some(pools),
            Err(e) => {
                warn!(
                    cluster = %cluster,
                    code = e.code().as_str(),
                    error = %e.safe_message(),
                    "Could not list node pools; omitting node count"
                );
                None
            }
        }
    }

    fn cluster_info(&self, record: ClusterRecord, pools: Option<&[NodePoolRecord]>) -> ClusterInfo {
        let provider = self.providers.for_cluster(&record);

        let provider_status = provider.map(|p| {
            let mut status = p.provider_specific_status(&record);
            if let Err(e) = p.validate_infrastructure_readiness(&record) {
                status.insert(READINESS_KEY.to_string(), Value::from(e.safe_message()));
            }
            status
        });
        if provider.is_none() {
            debug!(cluster = %record.name, "No provider matches cluster; omitting provider status");
        }

        let node_count = pools.map(|pools| pools.iter().map(|p| p.ready_replicas).sum());

        ClusterInfo {
            phase: record
                .phase
                .as_deref()
                .map(ClusterPhase::from_reported)
                .unwrap_or_default(),
            reported_phase: record.phase,
            name: record.name,
            namespace: record.namespace,
            template: record.class,
            version: record.version,
            control_plane_ready: record.control_plane_ready,
            infrastructure_ready: record.infrastructure_ready,
            provider: provider.map(|p| p.name().to_string()),
            node_count,
            created_at: record.created_at,
            labels: record.labels,
            annotations: record.annotations,
            node_pools: Vec::new(),
            provider_status,
        }
    }
}

fn pool_info(pool: NodePoolRecord) -> NodePoolInfo {
    NodePoolInfo {
        name: pool.name,
        cluster: pool.cluster,
        replicas: pool.replicas,
        ready_replicas: pool.ready_replicas,
        updated_replicas: pool.updated_replicas,
        available_replicas: pool.available_replicas,
        phase: pool.phase,
    }
}

fn template_info(template: TemplateRecord) -> TemplateInfo {
    TemplateInfo {
        name: template.name,
        namespace: template.namespace,
        variables: template.variables,
        created_at: template.created_at,
    }
}
