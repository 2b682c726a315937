//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use clusterforge_common::{Error, Result};
use clusterforge_core::config::TimeoutConfig;
use clusterforge_core::control_plane::{
    ClusterRecord, ControlPlaneClient, NewCluster, NodePoolRecord, ObjectRef, TemplateRecord,
    PROVIDER_LABEL,
};
use clusterforge_core::provider::ProviderRegistry;
use clusterforge_core::workload::WorkloadClusterClient;
use clusterforge_core::{ClusterService, OperationContext};
use k8s_openapi::api::core::v1::Node;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NAMESPACE: &str = "capi-test";

#[derive(Default)]
struct FakeState {
    clusters: BTreeMap<String, ClusterRecord>,
    templates: BTreeMap<String, TemplateRecord>,
    pools: BTreeMap<String, NodePoolRecord>,
    kubeconfigs: BTreeMap<String, Vec<u8>>,
    submitted: Vec<NewCluster>,
    /// Phase a created cluster reports; `None` means no phase yet
    phase_on_create: Option<String>,
    /// Reads of a deleting cluster before it disappears; `None` means never
    vanish_after: Option<u32>,
    fail_node_pools: bool,
    fail_list: Option<String>,
    /// Reads of an existing cluster fail with this backend message
    fail_get: Option<String>,
    /// Reads of a cluster marked for deletion fail with this backend message
    fail_after_delete: Option<String>,
    /// Another deleter removes the cluster between the existence check and the delete call
    delete_races: bool,
    /// Latency of each node pool listing
    pool_latency: Option<Duration>,
}

/// In-memory control plane with call counters
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<FakeState>,
    pub creates: AtomicU32,
    pub deletes: AtomicU32,
    pub updates: AtomicU32,
    pub cluster_reads: AtomicU32,
    pools_in_flight: AtomicU32,
    /// Highest number of concurrent node pool listings observed
    pub max_pools_in_flight: AtomicU32,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(self, name: &str, variables: &[&str]) -> Self {
        self.state.lock().unwrap().templates.insert(
            name.to_string(),
            TemplateRecord {
                name: name.to_string(),
                namespace: NAMESPACE.to_string(),
                variables: variables.iter().map(|v| v.to_string()).collect(),
                created_at: None,
            },
        );
        self
    }

    pub fn with_cluster(self, name: &str, provider: &str, phase: &str) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(PROVIDER_LABEL.to_string(), provider.to_string());
        self.state.lock().unwrap().clusters.insert(
            name.to_string(),
            ClusterRecord {
                name: name.to_string(),
                namespace: NAMESPACE.to_string(),
                class: Some(format!("{}-quickstart", provider)),
                version: Some("v1.30.8".to_string()),
                phase: Some(phase.to_string()),
                control_plane_ready: true,
                infrastructure_ready: true,
                infrastructure_ref: Some(ObjectRef {
                    api_version: "infrastructure.cluster.x-k8s.io/v1beta2".to_string(),
                    kind: "AWSCluster".to_string(),
                    name: name.to_string(),
                    namespace: Some(NAMESPACE.to_string()),
                }),
                labels,
                ..Default::default()
            },
        );
        self
    }

    pub fn with_pool(self, cluster: &str, name: &str, replicas: u32, ready: u32) -> Self {
        self.state.lock().unwrap().pools.insert(
            name.to_string(),
            NodePoolRecord {
                name: name.to_string(),
                namespace: NAMESPACE.to_string(),
                cluster: cluster.to_string(),
                replicas,
                ready_replicas: ready,
                updated_replicas: ready,
                available_replicas: ready,
                phase: Some("Running".to_string()),
            },
        );
        self
    }

    pub fn with_kubeconfig(self, cluster: &str, data: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .kubeconfigs
            .insert(cluster.to_string(), data.to_vec());
        self
    }

    pub fn phase_on_create(self, phase: Option<&str>) -> Self {
        self.state.lock().unwrap().phase_on_create = phase.map(str::to_string);
        self
    }

    pub fn vanish_after(self, reads: Option<u32>) -> Self {
        self.state.lock().unwrap().vanish_after = reads;
        self
    }

    pub fn fail_node_pools(self) -> Self {
        self.state.lock().unwrap().fail_node_pools = true;
        self
    }

    pub fn fail_list(self, message: &str) -> Self {
        self.state.lock().unwrap().fail_list = Some(message.to_string());
        self
    }

    pub fn fail_get(self, message: &str) -> Self {
        self.state.lock().unwrap().fail_get = Some(message.to_string());
        self
    }

    pub fn fail_after_delete(self, message: &str) -> Self {
        self.state.lock().unwrap().fail_after_delete = Some(message.to_string());
        self
    }

    pub fn delete_races(self) -> Self {
        self.state.lock().unwrap().delete_races = true;
        self
    }

    pub fn pool_latency(self, latency: Duration) -> Self {
        self.state.lock().unwrap().pool_latency = Some(latency);
        self
    }

    pub fn submitted(&self) -> Vec<NewCluster> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn replicas(&self, pool: &str) -> Option<u32> {
        self.state.lock().unwrap().pools.get(pool).map(|p| p.replicas)
    }

    pub fn mutations(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
            + self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControlPlaneClient for FakeControlPlane {
    fn namespace(&self) -> &str {
        NAMESPACE
    }

    async fn get_cluster(&self, _ctx: &OperationContext, name: &str) -> Result<ClusterRecord> {
        self.cluster_reads.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let vanish_after = state.vanish_after;
        let fail_get = state.fail_get.clone();
        let fail_after_delete = state.fail_after_delete.clone();

        let record = state
            .clusters
            .get_mut(name)
            .ok_or_else(|| Error::not_found("cluster", name))?;

        if let Some(message) = fail_get {
            return Err(Error::backend(message));
        }
        if record.deletion_requested {
            if let Some(message) = fail_after_delete {
                return Err(Error::backend(message));
            }
            if let Some(remaining) = vanish_after {
                if remaining == 0 {
                    state.clusters.remove(name);
                    return Err(Error::not_found("cluster", name));
                }
                state.vanish_after = Some(remaining - 1);
            }
        }

        Ok(state.clusters[name].clone())
    }

    async fn list_clusters(&self, _ctx: &OperationContext) -> Result<Vec<ClusterRecord>> {
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_list {
            return Err(Error::backend(message.clone()));
        }
        Ok(state.clusters.values().cloned().collect())
    }

    async fn create_cluster(
        &self,
        _ctx: &OperationContext,
        cluster: &NewCluster,
    ) -> Result<ClusterRecord> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let record = ClusterRecord {
            name: cluster.name.clone(),
            namespace: NAMESPACE.to_string(),
            class: Some(cluster.class.clone()),
            version: Some(cluster.version.clone()),
            phase: state.phase_on_create.clone(),
            variables: cluster.variables.clone(),
            labels: cluster.labels.clone(),
            failure_message: Some("AWSCluster quota exceeded".to_string())
                .filter(|_| state.phase_on_create.as_deref() == Some("Failed")),
            ..Default::default()
        };
        state.submitted.push(cluster.clone());
        state.clusters.insert(cluster.name.clone(), record.clone());
        Ok(record)
    }

    async fn delete_cluster(&self, _ctx: &OperationContext, name: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.delete_races {
            state.clusters.remove(name);
        }
        let record = state
            .clusters
            .get_mut(name)
            .ok_or_else(|| Error::not_found("cluster", name))?;
        record.deletion_requested = true;
        record.phase = Some("Deleting".to_string());
        Ok(())
    }

    async fn get_template(&self, _ctx: &OperationContext, name: &str) -> Result<TemplateRecord> {
        self.state
            .lock()
            .unwrap()
            .templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("clusterclass", name))
    }

    async fn list_templates(&self, _ctx: &OperationContext) -> Result<Vec<TemplateRecord>> {
        Ok(self.state.lock().unwrap().templates.values().cloned().collect())
    }

    async fn get_node_pool(
        &self,
        _ctx: &OperationContext,
        cluster: &str,
        name: &str,
    ) -> Result<NodePoolRecord> {
        self.state
            .lock()
            .unwrap()
            .pools
            .get(name)
            .filter(|p| p.cluster == cluster)
            .cloned()
            .ok_or_else(|| Error::not_found("machinedeployment", name))
    }

    async fn list_node_pools(
        &self,
        _ctx: &OperationContext,
        cluster: &str,
    ) -> Result<Vec<NodePoolRecord>> {
        let (pools, latency) = {
            let state = self.state.lock().unwrap();
            if state.fail_node_pools {
                return Err(Error::backend("machinedeployments unavailable"));
            }
            let pools: Vec<_> = state
                .pools
                .values()
                .filter(|p| p.cluster == cluster)
                .cloned()
                .collect();
            (pools, state.pool_latency)
        };

        if let Some(latency) = latency {
            let in_flight = self.pools_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_pools_in_flight.fetch_max(in_flight, Ordering::SeqCst);
            tokio::time::sleep(latency).await;
            self.pools_in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(pools)
    }

    async fn update_node_pool_replicas(
        &self,
        _ctx: &OperationContext,
        cluster: &str,
        name: &str,
        replicas: u32,
    ) -> Result<NodePoolRecord> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let pool = state
            .pools
            .get_mut(name)
            .filter(|p| p.cluster == cluster)
            .ok_or_else(|| Error::not_found("machinedeployment", name))?;
        pool.replicas = replicas;
        Ok(pool.clone())
    }

    async fn get_kubeconfig(&self, _ctx: &OperationContext, cluster: &str) -> Result<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .kubeconfigs
            .get(cluster)
            .cloned()
            .ok_or_else(|| Error::not_found("secret", format!("{}-kubeconfig", cluster)))
    }
}

/// Workload client returning a fixed node list
#[derive(Default)]
pub struct FakeWorkload {
    pub nodes: Vec<Node>,
}

#[async_trait]
impl WorkloadClusterClient for FakeWorkload {
    async fn list_nodes(
        &self,
        _ctx: &OperationContext,
        _cluster: &str,
        _kubeconfig: &[u8],
    ) -> Result<Vec<Node>> {
        Ok(self.nodes.clone())
    }
}

/// Service over the given fakes with default providers and timeouts
pub fn service(control_plane: Arc<FakeControlPlane>) -> ClusterService {
    service_with(control_plane, FakeWorkload::default(), TimeoutConfig::default())
}

pub fn service_with(
    control_plane: Arc<FakeControlPlane>,
    workload: FakeWorkload,
    timeouts: TimeoutConfig,
) -> ClusterService {
    let providers = Arc::new(ProviderRegistry::from_config(&Default::default()));
    ClusterService::new(control_plane, Arc::new(workload), providers).with_timeouts(timeouts)
}
