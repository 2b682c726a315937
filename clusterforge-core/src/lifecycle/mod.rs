//! Cluster lifecycle service
//!
//! Every public operation follows the same shape: validate, resolve the
//! provider, call the control plane, and for mutations poll until a terminal
//! condition or the wait ceiling. Mutations report initiation rather than
//! convergence; a wait that runs out after a successful submit degrades to
//! the best-known state instead of failing.

mod catalog;
mod mutate;
mod read;
pub mod wait;

pub use read::LIST_ENRICHMENT_CONCURRENCY;
pub use wait::{poll_until, PollPolicy, WaitOutcome, CREATE_POLL, DELETE_POLL};

use crate::config::TimeoutConfig;
use crate::control_plane::ControlPlaneClient;
use crate::observability::{
    CompositeObserver, MetricsObserver, OperationObserver, Outcome, TracingObserver,
};
use crate::provider::ProviderRegistry;
use crate::validation;
use crate::workload::WorkloadClusterClient;
use clusterforge_common::{Result, Variables};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::info;

/// Arguments of a create (or validate-only) request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClusterRequest {
    pub name: String,
    pub template: String,
    pub version: String,
    #[serde(default)]
    pub variables: Variables,
    /// Replace an invalid name with its sanitized form instead of rejecting it
    #[serde(default)]
    pub auto_correct_name: bool,
}

impl CreateClusterRequest {
    /// Apply name auto-correction when the caller opted in
    pub(crate) fn normalized(mut self) -> Self {
        if self.auto_correct_name {
            let sanitized = validation::sanitize_name(&self.name);
            if sanitized != self.name {
                info!(requested = %self.name, name = %sanitized, "Cluster name auto-corrected");
                self.name = sanitized;
            }
        }
        self
    }
}

/// Arguments of a scale request
///
/// `replicas` is signed so negative input reaches validation instead of
/// failing to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleClusterRequest {
    pub cluster: String,
    pub node_pool: String,
    pub replicas: i64,
}

/// Orchestrates cluster operations over the control plane
pub struct ClusterService {
    control_plane: Arc<dyn ControlPlaneClient>,
    workloads: Arc<dyn WorkloadClusterClient>,
    providers: Arc<ProviderRegistry>,
    timeouts: TimeoutConfig,
    observers: CompositeObserver,
    metrics: Option<Arc<MetricsObserver>>,
}

impl ClusterService {
    pub fn new(
        control_plane: Arc<dyn ControlPlaneClient>,
        workloads: Arc<dyn WorkloadClusterClient>,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            control_plane,
            workloads,
            providers,
            timeouts: TimeoutConfig::default(),
            observers: CompositeObserver::new().with(Arc::new(TracingObserver)),
            metrics: None,
        }
    }

    /// Per-operation request ceilings
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Add an observer alongside the tracing one
    pub fn with_observer(mut self, observer: Arc<dyn OperationObserver>) -> Self {
        self.observers = self.observers.with(observer);
        self
    }

    /// Install a metrics observer and expose it through [`Self::metrics_text`]
    pub fn with_metrics(mut self, metrics: Arc<MetricsObserver>) -> Self {
        self.observers = self.observers.with(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn namespace(&self) -> &str {
        self.control_plane.namespace()
    }

    /// Prometheus text of the installed metrics observer
    pub fn metrics_text(&self) -> Option<String> {
        self.metrics.as_ref().map(|m| m.render())
    }

    /// Report entry and exit of `fut` to the observers
    async fn observe<T, F>(&self, operation: &str, cluster: Option<&str>, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.observers.on_start(operation, cluster);
        let started = Instant::now();

        let result = fut.await.map_err(|e| e.in_operation(operation));

        self.observers
            .on_finish(operation, cluster, started.elapsed(), outcome_of(&result));
        result
    }

    fn observe_sync<T>(
        &self,
        operation: &str,
        cluster: Option<&str>,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        self.observers.on_start(operation, cluster);
        let started = Instant::now();

        let result = f().map_err(|e| e.in_operation(operation));

        self.observers
            .on_finish(operation, cluster, started.elapsed(), outcome_of(&result));
        result
    }
}

fn outcome_of<T>(result: &Result<T>) -> Outcome {
    match result {
        Ok(_) => Outcome::Success,
        Err(e) => Outcome::Error(e.code()),
    }
}
