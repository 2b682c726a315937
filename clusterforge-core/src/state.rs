//! Application State
//!
//! Everything an entry point needs, built once at startup from the config and
//! passed down explicitly.

use crate::config::ForgeConfig;
use crate::context::OperationContext;
use crate::control_plane::{ControlPlaneClient, KubeControlPlane, UnavailableControlPlane};
use crate::lifecycle::ClusterService;
use crate::observability::MetricsObserver;
use crate::provider::ProviderRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::workload::{KubeWorkloadClient, WorkloadClusterClient};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ForgeConfig>,
    pub service: Arc<ClusterService>,
    pub metrics: Arc<MetricsObserver>,
    pub shutdown: ShutdownCoordinator,
}

impl AppState {
    /// Connect to the control plane described by `config` and wire the service
    ///
    /// A disabled or unreachable control plane is replaced by a stand-in that
    /// reports `Unavailable`, so validation and provider metadata keep working.
    pub async fn build(config: ForgeConfig) -> Self {
        let namespace = config.control_plane.namespace.clone();

        let control_plane: Arc<dyn ControlPlaneClient> = if !config.control_plane.enabled {
            info!("Control plane disabled by configuration");
            Arc::new(UnavailableControlPlane::new(namespace, "disabled by configuration"))
        } else {
            match KubeControlPlane::connect(&config.control_plane).await {
                Ok(client) => {
                    info!(namespace = %namespace, "Control plane client initialized");
                    Arc::new(client)
                }
                Err(e) => {
                    warn!(error = %e.safe_message(), "Control plane unavailable");
                    Arc::new(UnavailableControlPlane::new(namespace, e.safe_message()))
                }
            }
        };

        Self::with_clients(config, control_plane, Arc::new(KubeWorkloadClient))
    }

    /// Wire the service around the given clients
    pub fn with_clients(
        config: ForgeConfig,
        control_plane: Arc<dyn ControlPlaneClient>,
        workloads: Arc<dyn WorkloadClusterClient>,
    ) -> Self {
        let providers = Arc::new(ProviderRegistry::from_config(&config.providers));
        info!(
            providers = %providers.names().join(","),
            default = providers.default_provider(),
            "Provider registry initialized"
        );

        let metrics = Arc::new(MetricsObserver::new());
        let service = ClusterService::new(control_plane, workloads, providers)
            .with_timeouts(config.timeouts.clone())
            .with_metrics(metrics.clone());

        Self {
            config: Arc::new(config),
            service: Arc::new(service),
            metrics,
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Context for one operation, cancelled on shutdown
    pub fn context(&self) -> OperationContext {
        self.shutdown.context()
    }
}
