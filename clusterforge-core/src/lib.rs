//! Clusterforge core library
//!
//! Lifecycle orchestration for Cluster API managed clusters: request
//! validation, pluggable infrastructure providers, a narrow control-plane
//! facade and the service that drives create, delete and scale operations.

// Core modules
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod validation;

// Backends
pub mod control_plane;
pub mod provider;
pub mod workload;

// Orchestration
pub mod lifecycle;
pub mod observability;
pub mod tools;

// Process plumbing
pub mod shutdown;
pub mod state;

pub use config::ForgeConfig;
pub use context::OperationContext;
pub use error::ErrorResponse;
pub use lifecycle::{ClusterService, CreateClusterRequest, ScaleClusterRequest};
pub use provider::{CloudProvider, Provider, ProviderRegistry};
pub use state::AppState;
