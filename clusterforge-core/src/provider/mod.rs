//! Cloud provider registry
//!
//! Providers encapsulate everything backend-specific about a cluster:
//! - Config validation (region allow-lists, machine size grammar)
//! - Metadata (regions, instance types, supported Kubernetes versions)
//! - Infrastructure readiness checks and status extraction
//!
//! The set of providers is closed ([`Provider`]); the registry maps names to
//! instances and is populated once at startup.

mod aws;
mod azure;
mod docker;
mod gcp;

pub use aws::AwsProvider;
pub use azure::AzureProvider;
pub use docker::DockerProvider;
pub use gcp::GcpProvider;

use crate::config::ProvidersConfig;
use crate::control_plane::{ClusterRecord, PROVIDER_LABEL};
use clusterforge_common::{Error, ProviderInfo, Result, Variables};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Variable key that selects a provider explicitly
pub const PROVIDER_VARIABLE: &str = "provider";

/// Provider used when nothing else selects one
pub const DEFAULT_PROVIDER: &str = "aws";

/// Kubernetes versions shared by every shipped provider
pub(crate) const SUPPORTED_VERSIONS: &[&str] = &[
    "v1.28.15", "v1.29.12", "v1.30.8", "v1.31.4", "v1.32.0",
];

/// Capability set every backend implements
pub trait CloudProvider {
    /// Registry key
    fn name(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    /// Infrastructure object kind this backend reconciles (e.g. `AWSCluster`)
    fn infrastructure_kind(&self) -> &'static str;

    /// Variable key holding the region, if the backend has regions
    fn region_key(&self) -> Option<&'static str>;

    fn default_region(&self) -> Option<&str>;

    fn supported_versions(&self) -> Vec<String> {
        SUPPORTED_VERSIONS.iter().map(|v| v.to_string()).collect()
    }

    fn regions(&self) -> Vec<String>;

    fn instance_types(&self) -> Vec<String>;

    /// Enforce backend-specific rules on the variable bag
    ///
    /// Every violation is reported; failures carry `ProviderValidation`.
    fn validate_cluster_config(&self, variables: &Variables) -> Result<()>;

    /// Fail with a precise reason unless the cluster's infrastructure is ready
    fn validate_infrastructure_readiness(&self, cluster: &ClusterRecord) -> Result<()> {
        let infra = cluster.infrastructure_ref.as_ref().ok_or_else(|| {
            Error::precondition_failed(format!(
                "cluster '{}' has no infrastructure reference yet",
                cluster.name
            ))
            .with_detail("resource", "cluster")
        })?;

        if infra.kind != self.infrastructure_kind() {
            return Err(Error::provider_validation(
                self.name(),
                format!(
                    "cluster '{}' references {} infrastructure, expected {}",
                    cluster.name,
                    infra.kind,
                    self.infrastructure_kind()
                ),
            ));
        }

        if !cluster.infrastructure_ready {
            return Err(Error::precondition_failed(format!(
                "{} '{}' for cluster '{}' is not ready",
                infra.kind, infra.name, cluster.name
            ))
            .with_detail("resource", "cluster"));
        }

        Ok(())
    }

    /// Free-form status map for display
    fn provider_specific_status(&self, cluster: &ClusterRecord) -> BTreeMap<String, Value> {
        let mut status = BTreeMap::new();
        status.insert("provider".to_string(), Value::from(self.name()));

        if let Some(key) = self.region_key() {
            let region = cluster
                .variables
                .get(key)
                .and_then(Value::as_str)
                .or(self.default_region());
            if let Some(region) = region {
                status.insert(key.to_string(), Value::from(region));
            }
        }

        if let Some(infra) = &cluster.infrastructure_ref {
            status.insert("infrastructureKind".to_string(), Value::from(infra.kind.as_str()));
            status.insert("infrastructureName".to_string(), Value::from(infra.name.as_str()));
        }
        status.insert(
            "infrastructureReady".to_string(),
            Value::from(cluster.infrastructure_ready),
        );
        status.insert(
            "controlPlaneReady".to_string(),
            Value::from(cluster.control_plane_ready),
        );

        status
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name().to_string(),
            display_name: self.display_name().to_string(),
            default_region: self.default_region().map(str::to_string),
            supported_versions: self.supported_versions(),
        }
    }
}

/// Concrete provider enum; one variant per supported backend
#[derive(Debug, Clone)]
pub enum Provider {
    Aws(AwsProvider),
    Azure(AzureProvider),
    Gcp(GcpProvider),
    Docker(DockerProvider),
}

impl Provider {
    fn inner(&self) -> &dyn CloudProvider {
        match self {
            Provider::Aws(p) => p,
            Provider::Azure(p) => p,
            Provider::Gcp(p) => p,
            Provider::Docker(p) => p,
        }
    }
}

impl CloudProvider for Provider {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn display_name(&self) -> &'static str {
        self.inner().display_name()
    }

    fn infrastructure_kind(&self) -> &'static str {
        self.inner().infrastructure_kind()
    }

    fn region_key(&self) -> Option<&'static str> {
        self.inner().region_key()
    }

    fn default_region(&self) -> Option<&str> {
        self.inner().default_region()
    }

    fn supported_versions(&self) -> Vec<String> {
        self.inner().supported_versions()
    }

    fn regions(&self) -> Vec<String> {
        self.inner().regions()
    }

    fn instance_types(&self) -> Vec<String> {
        self.inner().instance_types()
    }

    fn validate_cluster_config(&self, variables: &Variables) -> Result<()> {
        self.inner().validate_cluster_config(variables)
    }

    fn validate_infrastructure_readiness(&self, cluster: &ClusterRecord) -> Result<()> {
        self.inner().validate_infrastructure_readiness(cluster)
    }

    fn provider_specific_status(&self, cluster: &ClusterRecord) -> BTreeMap<String, Value> {
        self.inner().provider_specific_status(cluster)
    }
}

/// Name-keyed provider table
///
/// Registration happens before the registry is shared; afterwards it is
/// read-only.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Provider>,
    default_provider: String,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: DEFAULT_PROVIDER.to_string(),
        }
    }

    /// Registry with every shipped provider, configured from `config`
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Provider::Aws(AwsProvider::new(&config.aws.default_region)));
        registry.register(Provider::Azure(AzureProvider::new(
            &config.azure.default_location,
        )));
        registry.register(Provider::Gcp(GcpProvider::new(
            &config.gcp.default_region,
            config.gcp.default_project.clone(),
        )));
        if config.docker.enabled {
            registry.register(Provider::Docker(DockerProvider::new()));
        }
        registry.set_default(&config.default_provider);
        registry
    }

    /// Register a provider under its own name
    ///
    /// Re-registering a name replaces the previous provider; the replaced one
    /// is returned.
    pub fn register(&mut self, provider: Provider) -> Option<Provider> {
        self.providers.insert(provider.name().to_string(), provider)
    }

    pub fn set_default(&mut self, name: &str) {
        self.default_provider = name.to_string();
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    pub fn get(&self, name: &str) -> Result<&Provider> {
        self.providers.get(name).ok_or_else(|| {
            Error::not_found("provider", name).with_detail("known", self.names().join(","))
        })
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every provider, sorted by name
    pub fn list(&self) -> Vec<&Provider> {
        let mut providers: Vec<&Provider> = self.providers.values().collect();
        providers.sort_by_key(|p| p.name());
        providers
    }

    /// Select the provider for a creation request
    ///
    /// Order: explicit `provider` variable, then a registered name contained in
    /// the template name (longest match first), then the default.
    pub fn resolve(&self, variables: &Variables, template: &str) -> Result<&Provider> {
        if let Some(value) = variables.get(PROVIDER_VARIABLE) {
            let name = value.as_str().ok_or_else(|| {
                Error::invalid_input(PROVIDER_VARIABLE, "provider must be a string")
            })?;
            return self.providers.get(name).ok_or_else(|| {
                Error::invalid_input(
                    PROVIDER_VARIABLE,
                    format!(
                        "unknown provider '{}' (registered: {})",
                        name,
                        self.names().join(", ")
                    ),
                )
            });
        }

        if let Some(provider) = self.match_template(template) {
            return Ok(provider);
        }

        self.providers.get(&self.default_provider).ok_or_else(|| {
            Error::unavailable(format!(
                "default provider '{}' is not registered",
                self.default_provider
            ))
        })
    }

    fn match_template(&self, template: &str) -> Option<&Provider> {
        let template = template.to_ascii_lowercase();
        let mut names = self.names();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names
            .iter()
            .find(|name| template.contains(name.as_str()))
            .and_then(|name| self.providers.get(name))
    }

    /// Best guess at the provider of an existing cluster
    ///
    /// Uses the provider label, then the infrastructure kind, then the
    /// template name. Returns `None` rather than falling back to the default.
    pub fn for_cluster(&self, cluster: &ClusterRecord) -> Option<&Provider> {
        if let Some(provider) = cluster
            .labels
            .get(PROVIDER_LABEL)
            .and_then(|name| self.providers.get(name))
        {
            return Some(provider);
        }

        if let Some(infra) = &cluster.infrastructure_ref {
            if let Some(provider) = self
                .providers
                .values()
                .find(|p| p.infrastructure_kind() == infra.kind)
            {
                return Some(provider);
            }
        }

        cluster
            .class
            .as_deref()
            .and_then(|class| self.match_template(class))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up a string variable, failing when it is present with another type
pub(crate) fn string_var<'a>(
    provider: &str,
    variables: &'a Variables,
    key: &str,
) -> Result<Option<&'a str>> {
    match variables.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(Error::provider_validation(
            provider,
            format!("{} must be a string", key),
        )
        .with_detail("field", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::ObjectRef;
    use clusterforge_common::ErrorCode;
    use serde_json::json;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::from_config(&ProvidersConfig::default())
    }

    fn vars(pairs: &[(&str, Value)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_registry_names() {
        assert_eq!(registry().names(), vec!["aws", "azure", "docker", "gcp"]);
    }

    #[test]
    fn test_resolve_explicit() {
        let registry = registry();
        let provider = registry
            .resolve(&vars(&[("provider", json!("gcp"))]), "aws-default")
            .unwrap();
        assert_eq!(provider.name(), "gcp");

        let err = registry
            .resolve(&vars(&[("provider", json!("openstack"))]), "aws-default")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert!(err.message().contains("openstack"));
    }

    #[test]
    fn test_resolve_template_substring() {
        let registry = registry();
        let provider = registry.resolve(&Variables::new(), "azure-aks-like").unwrap();
        assert_eq!(provider.name(), "azure");

        let provider = registry.resolve(&Variables::new(), "dev-docker").unwrap();
        assert_eq!(provider.name(), "docker");
    }

    #[test]
    fn test_resolve_default() {
        let registry = registry();
        let provider = registry.resolve(&Variables::new(), "quick-start").unwrap();
        assert_eq!(provider.name(), "aws");

        let mut empty = ProviderRegistry::new();
        empty.set_default("gcp");
        assert_eq!(
            empty.resolve(&Variables::new(), "x").unwrap_err().code(),
            ErrorCode::Unavailable
        );
    }

    #[test]
    fn test_register_last_wins() {
        let mut registry = ProviderRegistry::new();
        assert!(registry
            .register(Provider::Aws(AwsProvider::new("us-east-1")))
            .is_none());
        let replaced = registry.register(Provider::Aws(AwsProvider::new("eu-west-1")));
        assert_eq!(replaced.unwrap().default_region(), Some("us-east-1"));
        assert_eq!(
            registry.get("aws").unwrap().default_region(),
            Some("eu-west-1")
        );
        assert_eq!(registry.names().len(), 1);
    }

    #[test]
    fn test_get_unknown() {
        assert_eq!(
            registry().get("vsphere").unwrap_err().code(),
            ErrorCode::NotFound
        );
    }

    #[test]
    fn test_for_cluster() {
        let registry = registry();
        let mut cluster = ClusterRecord {
            name: "demo".to_string(),
            ..Default::default()
        };
        assert!(registry.for_cluster(&cluster).is_none());

        cluster.class = Some("gcp-standard".to_string());
        assert_eq!(registry.for_cluster(&cluster).unwrap().name(), "gcp");

        cluster.infrastructure_ref = Some(ObjectRef {
            api_version: "infrastructure.cluster.x-k8s.io/v1beta1".to_string(),
            kind: "AzureCluster".to_string(),
            name: "demo".to_string(),
            namespace: None,
        });
        assert_eq!(registry.for_cluster(&cluster).unwrap().name(), "azure");

        cluster
            .labels
            .insert(PROVIDER_LABEL.to_string(), "docker".to_string());
        assert_eq!(registry.for_cluster(&cluster).unwrap().name(), "docker");
    }

    #[test]
    fn test_infrastructure_readiness() {
        let registry = registry();
        let aws = registry.get("aws").unwrap();
        let mut cluster = ClusterRecord {
            name: "demo".to_string(),
            ..Default::default()
        };

        let err = aws.validate_infrastructure_readiness(&cluster).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PreconditionFailed);

        cluster.infrastructure_ref = Some(ObjectRef {
            api_version: "infrastructure.cluster.x-k8s.io/v1beta1".to_string(),
            kind: "DockerCluster".to_string(),
            name: "demo-x".to_string(),
            namespace: None,
        });
        let err = aws.validate_infrastructure_readiness(&cluster).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProviderValidation);

        cluster.infrastructure_ref.as_mut().unwrap().kind = "AWSCluster".to_string();
        let err = aws.validate_infrastructure_readiness(&cluster).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PreconditionFailed);
        assert!(err.message().contains("not ready"));

        cluster.infrastructure_ready = true;
        assert!(aws.validate_infrastructure_readiness(&cluster).is_ok());
    }

    #[test]
    fn test_status_falls_back_to_default_region() {
        let registry = registry();
        let aws = registry.get("aws").unwrap();
        let mut cluster = ClusterRecord::default();

        let status = aws.provider_specific_status(&cluster);
        assert_eq!(status.get("region"), Some(&json!("us-east-1")));
        assert_eq!(status.get("infrastructureReady"), Some(&json!(false)));

        cluster
            .variables
            .insert("region".to_string(), json!("eu-central-1"));
        let status = aws.provider_specific_status(&cluster);
        assert_eq!(status.get("region"), Some(&json!("eu-central-1")));
    }

    #[test]
    fn test_info() {
        let registry = registry();
        let info = registry.get("docker").unwrap().info();
        assert_eq!(info.name, "docker");
        assert!(info.default_region.is_none());
        assert!(!info.supported_versions.is_empty());
    }
}
