use super::{ClusterService, CreateClusterRequest};
use crate::provider::CloudProvider;
use clusterforge_common::{ProviderInfo, Result, ValidationReport};

impl ClusterService {
    /// Run every create-time check without touching the control plane
    pub fn validate_cluster_request(&self, request: &CreateClusterRequest) -> Result<ValidationReport> {
        let request = request.clone().normalized();
        self.observe_sync("validate_cluster_request", Some(&request.name), || {
            let provider = self.check_create_request(&request)?;
            Ok(ValidationReport {
                valid: true,
                name: request.name.clone(),
                template: request.template.clone(),
                version: request.version.clone(),
                provider: provider.name().to_string(),
            })
        })
    }

    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        let listed: Result<Vec<ProviderInfo>> = self.observe_sync("list_providers", None, || {
            Ok(self.providers.list().into_iter().map(|p| p.info()).collect())
        });
        listed.unwrap_or_default()
    }

    pub fn list_regions(&self, provider: &str) -> Result<Vec<String>> {
        self.observe_sync("list_regions", None, || {
            Ok(self.providers.get(provider)?.regions())
        })
    }

    pub fn list_instance_types(&self, provider: &str) -> Result<Vec<String>> {
        self.observe_sync("list_instance_types", None, || {
            Ok(self.providers.get(provider)?.instance_types())
        })
    }

    pub fn list_supported_versions(&self, provider: &str) -> Result<Vec<String>> {
        self.observe_sync("list_supported_versions", None, || {
            Ok(self.providers.get(provider)?.supported_versions())
        })
    }
}
