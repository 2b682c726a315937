//! Docker (CAPD), local development clusters

use super::CloudProvider;
use clusterforge_common::{Error, Result, Variables};

const NAME: &str = "docker";

/// CAPD runs nodes as local containers; these keys have no meaning there
const UNSUPPORTED_KEYS: &[&str] = &["region", "location", "instanceType", "vmSize", "machineType"];

#[derive(Debug, Clone, Default)]
pub struct DockerProvider;

impl DockerProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CloudProvider for DockerProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Docker (local development)"
    }

    fn infrastructure_kind(&self) -> &'static str {
        "DockerCluster"
    }

    fn region_key(&self) -> Option<&'static str> {
        None
    }

    fn default_region(&self) -> Option<&str> {
        None
    }

    fn regions(&self) -> Vec<String> {
        Vec::new()
    }

    fn instance_types(&self) -> Vec<String> {
        Vec::new()
    }

    fn validate_cluster_config(&self, variables: &Variables) -> Result<()> {
        let errors = UNSUPPORTED_KEYS
            .iter()
            .filter(|key| variables.contains_key(**key))
            .map(|key| {
                Error::provider_validation(
                    NAME,
                    format!("{} is not supported by the docker provider", key),
                )
                .with_detail("field", *key)
            })
            .collect();

        crate::validation::collect(errors)
    }
}
