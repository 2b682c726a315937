//! Google Cloud (CAPG)

use super::{string_var, CloudProvider};
use crate::validation::collect;
use clusterforge_common::{Error, Result, Variables};
use regex::Regex;
use std::sync::LazyLock;

const NAME: &str = "gcp";

const GCP_REGIONS: &[&str] = &[
    "us-central1",
    "us-east1",
    "us-east4",
    "us-west1",
    "us-west2",
    "northamerica-northeast1",
    "southamerica-east1",
    "europe-west1",
    "europe-west2",
    "europe-west3",
    "europe-west4",
    "europe-north1",
    "asia-east1",
    "asia-northeast1",
    "asia-south1",
    "asia-southeast1",
    "australia-southeast1",
];

const MACHINE_TYPES: &[&str] = &[
    "e2-medium",
    "e2-standard-2",
    "e2-standard-4",
    "e2-standard-8",
    "n2-standard-2",
    "n2-standard-4",
    "n2-standard-8",
    "n2-highmem-4",
    "n2-highcpu-8",
    "c3-standard-4",
    "t2d-standard-4",
];

/// Variable keys carrying machine types
const MACHINE_TYPE_KEYS: &[&str] = &[
    "machineType",
    "controlPlaneMachineType",
    "workerMachineType",
];

static MACHINE_TYPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-z][a-z0-9]*-(standard|highmem|highcpu|micro|small|medium|megamem|ultramem|custom)(-[0-9]+)*$",
    )
    .unwrap()
});

static PROJECT_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]{4,28}[a-z0-9]$").unwrap());

#[derive(Debug, Clone)]
pub struct GcpProvider {
    default_region: String,
    default_project: Option<String>,
}

impl GcpProvider {
    pub fn new(default_region: &str, default_project: Option<String>) -> Self {
        Self {
            default_region: default_region.to_string(),
            default_project,
        }
    }
}

impl CloudProvider for GcpProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Google Cloud Platform"
    }

    fn infrastructure_kind(&self) -> &'static str {
        "GCPCluster"
    }

    fn region_key(&self) -> Option<&'static str> {
        Some("region")
    }

    fn default_region(&self) -> Option<&str> {
        Some(&self.default_region)
    }

    fn regions(&self) -> Vec<String> {
        GCP_REGIONS.iter().map(|r| r.to_string()).collect()
    }

    fn instance_types(&self) -> Vec<String> {
        MACHINE_TYPES.iter().map(|t| t.to_string()).collect()
    }

    fn validate_cluster_config(&self, variables: &Variables) -> Result<()> {
        let mut errors = Vec::new();

        match string_var(NAME, variables, "project") {
            Ok(Some(project)) if !PROJECT_ID_REGEX.is_match(project) => errors.push(
                Error::provider_validation(
                    NAME,
                    format!("project '{}' is not a valid GCP project ID", project),
                )
                .with_detail("field", "project"),
            ),
            Ok(None) if self.default_project.is_none() => errors.push(
                Error::provider_validation(NAME, "project is required for GCP clusters")
                    .with_detail("field", "project"),
            ),
            Ok(_) => {}
            Err(e) => errors.push(e),
        }

        match string_var(NAME, variables, "region") {
            Ok(Some(region)) if !GCP_REGIONS.contains(&region) => errors.push(
                Error::provider_validation(
                    NAME,
                    format!("region '{}' is not a supported GCP region", region),
                )
                .with_detail("field", "region"),
            ),
            Ok(_) => {}
            Err(e) => errors.push(e),
        }

        for key in MACHINE_TYPE_KEYS {
            match string_var(NAME, variables, key) {
                Ok(Some(machine)) if !MACHINE_TYPE_REGEX.is_match(machine) => errors.push(
                    Error::provider_validation(
                        NAME,
                        format!(
                            "{} '{}' must follow family-class[-cpus] (e.g. n2-standard-4)",
                            key, machine
                        ),
                    )
                    .with_detail("field", *key),
                ),
                Ok(_) => {}
                Err(e) => errors.push(e),
            }
        }

        collect(errors)
    }
}
