//! Azure (CAPZ)

use super::{string_var, CloudProvider};
use crate::validation::collect;
use clusterforge_common::{Error, Result, Variables};
use regex::Regex;
use std::sync::LazyLock;

const NAME: &str = "azure";

const AZURE_LOCATIONS: &[&str] = &[
    "eastus",
    "eastus2",
    "centralus",
    "northcentralus",
    "southcentralus",
    "westus",
    "westus2",
    "westus3",
    "canadacentral",
    "brazilsouth",
    "northeurope",
    "westeurope",
    "uksouth",
    "francecentral",
    "germanywestcentral",
    "swedencentral",
    "switzerlandnorth",
    "centralindia",
    "japaneast",
    "koreacentral",
    "southeastasia",
    "eastasia",
    "australiaeast",
];

const VM_SIZES: &[&str] = &[
    "Standard_B2s",
    "Standard_D2s_v3",
    "Standard_D4s_v3",
    "Standard_D8s_v3",
    "Standard_D2s_v5",
    "Standard_D4s_v5",
    "Standard_E4s_v5",
    "Standard_F4s_v2",
    "Standard_NC6s_v3",
];

/// Variable keys carrying VM sizes
const VM_SIZE_KEYS: &[&str] = &["vmSize", "controlPlaneVmSize", "workerVmSize"];

static VM_SIZE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Standard_[A-Z]+[0-9]+[a-z]*(_[A-Za-z0-9]+)*$").unwrap()
});

static SUBSCRIPTION_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

#[derive(Debug, Clone)]
pub struct AzureProvider {
    default_location: String,
}

impl AzureProvider {
    pub fn new(default_location: &str) -> Self {
        Self {
            default_location: default_location.to_string(),
        }
    }
}

impl CloudProvider for AzureProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Microsoft Azure"
    }

    fn infrastructure_kind(&self) -> &'static str {
        "AzureCluster"
    }

    fn region_key(&self) -> Option<&'static str> {
        Some("location")
    }

    fn default_region(&self) -> Option<&str> {
        Some(&self.default_location)
    }

    fn regions(&self) -> Vec<String> {
        AZURE_LOCATIONS.iter().map(|l| l.to_string()).collect()
    }

    fn instance_types(&self) -> Vec<String> {
        VM_SIZES.iter().map(|s| s.to_string()).collect()
    }

    fn validate_cluster_config(&self, variables: &Variables) -> Result<()> {
        let mut errors = Vec::new();

        match string_var(NAME, variables, "location") {
            Ok(Some(location)) if !AZURE_LOCATIONS.contains(&location) => errors.push(
                Error::provider_validation(
                    NAME,
                    format!("location '{}' is not a supported Azure location", location),
                )
                .with_detail("field", "location"),
            ),
            Ok(_) => {}
            Err(e) => errors.push(e),
        }

        for key in VM_SIZE_KEYS {
            match string_var(NAME, variables, key) {
                Ok(Some(size)) if !VM_SIZE_REGEX.is_match(size) => errors.push(
                    Error::provider_validation(
                        NAME,
                        format!(
                            "{} '{}' must look like Standard_<series> (e.g. Standard_D4s_v5)",
                            key, size
                        ),
                    )
                    .with_detail("field", *key),
                ),
                Ok(_) => {}
                Err(e) => errors.push(e),
            }
        }

        match string_var(NAME, variables, "subscriptionID") {
            Ok(Some(id)) if !SUBSCRIPTION_ID_REGEX.is_match(id) => errors.push(
                Error::provider_validation(NAME, "subscriptionID must be a GUID")
                    .with_detail("field", "subscriptionID"),
            ),
            Ok(_) => {}
            Err(e) => errors.push(e),
        }

        collect(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterforge_common::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_vm_size_grammar() {
        for size in VM_SIZES {
            assert!(VM_SIZE_REGEX.is_match(size), "{}", size);
        }
        assert!(VM_SIZE_REGEX.is_match("Standard_M128ms"));
        assert!(!VM_SIZE_REGEX.is_match("standard_d2s_v3"));
        assert!(!VM_SIZE_REGEX.is_match("D2s_v3"));
        assert!(!VM_SIZE_REGEX.is_match("m5.large"));
    }

    #[test]
    fn test_validate_azure_config() {
        let azure = AzureProvider::new("eastus");
        let mut vars = Variables::new();
        vars.insert("location".to_string(), json!("westeurope"));
        vars.insert("vmSize".to_string(), json!("Standard_D4s_v5"));
        vars.insert(
            "subscriptionID".to_string(),
            json!("00000000-1111-2222-3333-444444444444"),
        );
        assert!(azure.validate_cluster_config(&vars).is_ok());

        vars.insert("location".to_string(), json!("us-east-1"));
        vars.insert("workerVmSize".to_string(), json!("t3.large"));
        let err = azure.validate_cluster_config(&vars).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProviderValidation);
        assert_eq!(err.detail("error_count"), Some(&json!(2)));
    }

    #[test]
    fn test_location_type_checked() {
        let azure = AzureProvider::new("eastus");
        let mut vars = Variables::new();
        vars.insert("location".to_string(), json!(42));
        assert!(azure.validate_cluster_config(&vars).is_err());
    }
}
