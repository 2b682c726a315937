//! AWS (CAPA)

use super::{string_var, CloudProvider};
use crate::validation::collect;
use clusterforge_common::{Error, Result, Variables};

const NAME: &str = "aws";

pub(crate) const AWS_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "ca-central-1",
    "sa-east-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-central-2",
    "eu-north-1",
    "eu-south-1",
    "ap-south-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-east-1",
    "me-south-1",
    "af-south-1",
];

/// Instance families accepted for cluster machines
const INSTANCE_FAMILIES: &[&str] = &[
    "t3", "t3a", "t4g", "m5", "m5a", "m6i", "m6a", "m6g", "m7i", "m7g", "c5", "c5a", "c6i",
    "c6g", "c7i", "c7g", "r5", "r6i", "r6g", "r7i", "g4dn", "g5", "p3", "p4d", "i3", "i4i",
];

const INSTANCE_TYPES: &[&str] = &[
    "t3.medium",
    "t3.large",
    "t3.xlarge",
    "m5.large",
    "m5.xlarge",
    "m5.2xlarge",
    "m6i.large",
    "m6i.xlarge",
    "m6i.2xlarge",
    "c5.large",
    "c5.xlarge",
    "c6i.2xlarge",
    "r5.large",
    "r6i.xlarge",
    "g4dn.xlarge",
];

/// Variable keys carrying EC2 instance types
const INSTANCE_TYPE_KEYS: &[&str] = &[
    "instanceType",
    "controlPlaneInstanceType",
    "workerInstanceType",
];

const MAX_SSH_KEY_NAME_LENGTH: usize = 255;

#[derive(Debug, Clone)]
pub struct AwsProvider {
    default_region: String,
}

impl AwsProvider {
    pub fn new(default_region: &str) -> Self {
        Self {
            default_region: default_region.to_string(),
        }
    }

    fn check_instance_type(key: &str, value: &str) -> Option<Error> {
        let family = match value.split_once('.') {
            Some((family, size)) if !family.is_empty() && !size.is_empty() => family,
            _ => {
                return Some(
                    Error::provider_validation(
                        NAME,
                        format!("{} '{}' is not an EC2 instance type", key, value),
                    )
                    .with_detail("field", key),
                )
            }
        };

        if INSTANCE_FAMILIES.contains(&family) {
            None
        } else {
            Some(
                Error::provider_validation(
                    NAME,
                    format!(
                        "{} '{}' uses unsupported instance family '{}'",
                        key, value, family
                    ),
                )
                .with_detail("field", key),
            )
        }
    }
}

impl CloudProvider for AwsProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Amazon Web Services"
    }

    fn infrastructure_kind(&self) -> &'static str {
        "AWSCluster"
    }

    fn region_key(&self) -> Option<&'static str> {
        Some("region")
    }

    fn default_region(&self) -> Option<&str> {
        Some(&self.default_region)
    }

    fn regions(&self) -> Vec<String> {
        AWS_REGIONS.iter().map(|r| r.to_string()).collect()
    }

    fn instance_types(&self) -> Vec<String> {
        INSTANCE_TYPES.iter().map(|t| t.to_string()).collect()
    }

    fn validate_cluster_config(&self, variables: &Variables) -> Result<()> {
        let mut errors = Vec::new();

        match string_var(NAME, variables, "region") {
            Ok(Some(region)) if !AWS_REGIONS.contains(&region) => errors.push(
                Error::provider_validation(
                    NAME,
                    format!("region '{}' is not a supported AWS region", region),
                )
                .with_detail("field", "region"),
            ),
            Ok(_) => {}
            Err(e) => errors.push(e),
        }

        for key in INSTANCE_TYPE_KEYS {
            match string_var(NAME, variables, key) {
                Ok(Some(value)) => errors.extend(Self::check_instance_type(key, value)),
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }

        match string_var(NAME, variables, "sshKeyName") {
            Ok(Some(name)) if name.trim().is_empty() || name.len() > MAX_SSH_KEY_NAME_LENGTH => {
                errors.push(
                    Error::provider_validation(
                        NAME,
                        format!(
                            "sshKeyName must be 1-{} characters",
                            MAX_SSH_KEY_NAME_LENGTH
                        ),
                    )
                    .with_detail("field", "sshKeyName"),
                )
            }
            Ok(_) => {}
            Err(e) => errors.push(e),
        }

        collect(errors)
    }
}
