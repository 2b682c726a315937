///! Input validation and name sanitization
///!
///! Structural checks on names, versions, counts and well-known provider
///! variables. Request-level validation collects every violation and reports
///! them as one combined error instead of failing on the first.

use clusterforge_common::{Error, Variables};
use regex::Regex;
use serde_json::Value;
use std::net::IpAddr;
use std::sync::LazyLock;

/// DNS label limit
pub const MAX_NAME_LENGTH: usize = 63;
/// Upper bound for node-pool replicas and node counts
pub const MAX_REPLICAS: i64 = 100;
pub const MIN_NODE_COUNT: i64 = 1;
pub const MAX_NODE_COUNT: i64 = 100;

/// Accepted IPv4 prefix lengths
pub const IPV4_PREFIX_RANGE: std::ops::RangeInclusive<u8> = 8..=28;
/// Accepted IPv6 prefix lengths
pub const IPV6_PREFIX_RANGE: std::ops::RangeInclusive<u8> = 48..=120;

/// Fallback used by [`sanitize_name`] when nothing usable remains
pub const DEFAULT_SANITIZED_NAME: &str = "cluster";

static DNS_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap()
});

static K8S_VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)(-[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?$")
        .unwrap()
});

static INSTANCE_TYPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]*\.[a-z0-9]+$").unwrap()
});

/// Validation result type
pub type ValidationResult<T> = Result<T, Error>;

fn validate_dns_label(field: &str, kind: &str, value: &str) -> ValidationResult<()> {
    if value.is_empty() {
        return Err(Error::invalid_input(field, format!("{} cannot be empty", kind)));
    }

    if value.len() > MAX_NAME_LENGTH {
        return Err(Error::invalid_input(
            field,
            format!("{} too long (max {} characters)", kind, MAX_NAME_LENGTH),
        ));
    }

    if !DNS_LABEL_REGEX.is_match(value) {
        return Err(Error::invalid_input(
            field,
            format!(
                "{} '{}' must consist of lowercase alphanumeric characters or '-', and must start and end with an alphanumeric character",
                kind, value
            ),
        ));
    }

    Ok(())
}

/// Cluster name validation
pub fn validate_cluster_name(name: &str) -> ValidationResult<()> {
    validate_dns_label("name", "cluster name", name)
}

/// Template (ClusterClass) name validation
pub fn validate_template_name(name: &str) -> ValidationResult<()> {
    validate_dns_label("template", "template name", name)
}

/// Node pool name validation
pub fn validate_node_pool_name(name: &str) -> ValidationResult<()> {
    validate_dns_label("node_pool", "node pool name", name)
}

/// Kubernetes version validation (`vMAJOR.MINOR.PATCH[-prerelease]`)
pub fn validate_kubernetes_version(version: &str) -> ValidationResult<()> {
    if version.is_empty() {
        return Err(Error::invalid_input(
            "version",
            "Kubernetes version cannot be empty",
        ));
    }

    if !K8S_VERSION_REGEX.is_match(version) {
        return Err(Error::invalid_input(
            "version",
            format!(
                "Kubernetes version '{}' must match vMAJOR.MINOR.PATCH with an optional -prerelease suffix",
                version
            ),
        ));
    }

    Ok(())
}

/// Replica count validation
pub fn validate_replicas(replicas: i64) -> ValidationResult<()> {
    if !(0..=MAX_REPLICAS).contains(&replicas) {
        return Err(Error::invalid_input(
            "replicas",
            format!("replicas must be between 0 and {} (got {})", MAX_REPLICAS, replicas),
        ));
    }

    Ok(())
}

/// `nodeCount` variable validation
pub fn validate_node_count(value: &Value) -> ValidationResult<()> {
    let count = value.as_i64().ok_or_else(|| {
        Error::invalid_input("nodeCount", format!("nodeCount must be an integer (got {})", value))
    })?;

    if !(MIN_NODE_COUNT..=MAX_NODE_COUNT).contains(&count) {
        return Err(Error::invalid_input(
            "nodeCount",
            format!(
                "nodeCount must be between {} and {} (got {})",
                MIN_NODE_COUNT, MAX_NODE_COUNT, count
            ),
        ));
    }

    Ok(())
}

/// `region` variable validation, optionally against a known-region set
pub fn validate_region(value: &Value, known_regions: Option<&[&str]>) -> ValidationResult<()> {
    let region = match value.as_str() {
        Some(r) if !r.trim().is_empty() => r,
        Some(_) => return Err(Error::invalid_input("region", "region cannot be empty")),
        None => return Err(Error::invalid_input("region", "region must be a string")),
    };

    if let Some(known) = known_regions {
        if !known.contains(&region) {
            return Err(Error::invalid_input(
                "region",
                format!("region '{}' is not a known region", region),
            ));
        }
    }

    Ok(())
}

/// `instanceType` variable validation (`family.size`, e.g. `t3.medium`)
pub fn validate_instance_type(value: &Value) -> ValidationResult<()> {
    let instance_type = value
        .as_str()
        .ok_or_else(|| Error::invalid_input("instanceType", "instanceType must be a string"))?;

    if !INSTANCE_TYPE_REGEX.is_match(instance_type) {
        return Err(Error::invalid_input(
            "instanceType",
            format!(
                "instanceType '{}' must follow the family.size pattern (e.g. t3.medium)",
                instance_type
            ),
        ));
    }

    Ok(())
}

/// True for variable keys that carry network CIDRs
pub fn is_cidr_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.ends_with("cidr")
        || lower.ends_with("cidrs")
        || lower.ends_with("cidrblock")
        || lower.ends_with("cidrblocks")
}

/// CIDR notation validation with a bounded prefix length
pub fn validate_cidr(field: &str, cidr: &str) -> ValidationResult<()> {
    let (addr, prefix) = cidr.split_once('/').ok_or_else(|| {
        Error::invalid_input(
            field,
            format!("'{}' is not valid CIDR notation (expected ADDRESS/PREFIX)", cidr),
        )
    })?;

    let addr: IpAddr = addr.parse().map_err(|_| {
        Error::invalid_input(field, format!("'{}' has an invalid network address", cidr))
    })?;

    let prefix: u8 = prefix.parse().map_err(|_| {
        Error::invalid_input(field, format!("'{}' has an invalid prefix length", cidr))
    })?;

    let range = match addr {
        IpAddr::V4(_) => IPV4_PREFIX_RANGE,
        IpAddr::V6(_) => IPV6_PREFIX_RANGE,
    };

    if !range.contains(&prefix) {
        return Err(Error::invalid_input(
            field,
            format!(
                "'{}' prefix length must be between /{} and /{}",
                cidr,
                range.start(),
                range.end()
            ),
        ));
    }

    Ok(())
}

fn validate_cidr_value(field: &str, value: &Value) -> Vec<Error> {
    match value {
        Value::String(s) => validate_cidr(field, s).err().into_iter().collect(),
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item.as_str() {
                Some(s) => validate_cidr(field, s).err(),
                None => Some(Error::invalid_input(
                    field,
                    format!("{} entries must be strings", field),
                )),
            })
            .collect(),
        _ => vec![Error::invalid_input(
            field,
            format!("{} must be a CIDR string or a list of CIDR strings", field),
        )],
    }
}

/// Type-check the well-known keys of a provider variable bag
///
/// Unknown keys are left to the provider. Returns every violation found.
pub fn validate_provider_variables(variables: &Variables) -> Vec<Error> {
    let mut errors = Vec::new();

    for (key, value) in variables {
        match key.as_str() {
            "nodeCount" => errors.extend(validate_node_count(value).err()),
            "region" => errors.extend(validate_region(value, None).err()),
            "instanceType" => errors.extend(validate_instance_type(value).err()),
            k if is_cidr_key(k) => errors.extend(validate_cidr_value(k, value)),
            _ => {}
        }
    }

    errors
}

/// Combine collected violations into a single error
pub fn collect(errors: Vec<Error>) -> ValidationResult<()> {
    match Error::combine(errors) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Validate the shape of a cluster creation request
pub fn validate_create_request(
    name: &str,
    template: &str,
    version: &str,
    variables: &Variables,
) -> ValidationResult<()> {
    let mut errors = Vec::new();

    errors.extend(validate_cluster_name(name).err());
    errors.extend(validate_template_name(template).err());
    errors.extend(validate_kubernetes_version(version).err());
    errors.extend(validate_provider_variables(variables));

    collect(errors)
}

/// Derive a valid DNS-label name from an arbitrary string
///
/// Best-effort only: callers must opt in before a sanitized name replaces
/// one they supplied.
pub fn sanitize_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = false;

    for c in input.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };

        if c == '-' {
            if last_dash {
                continue;
            }
            last_dash = true;
        } else {
            last_dash = false;
        }
        out.push(c);
    }

    let trimmed: String = out.trim_matches('-').chars().take(MAX_NAME_LENGTH).collect();
    let trimmed = trimmed.trim_end_matches('-');

    if trimmed.is_empty() {
        DEFAULT_SANITIZED_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterforge_common::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_validate_cluster_name() {
        assert!(validate_cluster_name("my-cluster-1").is_ok());
        assert!(validate_cluster_name("a").is_ok());
        assert!(validate_cluster_name(&"a".repeat(63)).is_ok());
        assert!(validate_cluster_name("My-Cluster!").is_err());
        assert!(validate_cluster_name("").is_err());
        assert!(validate_cluster_name("-leading").is_err());
        assert!(validate_cluster_name("trailing-").is_err());
        assert!(validate_cluster_name("under_score").is_err());
        assert!(validate_cluster_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_name_error_carries_field() {
        let err = validate_cluster_name("Bad").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert_eq!(err.detail("field"), Some(&json!("name")));
    }

    #[test]
    fn test_validate_kubernetes_version() {
        assert!(validate_kubernetes_version("v1.28.0").is_ok());
        assert!(validate_kubernetes_version("v1.29.0-alpha.1").is_ok());
        assert!(validate_kubernetes_version("v1.30.2-rc.0").is_ok());
        assert!(validate_kubernetes_version("1.28.0").is_err());
        assert!(validate_kubernetes_version("v1.28").is_err());
        assert!(validate_kubernetes_version("v1.28.0.1").is_err());
        assert!(validate_kubernetes_version("").is_err());
    }

    #[test]
    fn test_validate_replicas() {
        assert!(validate_replicas(0).is_ok());
        assert!(validate_replicas(100).is_ok());
        assert!(validate_replicas(-1).is_err());
        assert!(validate_replicas(101).is_err());
    }

    #[test]
    fn test_validate_node_count() {
        assert!(validate_node_count(&json!(3)).is_ok());
        assert!(validate_node_count(&json!(0)).is_err());
        assert!(validate_node_count(&json!(101)).is_err());
        assert!(validate_node_count(&json!("3")).is_err());
        assert!(validate_node_count(&json!(2.5)).is_err());
    }

    #[test]
    fn test_validate_region() {
        assert!(validate_region(&json!("us-east-1"), None).is_ok());
        assert!(validate_region(&json!(""), None).is_err());
        assert!(validate_region(&json!(5), None).is_err());
        assert!(validate_region(&json!("us-east-1"), Some(&["us-east-1"])).is_ok());
        assert!(validate_region(&json!("mars-1"), Some(&["us-east-1"])).is_err());
    }

    #[test]
    fn test_validate_instance_type() {
        assert!(validate_instance_type(&json!("t3.medium")).is_ok());
        assert!(validate_instance_type(&json!("m5.2xlarge")).is_ok());
        assert!(validate_instance_type(&json!("t3")).is_err());
        assert!(validate_instance_type(&json!("T3.Medium")).is_err());
        assert!(validate_instance_type(&json!(3)).is_err());
    }

    #[test]
    fn test_validate_cidr() {
        assert!(validate_cidr("podCIDR", "192.168.0.0/16").is_ok());
        assert!(validate_cidr("podCIDR", "10.0.0.0/8").is_ok());
        assert!(validate_cidr("podCIDR", "10.0.0.0/28").is_ok());
        assert!(validate_cidr("podCIDR", "10.0.0.0/7").is_err());
        assert!(validate_cidr("podCIDR", "10.0.0.0/29").is_err());
        assert!(validate_cidr("podCIDR", "10.0.0.0").is_err());
        assert!(validate_cidr("podCIDR", "300.0.0.0/16").is_err());
        assert!(validate_cidr("podCIDR", "fd00::/64").is_ok());
        assert!(validate_cidr("podCIDR", "fd00::/32").is_err());
    }

    #[test]
    fn test_is_cidr_key() {
        assert!(is_cidr_key("podCIDR"));
        assert!(is_cidr_key("vpcCidr"));
        assert!(is_cidr_key("serviceCIDRs"));
        assert!(is_cidr_key("cidrBlocks"));
        assert!(!is_cidr_key("region"));
    }

    #[test]
    fn test_provider_variables_collects_all() {
        let mut vars = Variables::new();
        vars.insert("nodeCount".to_string(), json!(0));
        vars.insert("podCIDR".to_string(), json!(["10.0.0.0/16", "bogus"]));
        vars.insert("instanceType".to_string(), json!("huge"));
        vars.insert("sshKeyName".to_string(), json!("anything"));

        let errors = validate_provider_variables(&vars);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_create_request_combines_errors() {
        let err = validate_create_request("My-Cluster!", "default", "1.28", &Variables::new())
            .unwrap_err();
        let msg = err.message();
        assert!(msg.contains("cluster name"));
        assert!(msg.contains("Kubernetes version"));
        assert!(msg.contains("1. "));
        assert!(msg.contains("2. "));
        assert_eq!(err.detail("field"), Some(&json!(["name", "version"])));
    }

    #[test]
    fn test_create_request_ok() {
        let mut vars = Variables::new();
        vars.insert("region".to_string(), json!("us-west-2"));
        vars.insert("nodeCount".to_string(), json!(3));
        assert!(validate_create_request("prod", "aws-default", "v1.30.0", &vars).is_ok());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("My Cluster!"), "my-cluster");
        assert_eq!(sanitize_name("prod__east--1"), "prod-east-1");
        assert_eq!(sanitize_name("---"), DEFAULT_SANITIZED_NAME);
        assert_eq!(sanitize_name(""), DEFAULT_SANITIZED_NAME);
        assert_eq!(sanitize_name(&"x".repeat(80)).len(), MAX_NAME_LENGTH);

        let long = format!("{}-{}", "a".repeat(62), "b");
        let sanitized = sanitize_name(&long);
        assert!(!sanitized.ends_with('-'));
        assert!(validate_cluster_name(&sanitized).is_ok());
    }
}
