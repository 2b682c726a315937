///! Tool dispatch
///!
///! Maps a tool name plus a JSON argument record onto a lifecycle operation.
///! Success yields the operation's payload as JSON; failure yields the
///! sanitized [`ErrorResponse`] that is safe to hand back to the caller.

use crate::context::OperationContext;
use crate::error::ErrorResponse;
use crate::lifecycle::{ClusterService, CreateClusterRequest, ScaleClusterRequest};
use clusterforge_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Argument accepted by a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolArgument {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// Published description of one tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: Vec<ToolArgument>,
}

const fn arg(name: &'static str, required: bool, description: &'static str) -> ToolArgument {
    ToolArgument {
        name,
        required,
        description,
    }
}

const NAME_ARG: ToolArgument = arg("name", true, "Cluster name");
const PROVIDER_ARG: ToolArgument = arg("provider", true, "Provider name (aws, azure, gcp, docker)");

fn create_args() -> Vec<ToolArgument> {
    vec![
        NAME_ARG,
        arg("template", true, "ClusterClass to instantiate"),
        arg("version", true, "Kubernetes version, e.g. v1.30.8"),
        arg("variables", false, "Provider variables (region, instanceType, nodeCount, ...)"),
        arg("auto_correct_name", false, "Sanitize an invalid name instead of rejecting it"),
    ]
}

/// Every tool this service exposes
pub fn definitions() -> Vec<ToolInfo> {
    vec![
        ToolInfo {
            name: "create_cluster",
            description: "Create a workload cluster from a template; returns once a phase is reported",
            arguments: create_args(),
        },
        ToolInfo {
            name: "delete_cluster",
            description: "Delete a workload cluster and wait for it to disappear",
            arguments: vec![NAME_ARG],
        },
        ToolInfo {
            name: "scale_cluster",
            description: "Set the replica count of a cluster node pool",
            arguments: vec![
                arg("cluster", true, "Cluster name"),
                arg("node_pool", true, "MachineDeployment name"),
                arg("replicas", true, "Desired replicas (0-100)"),
            ],
        },
        ToolInfo {
            name: "get_cluster",
            description: "Get a cluster with node count, node pools and provider status",
            arguments: vec![NAME_ARG],
        },
        ToolInfo {
            name: "list_clusters",
            description: "List clusters in the management namespace",
            arguments: Vec::new(),
        },
        ToolInfo {
            name: "get_cluster_kubeconfig",
            description: "Get the kubeconfig of a workload cluster",
            arguments: vec![NAME_ARG],
        },
        ToolInfo {
            name: "get_cluster_nodes",
            description: "List the nodes of a workload cluster",
            arguments: vec![NAME_ARG],
        },
        ToolInfo {
            name: "list_node_pools",
            description: "List the node pools of a cluster",
            arguments: vec![NAME_ARG],
        },
        ToolInfo {
            name: "list_templates",
            description: "List available cluster templates",
            arguments: Vec::new(),
        },
        ToolInfo {
            name: "validate_cluster_request",
            description: "Check a create request without submitting it",
            arguments: create_args(),
        },
        ToolInfo {
            name: "list_providers",
            description: "List registered infrastructure providers",
            arguments: Vec::new(),
        },
        ToolInfo {
            name: "list_regions",
            description: "List regions a provider accepts",
            arguments: vec![PROVIDER_ARG],
        },
        ToolInfo {
            name: "list_instance_types",
            description: "List instance types a provider suggests",
            arguments: vec![PROVIDER_ARG],
        },
        ToolInfo {
            name: "list_supported_versions",
            description: "List Kubernetes versions a provider supports",
            arguments: vec![PROVIDER_ARG],
        },
    ]
}

#[derive(Debug, Deserialize)]
struct NameArgs {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProviderArgs {
    provider: String,
}

/// Invoke tool `name` with `args`
pub async fn dispatch(
    service: &ClusterService,
    ctx: &OperationContext,
    name: &str,
    args: Value,
) -> std::result::Result<Value, ErrorResponse> {
    debug!(tool = name, "Dispatching tool call");
    call(service, ctx, name, args)
        .await
        .map_err(|e| ErrorResponse::from_error(&e))
}

async fn call(
    service: &ClusterService,
    ctx: &OperationContext,
    name: &str,
    args: Value,
) -> Result<Value> {
    match name {
        "create_cluster" => {
            let request: CreateClusterRequest = decode(args)?;
            to_json(service.create_cluster(ctx, request).await?)
        }
        "delete_cluster" => {
            let args: NameArgs = decode(args)?;
            to_json(service.delete_cluster(ctx, &args.name).await?)
        }
        "scale_cluster" => {
            let request: ScaleClusterRequest = decode(args)?;
            to_json(service.scale_cluster(ctx, request).await?)
        }
        "get_cluster" => {
            let args: NameArgs = decode(args)?;
            to_json(service.get_cluster(ctx, &args.name).await?)
        }
        "list_clusters" => {
            let clusters = service.list_clusters(ctx).await?;
            Ok(json!({ "count": clusters.len(), "clusters": clusters }))
        }
        "get_cluster_kubeconfig" => {
            let args: NameArgs = decode(args)?;
            to_json(service.get_cluster_kubeconfig(ctx, &args.name).await?)
        }
        "get_cluster_nodes" => {
            let args: NameArgs = decode(args)?;
            let nodes = service.get_cluster_nodes(ctx, &args.name).await?;
            Ok(json!({ "cluster": args.name, "count": nodes.len(), "nodes": nodes }))
        }
        "list_node_pools" => {
            let args: NameArgs = decode(args)?;
            let pools = service.list_node_pools(ctx, &args.name).await?;
            Ok(json!({ "cluster": args.name, "node_pools": pools }))
        }
        "list_templates" => {
            let templates = service.list_templates(ctx).await?;
            Ok(json!({ "templates": templates }))
        }
        "validate_cluster_request" => {
            let request: CreateClusterRequest = decode(args)?;
            to_json(service.validate_cluster_request(&request)?)
        }
        "list_providers" => Ok(json!({ "providers": service.list_providers() })),
        "list_regions" => {
            let args: ProviderArgs = decode(args)?;
            let regions = service.list_regions(&args.provider)?;
            Ok(json!({ "provider": args.provider, "regions": regions }))
        }
        "list_instance_types" => {
            let args: ProviderArgs = decode(args)?;
            let types = service.list_instance_types(&args.provider)?;
            Ok(json!({ "provider": args.provider, "instance_types": types }))
        }
        "list_supported_versions" => {
            let args: ProviderArgs = decode(args)?;
            let versions = service.list_supported_versions(&args.provider)?;
            Ok(json!({ "provider": args.provider, "versions": versions }))
        }
        other => Err(Error::invalid_input("tool", format!("unknown tool '{}'", other))),
    }
}

/// Decode an argument record; a null record is treated as empty
fn decode<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| {
        let message = e.to_string();
        let field = offending_field(&message).unwrap_or("arguments").to_string();
        Error::invalid_input(field, format!("invalid arguments: {}", message))
    })
}

/// Field named by a serde message such as "missing field `name`"
fn offending_field(message: &str) -> Option<&str> {
    let start = message.find('`')? + 1;
    let len = message[start..].find('`')?;
    Some(&message[start..start + len])
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| Error::internal("failed to encode tool result").with_source(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_unique() {
        let defs = definitions();
        let mut names: Vec<_> = defs.iter().map(|d| d.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), defs.len());
        assert!(names.contains(&"scale_cluster"));
    }

    #[test]
    fn test_decode_missing_field() {
        let err = decode::<NameArgs>(json!({})).unwrap_err();
        assert_eq!(err.code(), clusterforge_common::ErrorCode::InvalidInput);
        assert_eq!(err.detail("field"), Some(&json!("name")));
    }

    #[test]
    fn test_decode_wrong_type() {
        let err = decode::<ScaleClusterRequest>(json!({
            "cluster": "demo",
            "node_pool": "md-0",
            "replicas": "three"
        }))
        .unwrap_err();
        assert_eq!(err.code(), clusterforge_common::ErrorCode::InvalidInput);
    }

    #[test]
    fn test_offending_field() {
        assert_eq!(offending_field("missing field `template`"), Some("template"));
        assert_eq!(offending_field("expected a string"), None);
    }
}
