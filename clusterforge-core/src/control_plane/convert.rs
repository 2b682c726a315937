//! Conversions between Cluster API objects and facade records

use super::{
    ClusterRecord, NewCluster, NodePoolRecord, ObjectRef, TemplateRecord, CLUSTER_NAME_LABEL,
};
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub(crate) const CAPI_GROUP: &str = "cluster.x-k8s.io";
pub(crate) const CAPI_VERSION: &str = "v1beta1";

fn capi_resource(kind: &str) -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind {
        group: CAPI_GROUP.to_string(),
        version: CAPI_VERSION.to_string(),
        kind: kind.to_string(),
    })
}

pub(crate) fn cluster_resource() -> ApiResource {
    capi_resource("Cluster")
}

pub(crate) fn machine_deployment_resource() -> ApiResource {
    capi_resource("MachineDeployment")
}

pub(crate) fn cluster_class_resource() -> ApiResource {
    capi_resource("ClusterClass")
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn bool_at(value: &Value, pointer: &str) -> Option<bool> {
    value.pointer(pointer).and_then(Value::as_bool)
}

fn count_at(value: &Value, pointer: &str) -> u32 {
    value
        .pointer(pointer)
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// Read a CAPI `Cluster`, accepting both v1beta1 and v1beta2 field layouts
pub fn cluster_from_object(obj: &DynamicObject) -> ClusterRecord {
    let data = &obj.data;
    let meta = &obj.metadata;

    let class = str_at(data, "/spec/topology/class")
        .or_else(|| str_at(data, "/spec/topology/classRef/name"));

    let control_plane_ready = bool_at(data, "/status/controlPlaneReady")
        .or_else(|| bool_at(data, "/status/initialization/controlPlaneInitialized"))
        .unwrap_or(false);
    let infrastructure_ready = bool_at(data, "/status/infrastructureReady")
        .or_else(|| bool_at(data, "/status/initialization/infrastructureProvisioned"))
        .unwrap_or(false);

    let infrastructure_ref = data.pointer("/spec/infrastructureRef").and_then(|r| {
        Some(ObjectRef {
            api_version: owned(str_at(r, "/apiVersion").or_else(|| str_at(r, "/apiGroup")))
                .unwrap_or_default(),
            kind: str_at(r, "/kind")?.to_string(),
            name: str_at(r, "/name")?.to_string(),
            namespace: owned(str_at(r, "/namespace")),
        })
    });

    let variables = data
        .pointer("/spec/topology/variables")
        .and_then(Value::as_array)
        .map(|vars| {
            vars.iter()
                .filter_map(|v| Some((str_at(v, "/name")?.to_string(), v.get("value")?.clone())))
                .collect()
        })
        .unwrap_or_default();

    ClusterRecord {
        name: meta.name.clone().unwrap_or_default(),
        namespace: meta.namespace.clone().unwrap_or_default(),
        class: owned(class),
        version: owned(str_at(data, "/spec/topology/version")),
        phase: owned(str_at(data, "/status/phase")),
        control_plane_ready,
        infrastructure_ready,
        infrastructure_ref,
        variables,
        labels: meta.labels.clone().unwrap_or_default(),
        annotations: meta.annotations.clone().unwrap_or_default(),
        created_at: meta.creation_timestamp.as_ref().map(|t| t.0),
        deletion_requested: meta.deletion_timestamp.is_some(),
        failure_message: owned(str_at(data, "/status/failureMessage")),
    }
}

/// Build the topology-based `Cluster` object submitted on create
pub fn cluster_to_object(namespace: &str, cluster: &NewCluster) -> DynamicObject {
    let variables: Vec<Value> = cluster
        .variables
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();

    let mut topology = json!({
        "class": cluster.class,
        "version": cluster.version,
    });
    if !variables.is_empty() {
        topology["variables"] = Value::Array(variables);
    }
    if let Some(workers) = &cluster.workers {
        topology["workers"] = json!({
            "machineDeployments": [{
                "class": workers.class,
                "name": workers.name,
                "replicas": workers.replicas,
            }]
        });
    }

    let mut obj = DynamicObject::new(&cluster.name, &cluster_resource())
        .within(namespace)
        .data(json!({ "spec": { "topology": topology } }));
    if !cluster.labels.is_empty() {
        obj.metadata.labels = Some(cluster.labels.clone());
    }
    obj
}

/// Read a `MachineDeployment` as a node pool
pub fn node_pool_from_object(obj: &DynamicObject) -> NodePoolRecord {
    let data = &obj.data;
    let meta = &obj.metadata;

    let cluster = str_at(data, "/spec/clusterName")
        .map(str::to_string)
        .or_else(|| {
            meta.labels
                .as_ref()
                .and_then(|l| l.get(CLUSTER_NAME_LABEL))
                .cloned()
        })
        .unwrap_or_default();

    NodePoolRecord {
        name: meta.name.clone().unwrap_or_default(),
        namespace: meta.namespace.clone().unwrap_or_default(),
        cluster,
        replicas: count_at(data, "/spec/replicas"),
        ready_replicas: count_at(data, "/status/readyReplicas"),
        updated_replicas: count_at(data, "/status/updatedReplicas"),
        available_replicas: count_at(data, "/status/availableReplicas"),
        phase: owned(str_at(data, "/status/phase")),
    }
}

/// True when the object carries the cluster-name label for `cluster`
pub(crate) fn labelled_for_cluster(labels: Option<&BTreeMap<String, String>>, cluster: &str) -> bool {
    labels
        .and_then(|l| l.get(CLUSTER_NAME_LABEL))
        .is_some_and(|v| v == cluster)
}

/// Read a `ClusterClass` as a template
pub fn template_from_object(obj: &DynamicObject) -> TemplateRecord {
    let variables = obj
        .data
        .pointer("/spec/variables")
        .and_then(Value::as_array)
        .map(|vars| {
            vars.iter()
                .filter_map(|v| str_at(v, "/name").map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    TemplateRecord {
        name: obj.metadata.name.clone().unwrap_or_default(),
        namespace: obj.metadata.namespace.clone().unwrap_or_default(),
        variables,
        created_at: obj.metadata.creation_timestamp.as_ref().map(|t| t.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::WorkerPool;

    fn object(value: Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_cluster_v1beta1() {
        let obj = object(json!({
            "apiVersion": "cluster.x-k8s.io/v1beta1",
            "kind": "Cluster",
            "metadata": {
                "name": "prod-1",
                "namespace": "fleet",
                "creationTimestamp": "2024-05-01T10:00:00Z",
                "labels": { "clusterforge.io/provider": "aws" }
            },
            "spec": {
                "infrastructureRef": {
                    "apiVersion": "infrastructure.cluster.x-k8s.io/v1beta2",
                    "kind": "AWSCluster",
                    "name": "prod-1-abcde"
                },
                "topology": {
                    "class": "aws-default",
                    "version": "v1.29.2",
                    "variables": [
                        { "name": "region", "value": "eu-west-1" },
                        { "name": "nodeCount", "value": 3 }
                    ]
                }
            },
            "status": {
                "phase": "Provisioned",
                "controlPlaneReady": true,
                "infrastructureReady": true
            }
        }));

        let record = cluster_from_object(&obj);
        assert_eq!(record.name, "prod-1");
        assert_eq!(record.namespace, "fleet");
        assert_eq!(record.class.as_deref(), Some("aws-default"));
        assert_eq!(record.version.as_deref(), Some("v1.29.2"));
        assert_eq!(record.phase.as_deref(), Some("Provisioned"));
        assert!(record.control_plane_ready);
        assert!(record.infrastructure_ready);
        assert_eq!(record.infrastructure_ref.as_ref().unwrap().kind, "AWSCluster");
        assert_eq!(record.variables.get("region"), Some(&json!("eu-west-1")));
        assert_eq!(record.variables.get("nodeCount"), Some(&json!(3)));
        assert!(record.created_at.is_some());
        assert!(!record.deletion_requested);
    }

    #[test]
    fn test_cluster_v1beta2_and_empty_status() {
        let obj = object(json!({
            "apiVersion": "cluster.x-k8s.io/v1beta2",
            "kind": "Cluster",
            "metadata": { "name": "edge", "namespace": "default" },
            "spec": {
                "topology": { "classRef": { "name": "docker-quick" }, "version": "v1.30.0" }
            },
            "status": {
                "phase": "",
                "initialization": { "controlPlaneInitialized": true }
            }
        }));

        let record = cluster_from_object(&obj);
        assert_eq!(record.class.as_deref(), Some("docker-quick"));
        assert_eq!(record.phase, None);
        assert!(record.control_plane_ready);
        assert!(!record.infrastructure_ready);
        assert!(record.infrastructure_ref.is_none());
    }

    #[test]
    fn test_cluster_to_object() {
        let mut variables = BTreeMap::new();
        variables.insert("region".to_string(), json!("us-west-2"));
        let mut labels = BTreeMap::new();
        labels.insert("clusterforge.io/provider".to_string(), "aws".to_string());

        let obj = cluster_to_object(
            "fleet",
            &NewCluster {
                name: "demo".to_string(),
                class: "aws-default".to_string(),
                version: "v1.29.0".to_string(),
                variables,
                labels,
                workers: Some(WorkerPool {
                    class: "default-worker".to_string(),
                    name: "md-0".to_string(),
                    replicas: 3,
                }),
            },
        );

        assert_eq!(obj.metadata.name.as_deref(), Some("demo"));
        assert_eq!(obj.metadata.namespace.as_deref(), Some("fleet"));
        assert_eq!(obj.types.as_ref().unwrap().kind, "Cluster");
        assert_eq!(
            obj.data.pointer("/spec/topology/variables/0/name"),
            Some(&json!("region"))
        );
        assert_eq!(
            obj.data.pointer("/spec/topology/workers/machineDeployments/0/replicas"),
            Some(&json!(3))
        );
        assert_eq!(
            obj.metadata.labels.unwrap().get("clusterforge.io/provider"),
            Some(&"aws".to_string())
        );
    }

    #[test]
    fn test_node_pool_from_object() {
        let obj = object(json!({
            "apiVersion": "cluster.x-k8s.io/v1beta1",
            "kind": "MachineDeployment",
            "metadata": {
                "name": "prod-1-md-0",
                "namespace": "fleet",
                "labels": { "cluster.x-k8s.io/cluster-name": "prod-1" }
            },
            "spec": { "replicas": 4 },
            "status": { "readyReplicas": 3, "updatedReplicas": 4, "phase": "ScalingUp" }
        }));

        let pool = node_pool_from_object(&obj);
        assert_eq!(pool.cluster, "prod-1");
        assert_eq!(pool.replicas, 4);
        assert_eq!(pool.ready_replicas, 3);
        assert_eq!(pool.updated_replicas, 4);
        assert_eq!(pool.available_replicas, 0);
        assert_eq!(pool.phase.as_deref(), Some("ScalingUp"));
        assert!(labelled_for_cluster(obj.metadata.labels.as_ref(), "prod-1"));
        assert!(!labelled_for_cluster(obj.metadata.labels.as_ref(), "prod-2"));
    }

    #[test]
    fn test_template_from_object() {
        let obj = object(json!({
            "apiVersion": "cluster.x-k8s.io/v1beta1",
            "kind": "ClusterClass",
            "metadata": { "name": "aws-default", "namespace": "fleet" },
            "spec": { "variables": [ { "name": "region" }, { "name": "instanceType" } ] }
        }));

        let template = template_from_object(&obj);
        assert_eq!(template.name, "aws-default");
        assert_eq!(template.variables, vec!["region", "instanceType"]);
    }
}
