//! kube-rs implementation of the control-plane facade

use super::convert::{
    cluster_class_resource, cluster_from_object, cluster_resource, cluster_to_object,
    labelled_for_cluster, machine_deployment_resource, node_pool_from_object,
    template_from_object,
};
use super::{
    ClusterRecord, ControlPlaneClient, NewCluster, NodePoolRecord, TemplateRecord,
    CLUSTER_NAME_LABEL,
};
use crate::config::ControlPlaneConfig;
use crate::context::OperationContext;
use async_trait::async_trait;
use clusterforge_common::{Error, ErrorCode, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::json;
use tracing::debug;

/// Kubeconfig secret key written by CAPI
const KUBECONFIG_SECRET_KEY: &str = "value";

/// Map a kube-rs error onto the error taxonomy
pub fn classify_kube_error(err: kube::Error, resource: &str, name: &str) -> Error {
    let classified = match &err {
        kube::Error::Api(ae) => match ae.code {
            404 => Error::not_found(resource, name),
            409 => Error::already_exists(resource, name),
            401 => Error::unauthorized(format!(
                "control plane rejected credentials while accessing {} '{}'",
                resource, name
            )),
            403 => Error::forbidden(format!("access to {} '{}' is forbidden", resource, name)),
            422 => Error::new(
                ErrorCode::ValidationFailed,
                format!("control plane rejected {} '{}': {}", resource, name, ae.message),
            ),
            429 => Error::new(
                ErrorCode::ResourceExhausted,
                "control plane is throttling requests",
            ),
            code => Error::backend(format!(
                "control plane returned {} for {} '{}': {}",
                code, resource, name, ae.message
            )),
        },
        kube::Error::Auth(_) => Error::unauthorized("failed to authenticate to the control plane"),
        kube::Error::SerdeError(_) => Error::backend(format!(
            "control plane returned an unreadable {} '{}'",
            resource, name
        )),
        _ => Error::backend(format!(
            "control plane request for {} '{}' failed",
            resource, name
        )),
    };

    classified.with_detail("resource", resource).with_source(err)
}

/// Facade backed by a live management cluster
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
    namespace: String,
}

impl std::fmt::Debug for KubeControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeControlPlane")
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl KubeControlPlane {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Build a client from configuration
    ///
    /// An explicit API server and credential take precedence over a kubeconfig
    /// file, which takes precedence over in-cluster/default discovery.
    pub async fn connect(config: &ControlPlaneConfig) -> Result<Self> {
        let options = KubeConfigOptions {
            context: config.context.clone(),
            ..Default::default()
        };

        let kube_config = match (&config.api_server, &config.api_token, &config.kubeconfig) {
            (Some(server), Some(token), _) => {
                let kubeconfig = token_kubeconfig(server, token)?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| connect_error("invalid API server settings", e))?
            }
            (_, _, Some(path)) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|e| connect_error("failed to read kubeconfig", e))?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| connect_error("invalid kubeconfig", e))?
            }
            _ if config.context.is_some() => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| connect_error("invalid kubeconfig", e))?,
            _ => Config::infer()
                .await
                .map_err(|e| connect_error("no control-plane configuration found", e))?,
        };

        let client =
            Client::try_from(kube_config).map_err(|e| connect_error("failed to create client", e))?;

        debug!(namespace = %config.namespace, "Control-plane client created");
        Ok(Self::new(client, config.namespace.clone()))
    }

    fn clusters(&self) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, &cluster_resource())
    }

    fn machine_deployments(&self) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.client.clone(),
            &self.namespace,
            &machine_deployment_resource(),
        )
    }

    fn cluster_classes(&self) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, &cluster_class_resource())
    }

    fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

fn connect_error(context: &str, err: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::unavailable(format!("control plane unavailable: {}", context)).with_source(err)
}

/// In-memory kubeconfig for a bearer-credential connection
fn token_kubeconfig(server: &str, token: &str) -> Result<Kubeconfig> {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": "control-plane", "cluster": { "server": server } }],
        "users": [{ "name": "clusterforge", "user": { "token": token } }],
        "contexts": [{
            "name": "clusterforge",
            "context": { "cluster": "control-plane", "user": "clusterforge" }
        }],
        "current-context": "clusterforge",
    }))
    .map_err(|e| Error::internal("failed to assemble control-plane credentials").with_source(e))
}

#[async_trait]
impl ControlPlaneClient for KubeControlPlane {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get_cluster(&self, ctx: &OperationContext, name: &str) -> Result<ClusterRecord> {
        ctx.run("get_cluster", async {
            let obj = self
                .clusters()
                .get(name)
                .await
                .map_err(|e| classify_kube_error(e, "cluster", name))?;
            Ok(cluster_from_object(&obj))
        })
        .await
    }

    async fn list_clusters(&self, ctx: &OperationContext) -> Result<Vec<ClusterRecord>> {
        ctx.run("list_clusters", async {
            let list = self
                .clusters()
                .list(&ListParams::default())
                .await
                .map_err(|e| classify_kube_error(e, "cluster", "*"))?;
            Ok(list.items.iter().map(cluster_from_object).collect())
        })
        .await
    }

    async fn create_cluster(
        &self,
        ctx: &OperationContext,
        cluster: &NewCluster,
    ) -> Result<ClusterRecord> {
        ctx.run("create_cluster", async {
            let obj = cluster_to_object(&self.namespace, cluster);
            let created = self
                .clusters()
                .create(&PostParams::default(), &obj)
                .await
                .map_err(|e| classify_kube_error(e, "cluster", &cluster.name))?;
            Ok(cluster_from_object(&created))
        })
        .await
    }

    async fn delete_cluster(&self, ctx: &OperationContext, name: &str) -> Result<()> {
        ctx.run("delete_cluster", async {
            self.clusters()
                .delete(name, &DeleteParams::background())
                .await
                .map_err(|e| classify_kube_error(e, "cluster", name))?;
            Ok(())
        })
        .await
    }

    async fn get_template(&self, ctx: &OperationContext, name: &str) -> Result<TemplateRecord> {
        ctx.run("get_template", async {
            let obj = self
                .cluster_classes()
                .get(name)
                .await
                .map_err(|e| classify_kube_error(e, "cluster template", name))?;
            Ok(template_from_object(&obj))
        })
        .await
    }

    async fn list_templates(&self, ctx: &OperationContext) -> Result<Vec<TemplateRecord>> {
        ctx.run("list_templates", async {
            let list = self
                .cluster_classes()
                .list(&ListParams::default())
                .await
                .map_err(|e| classify_kube_error(e, "cluster template", "*"))?;
            Ok(list.items.iter().map(template_from_object).collect())
        })
        .await
    }

    async fn get_node_pool(
        &self,
        ctx: &OperationContext,
        cluster: &str,
        name: &str,
    ) -> Result<NodePoolRecord> {
        ctx.run("get_node_pool", async {
            let obj = self
                .machine_deployments()
                .get(name)
                .await
                .map_err(|e| classify_kube_error(e, "node pool", name))?;

            if !labelled_for_cluster(obj.metadata.labels.as_ref(), cluster) {
                return Err(Error::not_found("node pool", name).with_detail("cluster", cluster));
            }
            Ok(node_pool_from_object(&obj))
        })
        .await
    }

    async fn list_node_pools(
        &self,
        ctx: &OperationContext,
        cluster: &str,
    ) -> Result<Vec<NodePoolRecord>> {
        ctx.run("list_node_pools", async {
            let params =
                ListParams::default().labels(&format!("{}={}", CLUSTER_NAME_LABEL, cluster));
            let list = self
                .machine_deployments()
                .list(&params)
                .await
                .map_err(|e| classify_kube_error(e, "node pool", "*"))?;
            Ok(list.items.iter().map(node_pool_from_object).collect())
        })
        .await
    }

    async fn update_node_pool_replicas(
        &self,
        ctx: &OperationContext,
        cluster: &str,
        name: &str,
        replicas: u32,
    ) -> Result<NodePoolRecord> {
        ctx.run("update_node_pool", async {
            let patch = json!({ "spec": { "replicas": replicas } });
            let obj = self
                .machine_deployments()
                .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
                .map_err(|e| classify_kube_error(e, "node pool", name))?;

            debug!(cluster = %cluster, pool = %name, replicas, "Patched MachineDeployment replicas");
            Ok(node_pool_from_object(&obj))
        })
        .await
    }

    async fn get_kubeconfig(&self, ctx: &OperationContext, cluster: &str) -> Result<Vec<u8>> {
        ctx.run("get_kubeconfig", async {
            let secret_name = format!("{}-kubeconfig", cluster);
            let secret = self
                .secrets()
                .get(&secret_name)
                .await
                .map_err(|e| classify_kube_error(e, "kubeconfig", cluster))?;

            Ok(secret
                .data
                .and_then(|mut data| data.remove(KUBECONFIG_SECRET_KEY))
                .map(|bytes| bytes.0)
                .unwrap_or_default())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("status {}", code),
            reason: "Test".to_string(),
            code,
        })
    }

    #[test]
    fn test_classify_status_codes() {
        let cases = [
            (404, ErrorCode::NotFound),
            (409, ErrorCode::AlreadyExists),
            (401, ErrorCode::Unauthorized),
            (403, ErrorCode::Forbidden),
            (422, ErrorCode::ValidationFailed),
            (429, ErrorCode::ResourceExhausted),
            (500, ErrorCode::BackendApi),
            (503, ErrorCode::BackendApi),
        ];

        for (status, expected) in cases {
            let err = classify_kube_error(api_error(status), "cluster", "demo");
            assert_eq!(err.code(), expected, "status {}", status);
            assert_eq!(err.detail("resource"), Some(&json!("cluster")));
        }
    }

    #[test]
    fn test_not_found_message() {
        let err = classify_kube_error(api_error(404), "kubeconfig", "demo");
        assert_eq!(err.message(), "kubeconfig 'demo' not found");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_token_kubeconfig() {
        let kubeconfig = token_kubeconfig("https://10.0.0.1:6443", "abc").unwrap();
        assert_eq!(kubeconfig.current_context.as_deref(), Some("clusterforge"));
        assert_eq!(kubeconfig.clusters.len(), 1);
        assert_eq!(kubeconfig.auth_infos.len(), 1);
    }
}
