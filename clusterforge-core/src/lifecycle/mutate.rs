use super::wait::{poll_until, WaitOutcome, CREATE_POLL, DELETE_POLL};
use super::{ClusterService, CreateClusterRequest, ScaleClusterRequest};
use crate::context::OperationContext;
use crate::control_plane::{
    ClusterRecord, NewCluster, TemplateRecord, WorkerPool, MANAGED_BY_LABEL, MANAGED_BY_VALUE,
    PROVIDER_LABEL,
};
use crate::provider::{CloudProvider, Provider, PROVIDER_VARIABLE};
use crate::validation;
use clusterforge_common::{
    ClusterPhase, CreateClusterResult, DeleteClusterResult, DeleteStatus, Error, ErrorCode,
    Result, ScaleClusterResult, ScaleStatus, Variables,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Variable naming the MachineDeployment class for the initial worker pool
const WORKER_CLASS_VARIABLE: &str = "workerClass";
const NODE_COUNT_VARIABLE: &str = "nodeCount";
const DEFAULT_WORKER_CLASS: &str = "default-worker";
const DEFAULT_WORKER_POOL: &str = "md-0";

/// Variables consumed here and never forwarded to the topology
const LOCAL_VARIABLES: &[&str] = &[PROVIDER_VARIABLE, WORKER_CLASS_VARIABLE];

impl ClusterService {
    /// Validate a create request and resolve its provider
    pub(super) fn check_create_request(&self, request: &CreateClusterRequest) -> Result<&Provider> {
        validation::validate_create_request(
            &request.name,
            &request.template,
            &request.version,
            &request.variables,
        )?;

        let provider = self
            .providers
            .resolve(&request.variables, &request.template)?;
        provider.validate_cluster_config(&request.variables)?;

        Ok(provider)
    }

    /// Submit a new cluster and wait briefly for the control plane to report a phase
    pub async fn create_cluster(
        &self,
        ctx: &OperationContext,
        request: CreateClusterRequest,
    ) -> Result<CreateClusterResult> {
        let ctx = ctx.with_timeout(self.timeouts.create());
        let request = request.normalized();
        self.observe("create_cluster", Some(&request.name), self.do_create(&ctx, &request))
            .await
    }

    async fn do_create(
        &self,
        ctx: &OperationContext,
        request: &CreateClusterRequest,
    ) -> Result<CreateClusterResult> {
        let provider = self.check_create_request(request)?;

        match self.control_plane.get_cluster(ctx, &request.name).await {
            Ok(_) => return Err(Error::already_exists("cluster", &request.name)),
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e),
        }

        let template = self.control_plane.get_template(ctx, &request.template).await?;

        let new_cluster = build_cluster(request, &template, provider)?;
        self.control_plane.create_cluster(ctx, &new_cluster).await?;
        info!(
            cluster = %request.name,
            provider = provider.name(),
            template = %request.template,
            "Cluster creation submitted"
        );

        let mut result = CreateClusterResult {
            name: request.name.clone(),
            namespace: self.control_plane.namespace().to_string(),
            provider: provider.name().to_string(),
            template: request.template.clone(),
            version: request.version.clone(),
            phase: None,
            wait_timed_out: false,
            message: String::new(),
        };

        let waited = poll_until(ctx, "create_cluster", CREATE_POLL, move || async move {
            match self.control_plane.get_cluster(ctx, &request.name).await {
                Ok(record) if record.phase.is_some() => Ok(Some(record)),
                Ok(_) => Ok(None),
                // the new record may not be readable yet
                Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await;

        match waited {
            Ok(WaitOutcome::Satisfied(record)) => {
                let reported = record.phase.as_deref().unwrap_or_default();
                let phase = ClusterPhase::from_reported(reported);
                result.phase = Some(phase);
                result.message = match phase {
                    ClusterPhase::Failed => failure_diagnosis(provider, &record),
                    p if p.is_terminal() => format!("cluster already reports phase {}", reported),
                    _ => format!("cluster creation initiated, phase: {}", reported),
                };
            }
            Ok(WaitOutcome::CeilingReached { checks }) => {
                debug!(cluster = %request.name, checks, "No phase reported before wait ceiling");
                result.wait_timed_out = true;
                result.message = format!(
                    "cluster creation submitted; no phase reported within {}s",
                    CREATE_POLL.ceiling.as_secs()
                );
            }
            Err(e) if e.code() == ErrorCode::Canceled => return Err(e),
            Err(e) if e.code() == ErrorCode::Timeout => {
                result.wait_timed_out = true;
                result.message =
                    "cluster creation submitted; request deadline reached before a phase was reported"
                        .to_string();
            }
            Err(e) => {
                warn!(
                    cluster = %request.name,
                    code = e.code().as_str(),
                    error = %e.safe_message(),
                    "Status check after create failed"
                );
                result.message = format!(
                    "cluster creation submitted; status check failed: {}",
                    e.safe_message()
                );
            }
        }

        Ok(result)
    }

    /// Request deletion and wait for the cluster to disappear
    pub async fn delete_cluster(
        &self,
        ctx: &OperationContext,
        name: &str,
    ) -> Result<DeleteClusterResult> {
        let ctx = ctx.with_timeout(self.timeouts.delete());
        self.observe("delete_cluster", Some(name), self.do_delete(&ctx, name))
            .await
    }

    async fn do_delete(&self, ctx: &OperationContext, name: &str) -> Result<DeleteClusterResult> {
        validation::validate_cluster_name(name)?;

        self.control_plane.get_cluster(ctx, name).await?;

        match self.control_plane.delete_cluster(ctx, name).await {
            Ok(()) => info!(cluster = %name, "Cluster deletion submitted"),
            Err(e) if e.code() == ErrorCode::NotFound => {
                return Ok(deleted(name));
            }
            Err(e) => return Err(e),
        }

        let waited = poll_until(ctx, "delete_cluster", DELETE_POLL, move || async move {
            match self.control_plane.get_cluster(ctx, name).await {
                Ok(_) => Ok(None),
                Err(e) if e.code() == ErrorCode::NotFound => Ok(Some(())),
                Err(e) => Err(e),
            }
        })
        .await;

        let message = match waited {
            Ok(WaitOutcome::Satisfied(())) => return Ok(deleted(name)),
            Ok(WaitOutcome::CeilingReached { .. }) => format!(
                "deletion of cluster '{}' initiated; still in progress after {}s",
                name,
                DELETE_POLL.ceiling.as_secs()
            ),
            Err(e) if e.code() == ErrorCode::Canceled => return Err(e),
            Err(e) if e.code() == ErrorCode::Timeout => format!(
                "deletion of cluster '{}' initiated; still in progress at request deadline",
                name
            ),
            Err(e) => {
                warn!(
                    cluster = %name,
                    code = e.code().as_str(),
                    error = %e.safe_message(),
                    "Status check after delete failed"
                );
                format!(
                    "deletion of cluster '{}' initiated; status check failed: {}",
                    name,
                    e.safe_message()
                )
            }
        };

        Ok(DeleteClusterResult {
            name: name.to_string(),
            status: DeleteStatus::Deleting,
            message,
        })
    }

    /// Set the desired replica count of a node pool
    ///
    /// A request matching the current count is a no-op.
    pub async fn scale_cluster(
        &self,
        ctx: &OperationContext,
        request: ScaleClusterRequest,
    ) -> Result<ScaleClusterResult> {
        let ctx = ctx.with_timeout(self.timeouts.scale());
        self.observe("scale_cluster", Some(&request.cluster), self.do_scale(&ctx, &request))
            .await
    }

    async fn do_scale(
        &self,
        ctx: &OperationContext,
        request: &ScaleClusterRequest,
    ) -> Result<ScaleClusterResult> {
        let mut errors = Vec::new();
        errors.extend(validation::validate_cluster_name(&request.cluster).err());
        errors.extend(validation::validate_node_pool_name(&request.node_pool).err());
        errors.extend(validation::validate_replicas(request.replicas).err());
        validation::collect(errors)?;

        let target = u32::try_from(request.replicas)
            .map_err(|_| Error::invalid_input("replicas", "replicas out of range"))?;

        let pool = self
            .control_plane
            .get_node_pool(ctx, &request.cluster, &request.node_pool)
            .await?;

        if pool.replicas == target {
            debug!(
                cluster = %request.cluster,
                node_pool = %request.node_pool,
                replicas = target,
                "Node pool already at requested size"
            );
            return Ok(ScaleClusterResult {
                cluster: request.cluster.clone(),
                node_pool: request.node_pool.clone(),
                old_replicas: target,
                new_replicas: target,
                status: ScaleStatus::Ready,
                message: format!("node pool already has {} replicas", target),
            });
        }

        let updated = self
            .control_plane
            .update_node_pool_replicas(ctx, &request.cluster, &request.node_pool, target)
            .await?;

        info!(
            cluster = %request.cluster,
            node_pool = %request.node_pool,
            old_replicas = pool.replicas,
            new_replicas = updated.replicas,
            "Node pool scaling initiated"
        );

        Ok(ScaleClusterResult {
            cluster: request.cluster.clone(),
            node_pool: request.node_pool.clone(),
            old_replicas: pool.replicas,
            new_replicas: updated.replicas,
            status: ScaleStatus::Scaling,
            message: format!(
                "scaling node pool from {} to {} replicas",
                pool.replicas, updated.replicas
            ),
        })
    }
}

fn deleted(name: &str) -> DeleteClusterResult {
    DeleteClusterResult {
        name: name.to_string(),
        status: DeleteStatus::Deleted,
        message: format!("cluster '{}' deleted", name),
    }
}

/// Explain a Failed phase as precisely as the record allows
fn failure_diagnosis(provider: &Provider, record: &ClusterRecord) -> String {
    let mut message = "cluster creation initiated but the cluster reports phase Failed".to_string();
    if let Some(reason) = &record.failure_message {
        message.push_str(&format!(": {}", reason));
    }
    if let Err(e) = provider.validate_infrastructure_readiness(record) {
        message.push_str(&format!(" ({})", e.safe_message()));
    }
    message
}

/// Build the declarative record for a validated request
fn build_cluster(
    request: &CreateClusterRequest,
    template: &TemplateRecord,
    provider: &Provider,
) -> Result<NewCluster> {
    let workers = match request.variables.get(NODE_COUNT_VARIABLE) {
        Some(value) => {
            let replicas = value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    Error::invalid_input(NODE_COUNT_VARIABLE, "nodeCount must be an integer")
                })?;
            let class = request
                .variables
                .get(WORKER_CLASS_VARIABLE)
                .and_then(|v| v.as_str())
                .unwrap_or(DEFAULT_WORKER_CLASS);
            Some(WorkerPool {
                class: class.to_string(),
                name: DEFAULT_WORKER_POOL.to_string(),
                replicas,
            })
        }
        None => None,
    };

    let variables = topology_variables(&request.variables, template);

    let mut labels = BTreeMap::new();
    labels.insert(PROVIDER_LABEL.to_string(), provider.name().to_string());
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());

    Ok(NewCluster {
        name: request.name.clone(),
        class: request.template.clone(),
        version: request.version.clone(),
        variables,
        labels,
        workers,
    })
}

/// Variables forwarded to the topology
///
/// Local keys are dropped. When the template declares variables, only those
/// are forwarded since the control plane rejects undeclared ones.
fn topology_variables(variables: &Variables, template: &TemplateRecord) -> Variables {
    variables
        .iter()
        .filter(|(key, _)| !LOCAL_VARIABLES.contains(&key.as_str()))
        .filter(|(key, _)| {
            let declared = template.variables.is_empty() || template.variables.contains(key);
            if !declared {
                debug!(variable = %key, template = %template.name, "Dropping undeclared variable");
            }
            declared
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::AwsProvider;
    use serde_json::json;

    fn request(variables: Variables) -> CreateClusterRequest {
        CreateClusterRequest {
            name: "demo".to_string(),
            template: "aws-quickstart".to_string(),
            version: "v1.30.8".to_string(),
            variables,
            auto_correct_name: false,
        }
    }

    fn template(declared: &[&str]) -> TemplateRecord {
        TemplateRecord {
            name: "aws-quickstart".to_string(),
            namespace: "default".to_string(),
            variables: declared.iter().map(|s| s.to_string()).collect(),
            created_at: None,
        }
    }

    #[test]
    fn test_build_cluster_workers_and_labels() {
        let mut vars = Variables::new();
        vars.insert("provider".to_string(), json!("aws"));
        vars.insert("nodeCount".to_string(), json!(3));
        vars.insert("region".to_string(), json!("us-west-2"));

        let provider = Provider::Aws(AwsProvider::new("us-east-1"));
        let cluster = build_cluster(&request(vars), &template(&[]), &provider).unwrap();

        let workers = cluster.workers.unwrap();
        assert_eq!(workers.replicas, 3);
        assert_eq!(workers.class, DEFAULT_WORKER_CLASS);
        assert_eq!(workers.name, DEFAULT_WORKER_POOL);
        assert!(!cluster.variables.contains_key("provider"));
        assert_eq!(cluster.variables.get("region"), Some(&json!("us-west-2")));
        assert_eq!(cluster.labels.get(PROVIDER_LABEL).map(String::as_str), Some("aws"));
    }

    #[test]
    fn test_undeclared_variables_dropped() {
        let mut vars = Variables::new();
        vars.insert("region".to_string(), json!("us-west-2"));
        vars.insert("sshKeyName".to_string(), json!("ops"));

        let forwarded = topology_variables(&vars, &template(&["region"]));
        assert_eq!(forwarded.len(), 1);
        assert!(forwarded.contains_key("region"));
    }

    #[test]
    fn test_no_workers_without_node_count() {
        let provider = Provider::Aws(AwsProvider::new("us-east-1"));
        let cluster = build_cluster(&request(Variables::new()), &template(&[]), &provider).unwrap();
        assert!(cluster.workers.is_none());
    }
}
