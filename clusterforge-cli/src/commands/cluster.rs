///! Cluster lifecycle commands

use crate::output::{self, OutputFormat};
use crate::{ClusterCommands, ClusterSpecArgs};
use anyhow::{anyhow, bail, Context, Result};
use clusterforge_common::{ClusterInfo, NodeInfo, NodePoolInfo, Variables};
use clusterforge_core::{AppState, CreateClusterRequest, OperationContext, ScaleClusterRequest};
use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tabled::Tabled;

#[derive(Tabled)]
struct ClusterRow {
    name: String,
    phase: String,
    version: String,
    provider: String,
    nodes: String,
    age: String,
}

impl From<&ClusterInfo> for ClusterRow {
    fn from(cluster: &ClusterInfo) -> Self {
        Self {
            name: cluster.name.clone(),
            phase: cluster.phase.to_string(),
            version: output::or_dash(cluster.version.as_ref()),
            provider: output::or_dash(cluster.provider.as_ref()),
            nodes: output::or_dash(cluster.node_count),
            age: output::format_age(cluster.created_at),
        }
    }
}

#[derive(Tabled)]
struct NodeRow {
    name: String,
    status: String,
    roles: String,
    internal_ip: String,
    instance_type: String,
    zone: String,
    version: String,
}

impl From<&NodeInfo> for NodeRow {
    fn from(node: &NodeInfo) -> Self {
        Self {
            name: node.name.clone(),
            status: node.status.to_string(),
            roles: node.roles.join(","),
            internal_ip: output::or_dash(node.internal_ip.as_ref()),
            instance_type: output::or_dash(node.instance_type.as_ref()),
            zone: output::or_dash(node.zone.as_ref()),
            version: output::or_dash(node.kubelet_version.as_ref()),
        }
    }
}

#[derive(Tabled)]
struct PoolRow {
    name: String,
    replicas: u32,
    ready: u32,
    updated: u32,
    available: u32,
    phase: String,
}

impl From<&NodePoolInfo> for PoolRow {
    fn from(pool: &NodePoolInfo) -> Self {
        Self {
            name: pool.name.clone(),
            replicas: pool.replicas,
            ready: pool.ready_replicas,
            updated: pool.updated_replicas,
            available: pool.available_replicas,
            phase: output::or_dash(pool.phase.as_ref()),
        }
    }
}

pub async fn handle_cluster_command(
    command: ClusterCommands,
    state: &AppState,
    ctx: &OperationContext,
    format: OutputFormat,
) -> Result<()> {
    let service = &state.service;

    match command {
        ClusterCommands::Create(args) => {
            let request = create_request(args)?;
            let name = request.name.clone();

            let progress = spinner(format, format!("Creating cluster '{}'", name));
            let result = service.create_cluster(ctx, request).await;
            finish(progress);
            let result = result?;

            if format == OutputFormat::Table {
                output::print_success(&format!(
                    "Cluster '{}' submitted ({} via {})",
                    result.name, result.provider, result.template
                ));
                if result.wait_timed_out {
                    output::print_warning(&result.message);
                } else {
                    output::print_info(&result.message);
                }
            } else {
                output::print_single(&result, format)?;
            }
        }
        ClusterCommands::Validate(args) => {
            let request = create_request(args)?;
            let report = service.validate_cluster_request(&request)?;

            if format == OutputFormat::Table {
                output::print_success(&format!(
                    "Request for cluster '{}' is valid (provider: {})",
                    report.name, report.provider
                ));
            } else {
                output::print_single(&report, format)?;
            }
        }
        ClusterCommands::Delete { name, yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete cluster '{}' and all of its machines?", name))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    output::print_info("Aborted");
                    return Ok(());
                }
            }

            let progress = spinner(format, format!("Deleting cluster '{}'", name));
            let result = service.delete_cluster(ctx, &name).await;
            finish(progress);
            let result = result?;

            if format == OutputFormat::Table {
                match result.status {
                    clusterforge_common::DeleteStatus::Deleted => {
                        output::print_success(&result.message)
                    }
                    clusterforge_common::DeleteStatus::Deleting => {
                        output::print_warning(&result.message)
                    }
                }
            } else {
                output::print_single(&result, format)?;
            }
        }
        ClusterCommands::Scale {
            name,
            node_pool,
            replicas,
        } => {
            let result = service
                .scale_cluster(
                    ctx,
                    ScaleClusterRequest {
                        cluster: name,
                        node_pool,
                        replicas,
                    },
                )
                .await?;

            if format == OutputFormat::Table {
                output::print_success(&format!(
                    "{}/{}: {} ({} -> {})",
                    result.cluster,
                    result.node_pool,
                    result.status,
                    result.old_replicas,
                    result.new_replicas
                ));
            } else {
                output::print_single(&result, format)?;
            }
        }
        ClusterCommands::Get { name } => {
            let cluster = service.get_cluster(ctx, &name).await?;
            if format == OutputFormat::Table {
                print_cluster(&cluster);
            } else {
                output::print_single(&cluster, format)?;
            }
        }
        ClusterCommands::List => {
            let clusters = service.list_clusters(ctx).await?;
            output::print_list(&clusters, format, ClusterRow::from)?;
        }
        ClusterCommands::Kubeconfig { name, write } => {
            let result = service.get_cluster_kubeconfig(ctx, &name).await?;
            match write {
                Some(path) => {
                    write_private(&path, &result.kubeconfig)?;
                    output::print_success(&format!(
                        "Kubeconfig for '{}' written to {}",
                        name,
                        path.display()
                    ));
                }
                None => print!("{}", result.kubeconfig),
            }
        }
        ClusterCommands::Nodes { name } => {
            let nodes = service.get_cluster_nodes(ctx, &name).await?;
            output::print_list(&nodes, format, NodeRow::from)?;
        }
        ClusterCommands::Pools { name } => {
            let pools = service.list_node_pools(ctx, &name).await?;
            output::print_list(&pools, format, PoolRow::from)?;
        }
    }
    Ok(())
}

fn create_request(args: ClusterSpecArgs) -> Result<CreateClusterRequest> {
    let variables = parse_variables(&args.vars, args.vars_file.as_deref())?;
    Ok(CreateClusterRequest {
        name: args.name,
        template: args.template,
        version: args.version,
        variables,
        auto_correct_name: args.sanitize_name,
    })
}

/// Merge a variables file with `KEY=VALUE` entries, entries winning
fn parse_variables(entries: &[String], file: Option<&Path>) -> Result<Variables> {
    let mut variables = match file {
        Some(path) => read_variables_file(path)?,
        None => Variables::new(),
    };

    for entry in entries {
        let (key, raw) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid --var '{}': expected NAME=VALUE", entry))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid --var '{}': empty key", entry);
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        variables.insert(key.to_string(), value);
    }

    Ok(variables)
}

fn read_variables_file(path: &Path) -> Result<Variables> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read variables file {}", path.display()))?;

    if path.extension().is_some_and(|ext| ext == "json") {
        return serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", path.display()));
    }

    let table: toml::Table =
        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))?;
    Ok(serde_json::from_value(serde_json::to_value(table)?)?)
}

fn print_cluster(cluster: &ClusterInfo) {
    println!("{}", format!("Cluster {}", cluster.name).bold());
    output::print_field("Namespace", &cluster.namespace);
    output::print_field("Phase", phase_colored(cluster));
    output::print_field("Template", output::or_dash(cluster.template.as_ref()));
    output::print_field("Version", output::or_dash(cluster.version.as_ref()));
    output::print_field("Provider", output::or_dash(cluster.provider.as_ref()));
    output::print_field("Control plane ready", cluster.control_plane_ready);
    output::print_field("Infrastructure ready", cluster.infrastructure_ready);
    output::print_field("Nodes", output::or_dash(cluster.node_count));
    output::print_field("Age", output::format_age(cluster.created_at));

    if let Some(status) = &cluster.provider_status {
        println!("{}", "Provider status".bold());
        for (key, value) in status {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            output::print_field(key, value);
        }
    }

    if !cluster.node_pools.is_empty() {
        println!("{}", "Node pools".bold());
        output::print_table(cluster.node_pools.iter().map(PoolRow::from).collect());
    }
}

fn phase_colored(cluster: &ClusterInfo) -> colored::ColoredString {
    use clusterforge_common::ClusterPhase;

    let text = cluster.phase.to_string();
    match cluster.phase {
        ClusterPhase::Provisioned => text.green(),
        ClusterPhase::Failed => text.red(),
        ClusterPhase::Deleting => text.yellow(),
        _ => text.cyan(),
    }
}

fn spinner(format: OutputFormat, message: String) -> Option<ProgressBar> {
    if format != OutputFormat::Table {
        return None;
    }

    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} ({elapsed})") {
        progress.set_style(style);
    }
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(120));
    Some(progress)
}

fn finish(progress: Option<ProgressBar>) {
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
}

/// Write a credential file readable only by the owner
fn write_private(path: &Path, content: &str) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(content.as_bytes())?;
    }
    #[cfg(not(unix))]
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_variables() {
        let entries = vec![
            "region=us-west-2".to_string(),
            "nodeCount=3".to_string(),
            "spot=true".to_string(),
        ];
        let vars = parse_variables(&entries, None).unwrap();
        assert_eq!(vars.get("region"), Some(&json!("us-west-2")));
        assert_eq!(vars.get("nodeCount"), Some(&json!(3)));
        assert_eq!(vars.get("spot"), Some(&json!(true)));

        assert!(parse_variables(&["novalue".to_string()], None).is_err());
        assert!(parse_variables(&["=x".to_string()], None).is_err());
    }

    #[test]
    fn test_variables_file_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vars.toml");
        std::fs::write(&path, "region = \"eu-west-1\"\nnodeCount = 2\n").unwrap();

        let vars = parse_variables(&["nodeCount=5".to_string()], Some(&path)).unwrap();
        assert_eq!(vars.get("region"), Some(&json!("eu-west-1")));
        assert_eq!(vars.get("nodeCount"), Some(&json!(5)));
    }

    #[cfg(unix)]
    #[test]
    fn test_kubeconfig_written_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kubeconfig");
        write_private(&path, "kind: Config\n").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
