///! Clusterforge CLI
///!
///! Operator command line for Cluster API managed clusters. Drives the
///! lifecycle service in-process against the configured control plane.

mod commands;
mod output;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clusterforge_core::{AppState, ForgeConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (defaults to CLUSTERFORGE_CONFIG, /etc/clusterforge/config.toml, ./clusterforge.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Management namespace, overriding the config
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long, global = true, default_value = "table")]
    output: String,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage workload clusters
    Cluster {
        #[command(subcommand)]
        command: ClusterCommands,
    },
    /// Inspect infrastructure providers
    Provider {
        #[command(subcommand)]
        command: ProviderCommands,
    },
    /// Inspect cluster templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// List or invoke agent tools
    Tools {
        #[command(subcommand)]
        command: ToolsCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Arguments shared by create and validate
#[derive(clap::Args)]
struct ClusterSpecArgs {
    /// Cluster name
    name: String,
    /// ClusterClass to instantiate
    #[arg(short, long)]
    template: String,
    /// Kubernetes version (e.g. v1.30.8)
    #[arg(short = 'k', long = "kubernetes-version")]
    version: String,
    /// Template variable, repeatable (KEY=VALUE, VALUE parsed as JSON when possible)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,
    /// TOML or JSON file of variables; --var entries take precedence
    #[arg(short = 'f', long)]
    vars_file: Option<PathBuf>,
    /// Turn an invalid name into a valid one (lowercase, dashes) instead of failing
    #[arg(long)]
    sanitize_name: bool,
}

#[derive(Subcommand)]
enum ClusterCommands {
    /// Create a cluster
    Create(ClusterSpecArgs),
    /// Check a create request without submitting it
    Validate(ClusterSpecArgs),
    /// Delete a cluster
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Set the replica count of a node pool
    Scale {
        name: String,
        /// MachineDeployment name
        #[arg(short = 'p', long)]
        node_pool: String,
        #[arg(short, long)]
        replicas: i64,
    },
    /// Show cluster details
    Get { name: String },
    /// List clusters
    List,
    /// Print or save the workload cluster kubeconfig
    Kubeconfig {
        name: String,
        /// Write to this file (mode 0600) instead of stdout
        #[arg(short = 'w', long)]
        write: Option<PathBuf>,
    },
    /// List workload cluster nodes
    Nodes { name: String },
    /// List node pools
    Pools { name: String },
}

#[derive(Subcommand)]
enum ProviderCommands {
    List,
    Regions { provider: String },
    InstanceTypes { provider: String },
    Versions { provider: String },
}

#[derive(Subcommand)]
enum TemplateCommands {
    List,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print a sample config file
    Sample,
    /// Load and validate the effective config
    Check,
}

#[derive(Subcommand)]
enum ToolsCommands {
    List,
    /// Invoke a tool with a JSON argument record
    Call {
        name: String,
        #[arg(default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        report(&err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format = output::OutputFormat::from_str(&cli.output);

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = ForgeConfig::load_from_file(path)?;
            config.apply_env_overrides();
            config
        }
        None => ForgeConfig::load()?,
    };
    if let Some(namespace) = cli.namespace {
        config.control_plane.namespace = namespace;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    match cli.command {
        Commands::Config { command } => {
            commands::config::handle_config_command(command, &config, format)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "clusterforge", &mut std::io::stdout());
            Ok(())
        }
        command => {
            config.validate()?;
            let _guard = config.logging.init()?;

            let state = AppState::build(config).await;
            state.shutdown.spawn_signal_listener();

            execute(command, &state, format).await
        }
    }
}

async fn execute(command: Commands, state: &AppState, format: output::OutputFormat) -> Result<()> {
    let ctx = state.context();

    match command {
        Commands::Cluster { command } => {
            commands::cluster::handle_cluster_command(command, state, &ctx, format).await
        }
        Commands::Provider { command } => {
            commands::provider::handle_provider_command(command, state, format)
        }
        Commands::Template { command } => {
            commands::template::handle_template_command(command, state, &ctx, format).await
        }
        Commands::Tools { command } => {
            commands::tools::handle_tools_command(command, state, &ctx, format).await
        }
        Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
    }
}

/// Print an error as code plus sanitized message
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<clusterforge_common::Error>() {
        Some(e) => output::print_error(&format!("{}: {}", e.code(), e.safe_message())),
        None => output::print_error(&clusterforge_common::error::sanitize_message(&format!(
            "{:#}",
            err
        ))),
    }
}
