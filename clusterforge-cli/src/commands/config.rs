///! Configuration commands

use crate::output::{self, OutputFormat};
use crate::ConfigCommands;
use anyhow::Result;
use clusterforge_core::ForgeConfig;
use colored::Colorize;

pub fn handle_config_command(
    command: ConfigCommands,
    config: &ForgeConfig,
    format: OutputFormat,
) -> Result<()> {
    match command {
        ConfigCommands::Sample => {
            print!("{}", ForgeConfig::generate_sample());
        }
        ConfigCommands::Check => {
            config.validate()?;

            if format != OutputFormat::Table {
                // the token never leaves the process
                let mut redacted = config.clone();
                if redacted.control_plane.api_token.is_some() {
                    redacted.control_plane.api_token = Some("<redacted>".to_string());
                }
                return output::print_single(&redacted, format);
            }

            output::print_success("Configuration is valid");
            let cp = &config.control_plane;
            println!("{}", "Control plane".bold());
            output::print_field("Enabled", cp.enabled);
            output::print_field("Namespace", &cp.namespace);
            output::print_field(
                "Kubeconfig",
                output::or_dash(cp.kubeconfig.as_ref().map(|p| p.display())),
            );
            output::print_field("Context", output::or_dash(cp.context.as_ref()));
            output::print_field("API server", output::or_dash(cp.api_server.as_ref()));
            output::print_field(
                "API credential",
                if cp.api_token.is_some() { "set" } else { "-" },
            );

            println!("{}", "Timeouts (s)".bold());
            output::print_field("Create", config.timeouts.create_secs);
            output::print_field("Delete", config.timeouts.delete_secs);
            output::print_field("Scale", config.timeouts.scale_secs);
            output::print_field("Read", config.timeouts.read_secs);

            println!("{}", "Providers".bold());
            output::print_field("Default", &config.providers.default_provider);
            output::print_field("AWS region", &config.providers.aws.default_region);
            output::print_field("Azure location", &config.providers.azure.default_location);
            output::print_field("GCP region", &config.providers.gcp.default_region);
            output::print_field(
                "GCP project",
                output::or_dash(config.providers.gcp.default_project.as_ref()),
            );
            output::print_field("Docker", config.providers.docker.enabled);

            println!("{}", "Logging".bold());
            output::print_field("Level", &config.logging.level);
            output::print_field("JSON", config.logging.json);
            if config.logging.file_logging_enabled {
                output::print_field(
                    "File",
                    format!(
                        "{}/{} ({})",
                        config.logging.log_dir.display(),
                        config.logging.file_prefix,
                        config.logging.rotation
                    ),
                );
            }
        }
    }
    Ok(())
}
