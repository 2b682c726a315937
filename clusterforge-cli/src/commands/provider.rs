///! Provider metadata commands

use crate::output::{self, OutputFormat};
use crate::ProviderCommands;
use anyhow::Result;
use clusterforge_common::ProviderInfo;
use clusterforge_core::AppState;
use serde::Serialize;
use tabled::Tabled;

#[derive(Tabled)]
struct ProviderRow {
    name: String,
    display_name: String,
    default_region: String,
    versions: String,
}

impl From<&ProviderInfo> for ProviderRow {
    fn from(provider: &ProviderInfo) -> Self {
        Self {
            name: provider.name.clone(),
            display_name: provider.display_name.clone(),
            default_region: output::or_dash(provider.default_region.as_ref()),
            versions: output::truncate(&provider.supported_versions.join(", "), 48),
        }
    }
}

#[derive(Tabled)]
struct ValueRow {
    value: String,
}

/// Catalog list in the shape tools return it
#[derive(Serialize)]
struct Catalog<'a> {
    provider: &'a str,
    #[serde(flatten)]
    entries: std::collections::BTreeMap<&'static str, &'a [String]>,
}

pub fn handle_provider_command(
    command: ProviderCommands,
    state: &AppState,
    format: OutputFormat,
) -> Result<()> {
    let service = &state.service;

    match command {
        ProviderCommands::List => {
            let providers = service.list_providers();
            output::print_list(&providers, format, ProviderRow::from)?;
        }
        ProviderCommands::Regions { provider } => {
            let regions = service.list_regions(&provider)?;
            print_catalog(&provider, "regions", &regions, format)?;
        }
        ProviderCommands::InstanceTypes { provider } => {
            let types = service.list_instance_types(&provider)?;
            print_catalog(&provider, "instance_types", &types, format)?;
        }
        ProviderCommands::Versions { provider } => {
            let versions = service.list_supported_versions(&provider)?;
            print_catalog(&provider, "versions", &versions, format)?;
        }
    }
    Ok(())
}

fn print_catalog(provider: &str, key: &'static str, values: &[String], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            output::print_table(
                values
                    .iter()
                    .map(|value| ValueRow {
                        value: value.clone(),
                    })
                    .collect(),
            );
            Ok(())
        }
        _ => output::print_single(
            &Catalog {
                provider,
                entries: [(key, values)].into_iter().collect(),
            },
            format,
        ),
    }
}
