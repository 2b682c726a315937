///! Tool commands
///!
///! Exposes the same tool surface an agent sees, for scripting and debugging.

use crate::output::{self, OutputFormat};
use crate::ToolsCommands;
use anyhow::{anyhow, Context, Result};
use clusterforge_core::tools::{self, ToolInfo};
use clusterforge_core::{AppState, OperationContext};
use tabled::Tabled;

#[derive(Tabled)]
struct ToolRow {
    name: String,
    arguments: String,
    description: String,
}

impl From<&ToolInfo> for ToolRow {
    fn from(tool: &ToolInfo) -> Self {
        let arguments = tool
            .arguments
            .iter()
            .map(|a| if a.required { a.name.to_string() } else { format!("[{}]", a.name) })
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            name: tool.name.to_string(),
            arguments,
            description: output::truncate(tool.description, 70),
        }
    }
}

pub async fn handle_tools_command(
    command: ToolsCommands,
    state: &AppState,
    ctx: &OperationContext,
    format: OutputFormat,
) -> Result<()> {
    match command {
        ToolsCommands::List => {
            let definitions = tools::definitions();
            output::print_list(&definitions, format, ToolRow::from)?;
        }
        ToolsCommands::Call { name, args } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("tool arguments must be a JSON object")?;

            match tools::dispatch(&state.service, ctx, &name, args).await {
                Ok(value) => output::print_single(&value, format)?,
                Err(err) => {
                    if format == OutputFormat::Table {
                        return Err(anyhow!("{}: {}", err.code, err.message));
                    }
                    output::print_single(&err, format)?;
                    return Err(anyhow!("tool '{}' failed with {}", name, err.code));
                }
            }
        }
    }
    Ok(())
}
