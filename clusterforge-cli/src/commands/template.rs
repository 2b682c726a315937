///! Template commands

use crate::output::{self, OutputFormat};
use crate::TemplateCommands;
use anyhow::Result;
use clusterforge_common::TemplateInfo;
use clusterforge_core::{AppState, OperationContext};
use tabled::Tabled;

#[derive(Tabled)]
struct TemplateRow {
    name: String,
    namespace: String,
    variables: String,
    age: String,
}

impl From<&TemplateInfo> for TemplateRow {
    fn from(template: &TemplateInfo) -> Self {
        let variables = if template.variables.is_empty() {
            "-".to_string()
        } else {
            output::truncate(&template.variables.join(", "), 60)
        };

        Self {
            name: template.name.clone(),
            namespace: template.namespace.clone(),
            variables,
            age: output::format_age(template.created_at),
        }
    }
}

pub async fn handle_template_command(
    command: TemplateCommands,
    state: &AppState,
    ctx: &OperationContext,
    format: OutputFormat,
) -> Result<()> {
    match command {
        TemplateCommands::List => {
            let templates = state.service.list_templates(ctx).await?;
            output::print_list(&templates, format, TemplateRow::from)?;
        }
    }
    Ok(())
}
