//! Schema command - show the compiled billing rules.

use anyhow::Result;
use pulsewatch_store::load_schema;

use super::load_settings;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the schema command.
pub async fn run(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli).await?;
    let index = load_schema(&settings);

    let source = settings
        .schema_path
        .as_ref()
        .map_or_else(|| "bundled".to_string(), |p| p.display().to_string());

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_schema(&index, &source));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&formatter.schema_output(&index, &source))?);
        }
    }

    Ok(())
}
