//! Config command - show the effective configuration

use crate::output::{self, OutputFormat, Outcome};
use anyhow::Result;
use owo_colors::OwoColorize;
use pantry_core::config::Config;

pub fn run(config: &Config, format: OutputFormat) -> Result<Outcome> {
    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "path": config.path,
            "config": config.schema,
        }))?,
        OutputFormat::Text => {
            let source = config.path.as_deref().unwrap_or("built-in defaults");
            println!("{} {}", "# Loaded from:".dimmed(), source.dimmed());
            print!("{}", toml::to_string_pretty(&config.schema)?);
        }
    }
    Ok(Outcome::Done)
}
