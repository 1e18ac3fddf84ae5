//! Extract command - parse label fields from text

use crate::output::{self, OutputFormat, Outcome};
use anyhow::{Context, Result};
use pantry_core::config::ConfigSchema;
use pantry_core::Error as CoreError;
use pantry_scanner::capture::{extractor_from_config, parse_label_fields, TextExtractor};
use std::io::Read;
use std::path::Path;

pub async fn run(config: &ConfigSchema, path: &Path, model: bool, format: OutputFormat) -> Result<Outcome> {
    let text = read_input(path)?;

    let reply = if model {
        let extractor = extractor_from_config(&config.capture).map_err(CoreError::from)?;
        extractor
            .extract(&text, &config.capture.extraction_prompt)
            .await
            .map_err(CoreError::from)?
    } else {
        text
    };

    let data = parse_label_fields(&reply);

    match format {
        OutputFormat::Json => output::print_json(&data)?,
        OutputFormat::Text => {
            output::heading("Label");
            output::print_label(&data);
        }
    }

    Ok(if data.is_empty() { Outcome::NotFound } else { Outcome::Done })
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).context("failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).map_err(|e| {
        anyhow::Error::new(CoreError::from(e).with_context(format!("While reading {}", path.display())))
    })
}
