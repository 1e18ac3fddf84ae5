//! Lookup command - resolve one barcode through the provider chain

use crate::output::{self, OutputFormat, Outcome};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use pantry_core::config::ConfigSchema;
use pantry_core::Error as CoreError;
use pantry_lookup::{LookupChain, ProductRecord};
use std::time::Duration;

pub async fn run(config: &ConfigSchema, barcode: &str, format: OutputFormat) -> Result<Outcome> {
    let chain = LookupChain::from_config(&config.lookup).map_err(CoreError::from)?;

    let spinner = (format == OutputFormat::Text).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()));
        pb.set_message(format!("Looking up {barcode} ({})", chain.provider_names().join(" → ")));
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    });

    let found = chain.lookup(barcode).await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }

    let resolved = found.is_some();
    let product = found.unwrap_or_else(|| ProductRecord::placeholder(barcode.trim()));

    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "barcode": barcode.trim(),
            "resolved": resolved,
            "product": product,
        }))?,
        OutputFormat::Text => {
            output::heading(&format!("Barcode {}", barcode.trim()));
            output::print_product(&product);
            if !resolved {
                println!();
                println!("  {}", "No provider knew this barcode; edit the name before saving.".yellow());
            }
        }
    }

    Ok(if resolved { Outcome::Done } else { Outcome::NotFound })
}
