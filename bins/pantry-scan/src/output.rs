//! Shared output helpers

use clap::ValueEnum;
use owo_colors::OwoColorize;
use pantry_lookup::ProductRecord;
use pantry_scanner::CapturedLabelData;
use serde::Serialize;

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Result of a command that ran without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// Nothing was decoded, confirmed or resolved
    NotFound,
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn heading(title: &str) {
    println!();
    println!("  {}", title.blue().bold());
    println!("  {}", "─".repeat(title.chars().count()).blue());
}

pub fn print_product(product: &ProductRecord) {
    let source = product.source.as_deref().unwrap_or("placeholder");
    println!("  Name:      {}", product.name.bold());
    if let Some(brand) = &product.brand {
        println!("  Brand:     {brand}");
    }
    if let Some(category) = &product.category {
        println!("  Category:  {category}");
    }
    if let Some(image) = &product.image {
        println!("  Image:     {}", image.dimmed());
    }
    if product.is_placeholder() {
        println!("  Source:    {}", source.yellow());
    } else {
        println!("  Source:    {}", source.green());
    }
}

pub fn print_label(data: &CapturedLabelData) {
    let rows = [
        ("Name", &data.name),
        ("Manufactured", &data.manufacturing_date),
        ("Expires", &data.expiry_date),
        ("Batch", &data.batch_number),
    ];
    for (label, value) in rows {
        match value {
            Some(value) => println!("  {:<13} {}", format!("{label}:"), value.green()),
            None => println!("  {:<13} {}", format!("{label}:"), "-".dimmed()),
        }
    }
}
