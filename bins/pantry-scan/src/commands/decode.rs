//! Decode command - read a QR code from one image

use crate::output::{self, OutputFormat, Outcome};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use pantry_core::{Error as CoreError, ErrorCode};
use pantry_scanner::decode::QrDecoder;
use pantry_scanner::Frame;
use std::path::Path;

pub async fn run(path: &Path, format: OutputFormat) -> Result<Outcome> {
    if !path.exists() {
        return Err(CoreError::new(ErrorCode::FileNotFound, format!("Image not found: {}", path.display())).into());
    }
    let frame = Frame::open(path).with_context(|| format!("failed to load {}", path.display()))?;
    let gray = frame.to_luma();

    let decoded = tokio::task::spawn_blocking(move || QrDecoder::decode_luma(&gray))
        .await
        .context("decoder task failed")?;

    let (value, error) = match decoded {
        Ok(value) => (value, None),
        Err(e) => (None, Some(e.to_string())),
    };

    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "path": path.display().to_string(),
            "width": frame.width(),
            "height": frame.height(),
            "value": value,
            "error": error,
        }))?,
        OutputFormat::Text => match (&value, &error) {
            (Some(value), _) => println!("{} {}", "✓".green(), value.bold()),
            (None, Some(error)) => println!("{} {}", "✗".red(), error),
            (None, None) => println!("{} No QR code found in {}", "✗".yellow(), path.display()),
        },
    }

    Ok(if value.is_some() { Outcome::Done } else { Outcome::NotFound })
}
