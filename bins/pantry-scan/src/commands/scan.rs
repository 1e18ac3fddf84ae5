//! Scan command - run a full barcode session over a directory of frames

use crate::file_camera::FileCamera;
use crate::output::{self, OutputFormat, Outcome};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use pantry_core::config::ConfigSchema;
use pantry_core::Error as CoreError;
use pantry_lookup::{LookupChain, ProductRecord};
use pantry_scanner::{ConfirmedScan, ScanCoordinator, ScanEvent};
use pantry_telemetry::metrics;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

pub async fn run(
    config: &ConfigSchema,
    dir: &Path,
    timeout_secs: u64,
    offline: bool,
    verbose: bool,
    format: OutputFormat,
) -> Result<Outcome> {
    let camera = FileCamera::from_dir(dir, config.camera.secure_context)?;
    let frame_count = camera.frame_count();

    let lookup = if offline {
        LookupChain::new()
    } else {
        LookupChain::from_config(&config.lookup).map_err(CoreError::from)?
    };

    let coordinator = ScanCoordinator::builder(Arc::new(camera))
        .config(config)
        .lookup(lookup)
        .build();
    let mut events = coordinator.subscribe();

    let spinner = (format == OutputFormat::Text).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Scanning {frame_count} frame(s) from {}", dir.display()));
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    });

    let started = Instant::now();
    let session = coordinator.start_barcode_scan().await.map_err(CoreError::from);
    let session = match session {
        Ok(session) => session,
        Err(e) => {
            if let Some(pb) = &spinner {
                pb.finish_and_clear();
            }
            return Err(e.into());
        }
    };
    info!(session = %session.id, frames = frame_count, "Replaying frames");

    let confirmed = tokio::time::timeout(Duration::from_secs(timeout_secs), wait_for_confirmation(&mut events))
        .await
        .ok()
        .flatten();
    coordinator.stop();

    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }

    let elapsed_ms = started.elapsed().as_millis();
    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "session": session,
            "frames": frame_count,
            "elapsed_ms": elapsed_ms,
            "confirmed": confirmed.as_ref().map(|(scan, _)| scan),
            "product": confirmed.as_ref().map(|(_, product)| product),
            "metrics": metrics().export_json(),
        }))?,
        OutputFormat::Text => match &confirmed {
            Some((scan, product)) => {
                output::heading(&format!("Confirmed {} via {}", scan.barcode, scan.source));
                output::print_product(product);
                println!("  {}", format!("{elapsed_ms} ms").dimmed());
                if verbose {
                    println!();
                    println!("{}", serde_json::to_string_pretty(&metrics().export_json())?);
                }
            }
            None => println!(
                "{} No barcode confirmed within {timeout_secs}s",
                "✗".yellow()
            ),
        },
    }

    Ok(if confirmed.is_some() { Outcome::Done } else { Outcome::NotFound })
}

async fn wait_for_confirmation(
    events: &mut tokio::sync::broadcast::Receiver<ScanEvent>,
) -> Option<(ConfirmedScan, ProductRecord)> {
    loop {
        match events.recv().await {
            Ok(ScanEvent::Confirmed { scan, product }) => return Some((scan, product)),
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => return None,
        }
    }
}
