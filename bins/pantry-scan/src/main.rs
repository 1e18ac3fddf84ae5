//! pantry-scan - resolve barcodes and food labels from the command line
//!
//! Runs the same lookup chain, decoder and label parser the scanner service
//! uses, and can replay a directory of images as a camera feed.

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use pantry_core::config::Config;
use pantry_core::error::exit_codes;
use pantry_core::{Error as CoreError, ErrorCode};
use pantry_telemetry::TelemetryConfig;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod file_camera;
mod output;

use output::{OutputFormat, Outcome};

/// Scan barcodes and food labels into product records
#[derive(Parser)]
#[command(name = "pantry-scan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a configuration file
    #[arg(short, long, global = true, env = "PANTRY_CONFIG")]
    config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a barcode through the provider chain
    Lookup {
        /// Barcode value (EAN, UPC, ...)
        barcode: String,
    },

    /// Decode a QR code from an image file
    Decode {
        /// Path to image file
        path: PathBuf,
    },

    /// Parse label fields from text
    Extract {
        /// Text file with OCR output or a model reply ("-" for stdin)
        path: PathBuf,

        /// Send the text through the configured extraction model first
        #[arg(long)]
        model: bool,
    },

    /// Replay a directory of images as a camera feed until a barcode is confirmed
    Scan {
        /// Directory of frames, replayed in file name order
        dir: PathBuf,

        /// Give up after this many seconds
        #[arg(short, long, default_value = "15")]
        timeout: u64,

        /// Skip provider lookups and report a placeholder product
        #[arg(long)]
        offline: bool,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return report(&anyhow::Error::new(e), cli.format),
    };

    let mut telemetry = TelemetryConfig::from(&config.schema.telemetry);
    if cli.verbose {
        telemetry = telemetry.verbose();
    } else {
        telemetry.log_level = "warn".to_string();
    }
    let _guard = match pantry_telemetry::init_with_config(&telemetry) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} {e}", "Warning:".yellow().bold());
            None
        }
    };

    let schema = &config.schema;
    let result = match cli.command {
        Commands::Lookup { barcode } => commands::lookup::run(schema, &barcode, cli.format).await,
        Commands::Decode { path } => commands::decode::run(&path, cli.format).await,
        Commands::Extract { path, model } => commands::extract::run(schema, &path, model, cli.format).await,
        Commands::Scan { dir, timeout, offline } => {
            commands::scan::run(schema, &dir, timeout, offline, cli.verbose, cli.format).await
        }
        Commands::Config => commands::config::run(&config, cli.format),
    };

    match result {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::NotFound) => exit_code(exit_codes::NOT_FOUND),
        Err(e) => report(&e, cli.format),
    }
}

fn report(err: &anyhow::Error, format: OutputFormat) -> ExitCode {
    let core = err.downcast_ref::<CoreError>();
    match (format, core) {
        (OutputFormat::Json, Some(core)) => {
            let report = serde_json::json!({ "error": core.to_report() });
            println!("{report:#}");
        }
        (OutputFormat::Json, None) => {
            let report = serde_json::json!({ "error": { "message": format!("{err:#}") } });
            println!("{report:#}");
        }
        (OutputFormat::Text, _) => eprintln!("{} {err:#}", "Error:".red().bold()),
    }
    exit_code(core.map_or(exit_codes::FAILURE, error_exit_code))
}

fn error_exit_code(err: &CoreError) -> i32 {
    match err.code {
        ErrorCode::FileNotFound => exit_codes::NOT_FOUND,
        code => match code.category() {
            "Configuration" => exit_codes::CONFIG_ERROR,
            "Camera" => exit_codes::CAMERA_ERROR,
            _ => exit_codes::FAILURE,
        },
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
