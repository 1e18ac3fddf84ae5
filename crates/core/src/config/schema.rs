//! Configuration schema definitions
//!
//! Every section has serde defaults, so an empty file (or no file at all)
//! yields the stock scanning behavior.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub barcode: BarcodeConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub lookup: LookupConfig,

    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl ConfigSchema {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.camera.validate()?;
        self.barcode.validate()?;
        self.capture.validate()?;
        self.lookup.validate()?;
        Ok(())
    }
}

/// Camera stream request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Preferred facing mode ("environment" or "user")
    #[serde(default = "default_facing_mode")]
    pub facing_mode: String,

    /// Ideal frame width in pixels
    #[serde(default = "default_ideal_width")]
    pub ideal_width: u32,

    /// Ideal frame height in pixels
    #[serde(default = "default_ideal_height")]
    pub ideal_height: u32,

    /// Treat the origin as secure (HTTPS or localhost)
    #[serde(default = "default_true")]
    pub secure_context: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing_mode: default_facing_mode(),
            ideal_width: default_ideal_width(),
            ideal_height: default_ideal_height(),
            secure_context: true,
        }
    }
}

impl CameraConfig {
    fn validate(&self) -> Result<()> {
        if !matches!(self.facing_mode.as_str(), "environment" | "user") {
            return Err(Error::invalid_config(
                "camera.facing_mode",
                format!("expected \"environment\" or \"user\", got \"{}\"", self.facing_mode),
            ));
        }
        if self.ideal_width == 0 || self.ideal_height == 0 {
            return Err(Error::invalid_config("camera.ideal_width", "dimensions must be non-zero"));
        }
        Ok(())
    }
}

fn default_facing_mode() -> String {
    "environment".to_string()
}

fn default_ideal_width() -> u32 {
    1280
}

fn default_ideal_height() -> u32 {
    720
}

fn default_true() -> bool {
    true
}

/// Barcode resolver tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarcodeConfig {
    /// Frame sampling cadence in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive identical reads required before a value is confirmed
    #[serde(default = "default_confirm_threshold")]
    pub confirm_threshold: u32,
}

impl Default for BarcodeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            confirm_threshold: default_confirm_threshold(),
        }
    }
}

impl BarcodeConfig {
    /// Polling cadence as a duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::invalid_config("barcode.poll_interval_ms", "must be greater than zero"));
        }
        if self.confirm_threshold == 0 {
            return Err(Error::invalid_config("barcode.confirm_threshold", "must be at least 1"));
        }
        Ok(())
    }
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_confirm_threshold() -> u32 {
    3
}

/// Photo-capture pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Seconds between capture cycles
    #[serde(default = "default_capture_interval_secs")]
    pub interval_secs: u64,

    /// OCR language hint passed to the engine
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,

    /// Prompt sent to the text-extraction model ahead of the OCR text
    #[serde(default = "default_extraction_prompt")]
    pub extraction_prompt: String,

    /// Chat-completions endpoint of the extraction model
    #[serde(default)]
    pub extraction_url: Option<String>,

    /// Model identifier sent to the extraction endpoint
    #[serde(default = "default_extraction_model")]
    pub extraction_model: String,

    /// API key for the extraction endpoint (prefer PANTRY_EXTRACTION_API_KEY)
    #[serde(default, skip_serializing)]
    pub extraction_api_key: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_capture_interval_secs(),
            ocr_language: default_ocr_language(),
            extraction_prompt: default_extraction_prompt(),
            extraction_url: None,
            extraction_model: default_extraction_model(),
            extraction_api_key: None,
        }
    }
}

impl CaptureConfig {
    /// Capture cadence as a duration
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::invalid_config("capture.interval_secs", "must be greater than zero"));
        }
        if let Some(url) = &self.extraction_url {
            validate_http_url("capture.extraction_url", url)?;
        }
        Ok(())
    }
}

fn default_capture_interval_secs() -> u64 {
    5
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

fn default_extraction_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_extraction_prompt() -> String {
    "Extract the product details from this label text. Reply with one field per line \
     using exactly these labels: Name:, Manufacturing Date:, Expiry Date:, Batch Number:. \
     Omit any field you cannot find."
        .to_string()
}

/// Product lookup providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Open Food Facts API base URL
    #[serde(default = "default_open_food_facts_url")]
    pub open_food_facts_url: String,

    /// USDA FoodData Central API base URL
    #[serde(default = "default_usda_url")]
    pub usda_url: String,

    /// USDA API key (prefer PANTRY_USDA_API_KEY)
    #[serde(default, skip_serializing)]
    pub usda_api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_lookup_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per provider for retryable failures
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            open_food_facts_url: default_open_food_facts_url(),
            usda_url: default_usda_url(),
            usda_api_key: None,
            timeout_secs: default_lookup_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl LookupConfig {
    /// Request timeout as a duration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        validate_http_url("lookup.open_food_facts_url", &self.open_food_facts_url)?;
        validate_http_url("lookup.usda_url", &self.usda_url)?;
        if self.timeout_secs == 0 {
            return Err(Error::invalid_config("lookup.timeout_secs", "must be greater than zero"));
        }
        if self.max_attempts == 0 {
            return Err(Error::invalid_config("lookup.max_attempts", "must be at least 1"));
        }
        Ok(())
    }
}

fn default_open_food_facts_url() -> String {
    "https://world.openfoodfacts.org".to_string()
}

fn default_usda_url() -> String {
    "https://api.nal.usda.gov/fdc/v1".to_string()
}

fn default_lookup_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    2
}

/// Logging output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySection {
    /// Default filter directive when RUST_LOG/PANTRY_LOG are unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON lines instead of compact text
    #[serde(default)]
    pub json: bool,

    /// Also write logs to this file
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn validate_http_url(field: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::invalid_config(field, "must start with http:// or https://"))
    }
}
