//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, Result};
use std::path::Path;

/// Environment variable holding the USDA FoodData Central key
pub const ENV_USDA_API_KEY: &str = "PANTRY_USDA_API_KEY";
/// Environment variable holding the extraction model key
pub const ENV_EXTRACTION_API_KEY: &str = "PANTRY_EXTRACTION_API_KEY";
/// Environment variable overriding the extraction endpoint
pub const ENV_EXTRACTION_URL: &str = "PANTRY_EXTRACTION_URL";
/// Environment variable overriding the Open Food Facts base URL
pub const ENV_OPEN_FOOD_FACTS_URL: &str = "PANTRY_OFF_URL";

/// Configuration wrapper
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub schema: ConfigSchema,
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from a file path or use defaults.
    ///
    /// An explicit path must exist; without one, the standard locations are
    /// searched and defaults are used when none is found. Environment
    /// overrides are applied last, then the result is validated.
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(p) = path {
            if !Path::new(p).exists() {
                return Err(Error::config_not_found(p));
            }
        }

        let config_path = path.map(String::from).or_else(find_config_file);

        let mut schema = if let Some(ref p) = config_path {
            load_config_file(p)?
        } else {
            ConfigSchema::default()
        };

        apply_env_overrides(&mut schema, |key| std::env::var(key).ok());
        schema.validate()?;

        Ok(Self {
            schema,
            path: config_path,
        })
    }

    /// Load with defaults only (no file, no environment)
    #[must_use]
    pub fn defaults() -> Self {
        Self::default()
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<String> {
    let candidates = [
        ".pantry-scan.toml",
        "pantry-scan.toml",
        ".config/pantry-scan.toml",
    ];

    candidates
        .into_iter()
        .find(|candidate| Path::new(candidate).exists())
        .map(String::from)
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &str) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Failed to read config file {path}: {e}")).with_source(e))?;

    toml::from_str(&content).map_err(|e| {
        Error::from(e).with_context(format!("While parsing config file {path}"))
    })
}

/// Apply environment overrides through a lookup function
fn apply_env_overrides(schema: &mut ConfigSchema, var: impl Fn(&str) -> Option<String>) {
    if let Some(key) = var(ENV_USDA_API_KEY).filter(|v| !v.is_empty()) {
        schema.lookup.usda_api_key = Some(key);
    }
    if let Some(url) = var(ENV_OPEN_FOOD_FACTS_URL).filter(|v| !v.is_empty()) {
        schema.lookup.open_food_facts_url = url;
    }
    if let Some(key) = var(ENV_EXTRACTION_API_KEY).filter(|v| !v.is_empty()) {
        schema.capture.extraction_api_key = Some(key);
    }
    if let Some(url) = var(ENV_EXTRACTION_URL).filter(|v| !v.is_empty()) {
        schema.capture.extraction_url = Some(url);
    }
}
