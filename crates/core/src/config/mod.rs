//! Configuration loading and schema definitions
//!
//! Shared configuration types for the scanner, lookup chain and CLI.

mod loader;
mod schema;

pub use loader::{
    Config, ENV_EXTRACTION_API_KEY, ENV_EXTRACTION_URL, ENV_OPEN_FOOD_FACTS_URL, ENV_USDA_API_KEY,
};
pub use schema::*;
