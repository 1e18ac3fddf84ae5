//! Barcode-to-product lookup for pantry scanning
//!
//! Resolves a decoded barcode into a normalized [`ProductRecord`] by asking an
//! ordered chain of food data providers.
//!
//! # Features
//!
//! - **Provider fallback**: Open Food Facts first, then USDA FoodData Central
//! - **Retry with exponential backoff**: Automatic retry for transient failures
//! - **Circuit breaker**: A provider that keeps failing is skipped quickly
//! - **Request correlation**: Every request carries a unique ID for debugging
//!
//! # Example
//!
//! ```rust,no_run
//! use pantry_core::config::LookupConfig;
//! use pantry_lookup::{LookupChain, ProductRecord};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let chain = LookupChain::from_config(&LookupConfig::default())?;
//!
//!     let barcode = "3017620422003";
//!     let product = chain
//!         .lookup(barcode)
//!         .await
//!         .unwrap_or_else(|| ProductRecord::placeholder(barcode));
//!     println!("{}", product.name);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod chain;
pub mod client;
pub mod config;
pub mod error;
pub mod product;
pub mod providers;

pub use chain::LookupChain;
pub use client::HttpClient;
pub use config::ClientConfig;
pub use error::{LookupError, LookupResult};
pub use product::{normalize_barcode, ProductRecord};
pub use providers::{OpenFoodFactsProvider, ProductProvider, UsdaProvider};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::chain::LookupChain;
    pub use crate::error::{LookupError, LookupResult};
    pub use crate::product::ProductRecord;
    pub use crate::providers::ProductProvider;
}
