//! Product data providers
//!
//! Each provider queries one external food database keyed by barcode and
//! normalizes its schema into a [`ProductRecord`].

mod open_food_facts;
mod usda;

pub use open_food_facts::OpenFoodFactsProvider;
pub use usda::UsdaProvider;

use crate::error::LookupResult;
use crate::product::ProductRecord;
use async_trait::async_trait;

/// A single source of product data
#[async_trait]
pub trait ProductProvider: Send + Sync {
    /// Stable provider name used in logs and on resolved records
    fn name(&self) -> &'static str;

    /// Fetch the product for a barcode.
    ///
    /// `Ok(None)` means the provider answered but has no record.
    async fn fetch(&self, barcode: &str) -> LookupResult<Option<ProductRecord>>;
}
