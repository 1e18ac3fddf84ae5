//! Open Food Facts provider
//!
//! Maps to `GET /api/v2/product/{barcode}.json`. Broad international coverage
//! of consumer packaged goods, so it is queried first.

use super::ProductProvider;
use crate::client::HttpClient;
use crate::error::LookupResult;
use crate::product::{non_empty, ProductRecord};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

const PROVIDER_NAME: &str = "open_food_facts";

/// Fields requested from the API; keeps responses small
const FIELDS: &str = "product_name,product_name_en,generic_name,brands,categories,image_front_url,image_url";

/// Open Food Facts product lookup
#[derive(Clone)]
pub struct OpenFoodFactsProvider {
    client: HttpClient,
    base_url: String,
}

impl OpenFoodFactsProvider {
    /// Create a provider against the given API base URL
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn product_url(&self, barcode: &str) -> String {
        format!("{}/api/v2/product/{barcode}.json", self.base_url)
    }
}

#[async_trait]
impl ProductProvider for OpenFoodFactsProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    #[instrument(skip(self), fields(provider = PROVIDER_NAME))]
    async fn fetch(&self, barcode: &str) -> LookupResult<Option<ProductRecord>> {
        let url = self.product_url(barcode);
        match self
            .client
            .get_json::<OffResponse>(&url, &[("fields", FIELDS)])
            .await
        {
            Ok(response) => Ok(response.into_record()),
            // Unknown barcodes come back as 404 with a status-0 body
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Product response envelope
#[derive(Debug, Clone, Deserialize)]
struct OffResponse {
    #[serde(default)]
    status: i64,
    product: Option<OffProduct>,
}

/// Product payload (only the requested fields)
#[derive(Debug, Clone, Default, Deserialize)]
struct OffProduct {
    product_name: Option<String>,
    product_name_en: Option<String>,
    generic_name: Option<String>,
    brands: Option<String>,
    categories: Option<String>,
    image_front_url: Option<String>,
    image_url: Option<String>,
}

impl OffResponse {
    fn into_record(self) -> Option<ProductRecord> {
        if self.status != 1 {
            return None;
        }
        let product = self.product?;

        let name = non_empty(product.product_name)
            .or_else(|| non_empty(product.product_name_en))
            .or_else(|| non_empty(product.generic_name))?;

        // "Brand A, Brand B" -> first brand
        let brand = non_empty(product.brands)
            .and_then(|b| non_empty(b.split(',').next().map(String::from)));

        // Categories run from general to specific; keep the most specific
        let category = non_empty(product.categories)
            .and_then(|c| non_empty(c.split(',').next_back().map(String::from)));

        Some(ProductRecord {
            name,
            brand,
            category,
            image: non_empty(product.image_front_url).or_else(|| non_empty(product.image_url)),
            source: Some(PROVIDER_NAME.to_string()),
        })
    }
}
