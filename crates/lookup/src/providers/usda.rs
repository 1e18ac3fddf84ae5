//! USDA FoodData Central provider
//!
//! Maps to `GET /foods/search?query=<barcode>&dataType=Branded`. The branded
//! foods database is keyed by GTIN/UPC, which makes it a useful second opinion
//! for US products missing from Open Food Facts.

use super::ProductProvider;
use crate::client::HttpClient;
use crate::error::LookupResult;
use crate::product::{non_empty, ProductRecord};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

const PROVIDER_NAME: &str = "usda_fdc";

/// Shared, heavily rate-limited key accepted by api.data.gov
const DEMO_KEY: &str = "DEMO_KEY";

/// USDA FoodData Central product lookup
#[derive(Clone)]
pub struct UsdaProvider {
    client: HttpClient,
    base_url: String,
    api_key: String,
}

impl UsdaProvider {
    /// Create a provider; without a key the public demo key is used
    pub fn new(client: HttpClient, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty()).unwrap_or_else(|| {
            debug!("no USDA API key configured, using {DEMO_KEY}");
            DEMO_KEY.to_string()
        });

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl ProductProvider for UsdaProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    #[instrument(skip(self), fields(provider = PROVIDER_NAME))]
    async fn fetch(&self, barcode: &str) -> LookupResult<Option<ProductRecord>> {
        let url = format!("{}/foods/search", self.base_url);
        let response: SearchResponse = self
            .client
            .get_json(
                &url,
                &[
                    ("query", barcode),
                    ("dataType", "Branded"),
                    ("pageSize", "5"),
                    ("api_key", self.api_key.as_str()),
                ],
            )
            .await?;

        Ok(response.best_match(barcode))
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Search response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<SearchFood>,
}

/// Branded food entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchFood {
    description: Option<String>,
    brand_name: Option<String>,
    brand_owner: Option<String>,
    gtin_upc: Option<String>,
    food_category: Option<String>,
}

impl SearchFood {
    fn gtin(&self) -> Option<&str> {
        self.gtin_upc.as_deref().map(str::trim).filter(|g| !g.is_empty())
    }
}

impl SearchResponse {
    /// Prefer the entry whose GTIN matches the barcode, else the first hit
    /// without a GTIN. Hits carrying a different GTIN are other products.
    fn best_match(self, barcode: &str) -> Option<ProductRecord> {
        let wanted = strip_leading_zeros(barcode);
        let mut foods = self.foods;

        let index = foods
            .iter()
            .position(|f| f.gtin().map(strip_leading_zeros) == Some(wanted))
            .or_else(|| foods.iter().position(|f| f.gtin().is_none()))?;
        let food = foods.swap_remove(index);

        Some(ProductRecord {
            name: non_empty(food.description)?,
            brand: non_empty(food.brand_name).or_else(|| non_empty(food.brand_owner)),
            category: non_empty(food.food_category),
            image: None,
            source: Some(PROVIDER_NAME.to_string()),
        })
    }
}

/// GTIN-14, EAN-13 and UPC-A spellings of one code differ only in zero padding
fn strip_leading_zeros(code: &str) -> &str {
    let stripped = code.trim().trim_start_matches('0');
    if stripped.is_empty() { "0" } else { stripped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str, barcode: &str) -> Option<ProductRecord> {
        serde_json::from_str::<SearchResponse>(json).unwrap().best_match(barcode)
    }

    #[test]
    fn test_prefers_matching_gtin() {
        let record = parse(
            r#"{"foods": [
                {"description": "OTHER MILK", "gtinUpc": "099999999999"},
                {"description": "ORGANIC WHOLE MILK", "brandOwner": "Happy Cows LLC",
                 "gtinUpc": "00012345678905", "foodCategory": "Milk"}
            ]}"#,
            "012345678905",
        )
        .unwrap();

        assert_eq!(record.name, "ORGANIC WHOLE MILK");
        assert_eq!(record.brand.as_deref(), Some("Happy Cows LLC"));
        assert_eq!(record.category.as_deref(), Some("Milk"));
        assert_eq!(record.source.as_deref(), Some(PROVIDER_NAME));
    }

    #[test]
    fn test_falls_back_to_hit_without_gtin() {
        let record = parse(
            r#"{"foods": [
                {"description": "OTHER DRINK", "gtinUpc": "012345678905"},
                {"description": "OAT DRINK", "brandName": "OATLY", "gtinUpc": ""}
            ]}"#,
            "7394376616037",
        )
        .unwrap();
        assert_eq!(record.name, "OAT DRINK");
        assert_eq!(record.brand.as_deref(), Some("OATLY"));
    }

    #[test]
    fn test_conflicting_gtin_is_no_match() {
        let json = r#"{"foods": [{"description": "UNRELATED SODA", "gtinUpc": "049000000443"}]}"#;
        assert!(parse(json, "012345678905").is_none());
    }

    #[test]
    fn test_empty_results() {
        assert!(parse(r#"{"totalHits": 0, "foods": []}"#, "012345678905").is_none());
        assert!(parse(r#"{}"#, "012345678905").is_none());
    }

    #[test]
    fn test_blank_description_is_unusable() {
        assert!(parse(r#"{"foods": [{"description": " "}]}"#, "1").is_none());
    }

    #[test]
    fn test_demo_key_fallback() {
        let provider = UsdaProvider::new(HttpClient::new().unwrap(), "https://api.nal.usda.gov/fdc/v1", None);
        assert_eq!(provider.api_key, DEMO_KEY);

        let provider = UsdaProvider::new(
            HttpClient::new().unwrap(),
            "https://api.nal.usda.gov/fdc/v1",
            Some("real-key".to_string()),
        );
        assert_eq!(provider.api_key, "real-key");
    }

    #[test]
    fn test_strip_leading_zeros() {
        assert_eq!(strip_leading_zeros("00012345678905"), "12345678905");
        assert_eq!(strip_leading_zeros("0000"), "0");
    }
}
