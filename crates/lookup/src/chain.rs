//! Ordered provider fallback
//!
//! Providers are queried strictly in sequence. The first one that yields a
//! record with a non-empty name wins; errors and empty answers fall through to
//! the next provider. A lookup never fails outright: when every provider
//! misses, the caller gets `None` and decides what to show.

use crate::client::HttpClient;
use crate::config::ClientConfig;
use crate::error::LookupResult;
use crate::product::{normalize_barcode, ProductRecord};
use crate::providers::{OpenFoodFactsProvider, ProductProvider, UsdaProvider};
use pantry_core::config::LookupConfig;
use pantry_telemetry::{metrics, names};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Ordered list of product providers
#[derive(Clone, Default)]
pub struct LookupChain {
    providers: Vec<Arc<dyn ProductProvider>>,
}

impl LookupChain {
    /// Empty chain; every lookup misses
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard chain: Open Food Facts, then USDA FoodData Central.
    ///
    /// Both providers share one HTTP client, and with it one circuit breaker.
    pub fn from_config(config: &LookupConfig) -> LookupResult<Self> {
        let client = HttpClient::with_config(ClientConfig::from(config))?;

        Ok(Self::new()
            .with_provider(OpenFoodFactsProvider::new(
                client.clone(),
                config.open_food_facts_url.clone(),
            ))
            .with_provider(UsdaProvider::new(
                client,
                config.usda_url.clone(),
                config.usda_api_key.clone(),
            )))
    }

    /// Append a provider at the lowest priority
    #[must_use]
    pub fn with_provider(mut self, provider: impl ProductProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Append an already shared provider
    #[must_use]
    pub fn with_shared_provider(mut self, provider: Arc<dyn ProductProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Provider names in query order
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Number of configured providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// True when no providers are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Resolve a barcode to a product.
    ///
    /// Returns `None` when the barcode is unusable or no provider knows it.
    #[instrument(skip(self), fields(providers = self.providers.len()))]
    pub async fn lookup(&self, barcode: &str) -> Option<ProductRecord> {
        let barcode = match normalize_barcode(barcode) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "Skipping lookup");
                metrics().increment(names::LOOKUP_MISSES);
                return None;
            }
        };

        for provider in &self.providers {
            let started = Instant::now();
            let result = provider.fetch(&barcode).await;
            metrics().histogram(
                names::PROVIDER_LATENCY_MS,
                started.elapsed().as_secs_f64() * 1000.0,
            );

            match result {
                Ok(Some(record)) if record.has_name() => {
                    info!(provider = provider.name(), name = %record.name, "Product resolved");
                    metrics().increment(names::LOOKUP_HITS);
                    return Some(record);
                }
                Ok(_) => {
                    debug!(provider = provider.name(), "No usable record");
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Provider failed, trying next");
                    metrics().increment(names::PROVIDER_FAILURES);
                }
            }
        }

        debug!(barcode = %barcode, "No provider resolved barcode");
        metrics().increment(names::LOOKUP_MISSES);
        None
    }
}

impl std::fmt::Debug for LookupChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupChain")
            .field("providers", &self.provider_names())
            .finish()
    }
}
