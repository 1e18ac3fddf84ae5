//! Normalized product record and barcode handling

use crate::error::{LookupError, LookupResult};
use serde::{Deserialize, Serialize};

/// Product resolved from a barcode, normalized across providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Display name
    pub name: String,
    /// Primary brand
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Most specific category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Product image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Provider that produced the record; `None` for placeholders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ProductRecord {
    /// Record with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            brand: None,
            category: None,
            image: None,
            source: None,
        }
    }

    /// Synthetic record used when no provider knows the barcode
    #[must_use]
    pub fn placeholder(barcode: &str) -> Self {
        Self::named(format!("Product {barcode}"))
    }

    /// True when the record carries a usable name
    #[must_use]
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// True when this is a synthetic placeholder rather than provider data
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.source.is_none()
    }
}

/// Trim a decoded value and reject values that cannot be sent to a provider
pub fn normalize_barcode(raw: &str) -> LookupResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LookupError::InvalidBarcode("empty value".to_string()));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(LookupError::InvalidBarcode(format!(
            "contains control characters: {trimmed:?}"
        )));
    }
    Ok(trimmed.to_string())
}

/// Turn an optional provider string into a trimmed, non-empty value
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
