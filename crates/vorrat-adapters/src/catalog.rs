//! Open Food Facts: the public catalog consulted by the cheap
//! identity-only lookup chain before any storefront is asked.

use serde_json::Value;

use crate::error::AdapterError;
use crate::http::fetch_json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProduct {
    pub name: String,
    pub brand: String,
}

pub struct OpenFoodFacts {
    http: reqwest::Client,
    base_url: String,
}

impl OpenFoodFacts {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, "https://world.openfoodfacts.org".to_string())
    }

    #[must_use]
    pub fn with_base_url(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    /// Look a barcode up; `Ok(None)` when the catalog has no usable entry.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the catalog is unreachable.
    pub async fn lookup(&self, ean: &str) -> Result<Option<CatalogProduct>, AdapterError> {
        let url = format!("{}/api/v0/product/{ean}.json", self.base_url);
        let json = match fetch_json(&self.http, &url, &[]).await {
            Ok(json) => json,
            Err(AdapterError::Status { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        if json.get("status").and_then(Value::as_i64) != Some(1) {
            return Ok(None);
        }

        let Some(name) = json
            .pointer("/product/product_name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
        else {
            return Ok(None);
        };

        Ok(Some(CatalogProduct {
            name: name.to_string(),
            brand: json
                .pointer("/product/brands")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
        }))
    }
}
