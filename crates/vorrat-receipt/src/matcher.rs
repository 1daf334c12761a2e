//! Line-item matching: turn parsed receipt lines into catalog references.

use async_trait::async_trait;
use serde::Serialize;

use vorrat_adapters::{BrandAdapter, SearchResponse};
use vorrat_core::{MatcherTuning, SearchHit};

use crate::dictionary::Dictionary;
use crate::error::ReceiptError;
use crate::extract::extract_text;
use crate::parse::{
    dm_product_region, parse_dm_line, parse_rossmann_line, rossmann_product_region,
};
use crate::sanitize::sanitize_name;
use crate::similarity::{price_boundary, similarity_score};

/// A receipt line resolved to a catalog entry, in the shape the inventory
/// frontend ingests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedItem {
    pub name: String,
    pub quantity: u32,
    /// Barcode of the matched product, when known.
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Identity-only barcode resolution, implemented by the server on top of
/// the article store, the public catalog, and the dm adapter.
#[async_trait]
pub trait CodeLookup: Send + Sync {
    async fn lookup_name(&self, ean: &str) -> Option<NamedProduct>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedProduct {
    pub brand: String,
    pub name: String,
}

pub struct ReceiptMatcher {
    tuning: MatcherTuning,
    dictionary: Dictionary,
}

impl ReceiptMatcher {
    #[must_use]
    pub fn new(tuning: MatcherTuning) -> Self {
        Self {
            tuning,
            dictionary: Dictionary::builtin(),
        }
    }

    /// Match an uploaded dm receipt PDF against the dm product search.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError`] when the PDF is unreadable or its layout
    /// is not a dm receipt; unmatched lines are dropped, not fatal.
    pub async fn match_dm_receipt(
        &self,
        pdf: &[u8],
        search: &dyn BrandAdapter,
    ) -> Result<Vec<MatchedItem>, ReceiptError> {
        let text = extract_text(pdf)?;
        self.match_dm_text(&text, search).await
    }

    /// Text-level dm pipeline, separated from PDF extraction for tests.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError::Layout`] when the product region cannot be
    /// located.
    pub async fn match_dm_text(
        &self,
        text: &str,
        search: &dyn BrandAdapter,
    ) -> Result<Vec<MatchedItem>, ReceiptError> {
        let lines = dm_product_region(text).ok_or(ReceiptError::Layout {
            brand: vorrat_core::Brand::Dm,
        })?;

        let mut items = Vec::new();
        for line in lines {
            let Some(parsed) = parse_dm_line(line) else {
                continue;
            };

            let query = sanitize_name(&parsed.product_name, &self.dictionary, &self.tuning);
            if query.is_empty() {
                continue;
            }

            match self.match_line(&query, parsed.price, search).await {
                Some(hit) => items.push(MatchedItem {
                    name: display_name(&hit),
                    quantity: parsed.quantity,
                    code: hit.gtin,
                    kind: "article",
                }),
                None => {
                    tracing::debug!(line, query = %query, "receipt line matched no candidate; dropping");
                }
            }
        }

        Ok(items)
    }

    /// Match one sanitized line against the brand search, pre-filtered to
    /// the price boundary window.
    ///
    /// The cached-session branch takes the best-scoring exact-price
    /// candidate with no minimum floor; when it yields no exact-price
    /// candidate, a fresh-session search runs and its candidates must
    /// clear the acceptance score.
    async fn match_line(
        &self,
        query: &str,
        price: f64,
        search: &dyn BrandAdapter,
    ) -> Option<SearchHit> {
        let (from, to) = price_boundary(price);

        let response = match search.search_by_price_window(query, from, to, false).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(query, error = %e, "product search failed");
                return None;
            }
        };

        if response.from_cached_artifact {
            if let Some(hit) = self.best_exact_price_match(&response, query, price) {
                return Some(hit);
            }
            // The cached session saw nothing at this price; one fresh
            // acquisition may see a different result set.
            let fresh = match search.search_by_price_window(query, from, to, true).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    tracing::warn!(query, error = %e, "fresh-session product search failed");
                    return None;
                }
            };
            return self.first_accepted_match(&fresh, query, price);
        }

        self.first_accepted_match(&response, query, price)
    }

    /// Highest similarity among exact-price candidates, no floor.
    fn best_exact_price_match(
        &self,
        response: &SearchResponse,
        query: &str,
        price: f64,
    ) -> Option<SearchHit> {
        response
            .hits
            .iter()
            .filter(|hit| price_equals(hit, price))
            .map(|hit| {
                (
                    similarity_score(query, &hit.title, self.tuning.token_accept_ratio),
                    hit,
                )
            })
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, hit)| hit.clone())
    }

    /// First exact-price candidate clearing the acceptance score,
    /// scored candidate→query.
    fn first_accepted_match(
        &self,
        response: &SearchResponse,
        query: &str,
        price: f64,
    ) -> Option<SearchHit> {
        response
            .hits
            .iter()
            .find(|hit| {
                price_equals(hit, price)
                    && similarity_score(&hit.title, query, self.tuning.token_accept_ratio)
                        >= self.tuning.candidate_accept_score
            })
            .cloned()
    }

    /// Match an uploaded Rossmann receipt PDF via per-line barcodes.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError`] when the PDF is unreadable or its layout
    /// is not a Rossmann receipt.
    pub async fn match_rossmann_receipt(
        &self,
        pdf: &[u8],
        lookup: &dyn CodeLookup,
    ) -> Result<Vec<MatchedItem>, ReceiptError> {
        let text = extract_text(pdf)?;
        self.match_rossmann_text(&text, lookup).await
    }

    /// Text-level Rossmann pipeline, separated from PDF extraction for
    /// tests.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError::Layout`] when the product region cannot be
    /// located.
    pub async fn match_rossmann_text(
        &self,
        text: &str,
        lookup: &dyn CodeLookup,
    ) -> Result<Vec<MatchedItem>, ReceiptError> {
        let lines = rossmann_product_region(text).ok_or(ReceiptError::Layout {
            brand: vorrat_core::Brand::Rossmann,
        })?;

        let mut items = Vec::new();
        for line in lines {
            let Some(parsed) = parse_rossmann_line(line) else {
                continue;
            };

            match lookup.lookup_name(&parsed.ean).await {
                Some(product) => items.push(MatchedItem {
                    name: format!("{} {}", product.brand, product.name)
                        .trim()
                        .to_string(),
                    quantity: parsed.quantity,
                    code: Some(parsed.ean),
                    kind: "article",
                }),
                None => {
                    tracing::debug!(ean = %parsed.ean, "receipt barcode resolved nowhere; dropping");
                }
            }
        }

        Ok(items)
    }
}

fn price_equals(hit: &SearchHit, price: f64) -> bool {
    hit.displayed_price
        .is_some_and(|displayed| (displayed - price).abs() < 1e-9)
}

fn display_name(hit: &SearchHit) -> String {
    match &hit.brand_name {
        Some(brand) => format!("{brand} {}", hit.title),
        None => hit.title.clone(),
    }
}
