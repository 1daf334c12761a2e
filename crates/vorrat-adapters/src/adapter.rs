//! The polymorphic storefront contract.
//!
//! Every storefront integration implements [`BrandAdapter`]; callers
//! (orchestrator, receipt matcher, per-brand routes) depend only on the
//! trait, so fan-out and tests work uniformly across the four very
//! different scraping strategies behind it.

use async_trait::async_trait;

use vorrat_core::{AvailabilityRecord, Brand, ProductDetails, ProductRef, SearchHit, StoreListing};

use crate::error::AdapterError;

/// Product-search hits plus which session path produced them; the receipt
/// matcher applies a stricter acceptance floor to fresh-session results.
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// `true` when the hits came via a cached session artifact rather
    /// than a fresh browser-driven acquisition.
    pub from_cached_artifact: bool,
}

#[async_trait]
pub trait BrandAdapter: Send + Sync {
    fn brand(&self) -> Brand;

    /// Resolve a barcode to product details.
    ///
    /// # Errors
    ///
    /// [`AdapterError::NotFound`] when the storefront has no unambiguous
    /// match — ambiguous multi-result pages are rejected, not guessed at.
    async fn resolve_by_code(&self, code: &str) -> Result<ProductDetails, AdapterError>;

    /// Re-extract current price/image from a known product reference.
    ///
    /// # Errors
    ///
    /// [`AdapterError`] when the reference no longer resolves or the page
    /// shape changed.
    async fn fetch_product_details(
        &self,
        reference: &ProductRef,
    ) -> Result<ProductDetails, AdapterError>;

    /// In-stock state of the referenced product at one saved store.
    ///
    /// # Errors
    ///
    /// [`AdapterError`] on upstream or automation failure.
    async fn check_store_availability(
        &self,
        reference: &ProductRef,
        store_id: &str,
    ) -> Result<AvailabilityRecord, AdapterError>;

    /// The reference this adapter wants for availability checks.
    ///
    /// Defaults to the product page URL; dm overrides with its internal
    /// article number.
    fn availability_reference(&self, details: &ProductDetails) -> Option<ProductRef> {
        details.url.clone().map(ProductRef::Url)
    }

    /// Storefront product search windowed to `[from, to]` euros.
    ///
    /// Brands without a search API return no candidates. `force_fresh`
    /// skips the cached-session path.
    ///
    /// # Errors
    ///
    /// [`AdapterError`] on upstream or automation failure.
    async fn search_by_price_window(
        &self,
        query: &str,
        from: i64,
        to: i64,
        force_fresh: bool,
    ) -> Result<SearchResponse, AdapterError> {
        let _ = (query, from, to, force_fresh);
        Ok(SearchResponse::default())
    }

    /// Store directory search near a ZIP code or place name.
    ///
    /// # Errors
    ///
    /// [`AdapterError`] on upstream or automation failure.
    async fn find_stores(&self, search_param: &str) -> Result<Vec<StoreListing>, AdapterError>;
}
