use serde::{Deserialize, Serialize};

/// Product data extracted from one storefront, normalized for storage and
/// comparison across brands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    /// Canonical product page URL on the storefront.
    pub url: Option<String>,
    /// Display name as the storefront renders it, when the page exposes
    /// one; used by the identity-only lookup chain.
    pub name: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    /// Brand-internal article number (e.g. dm's `dan`).
    pub article_number: Option<String>,
}

impl ProductDetails {
    /// An all-null record, used when a brand yielded nothing: explicit
    /// nulls overwrite stale data instead of silently retaining it.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            url: None,
            name: None,
            price: None,
            image_url: None,
            article_number: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.price.is_none()
            && self.image_url.is_none()
            && self.article_number.is_none()
    }
}

/// How a known product is re-identified on a storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductRef {
    /// Product page URL (Rossmann, Müller, Budni).
    Url(String),
    /// Brand-internal article number (dm's availability API).
    ArticleNumber(String),
}

impl ProductRef {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ProductRef::Url(s) | ProductRef::ArticleNumber(s) => s,
        }
    }
}

/// In-stock state of one product at one saved store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub store_id: String,
    /// `None` when the storefront could not say either way.
    pub available: Option<bool>,
    /// `None` when the storefront reports stock state without a count.
    pub quantity: Option<i64>,
}

/// A brand search-result candidate, compared against receipt line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub brand_name: Option<String>,
    /// Global trade item number, when the search API exposes it.
    pub gtin: Option<String>,
    /// Price as displayed, parsed to euros.
    pub displayed_price: Option<f64>,
}
