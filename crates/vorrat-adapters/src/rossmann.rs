//! Rossmann adapter: HTML scraping behind a session cookie.
//!
//! Product pages only render fully for requests carrying cookies from a
//! real browser visit. The cookie header is acquired once via the browser
//! capability, cached without expiry, and discarded the moment a page
//! comes back without its structural marker (the add-to-cart button) —
//! one fresh acquisition and retry, then the lookup is declared failed.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use vorrat_browser::Browser;
use vorrat_cache::{ArtifactCache, TTL_FOREVER};
use vorrat_core::{AvailabilityRecord, Brand, ProductDetails, ProductRef, StoreListing};

use crate::adapter::BrandAdapter;
use crate::error::AdapterError;
use crate::hours::from_abbreviated_days;
use crate::http::fetch_html;

pub(crate) const CACHE_NAMESPACE: &str = "rossmann_session";
const COOKIE_KEY: &str = "cookies";

/// Marker whose absence means the session cookie no longer works.
const CART_MARKER: &str = "data-cart-add";
/// Products sold offline-only render a banner instead of the cart button.
const STORE_ONLY_BANNER: &str = "Nur in der Filiale verfügbar";

#[derive(Debug, Clone)]
pub struct RossmannEndpoints {
    pub shop_base: String,
    pub storefinder_base: String,
    pub locations_url: String,
}

impl Default for RossmannEndpoints {
    fn default() -> Self {
        Self {
            shop_base: "https://www.rossmann.de".to_string(),
            storefinder_base: "https://www.rossmann.de/storefinder/.rest/store".to_string(),
            locations_url: "https://www.rossmann.de/de/filialen/assets/data/locations.json"
                .to_string(),
        }
    }
}

pub struct RossmannAdapter {
    http: reqwest::Client,
    cache: Arc<ArtifactCache>,
    browser: Arc<dyn Browser>,
    endpoints: RossmannEndpoints,
}

impl RossmannAdapter {
    pub fn new(http: reqwest::Client, cache: Arc<ArtifactCache>, browser: Arc<dyn Browser>) -> Self {
        Self::with_endpoints(http, cache, browser, RossmannEndpoints::default())
    }

    pub fn with_endpoints(
        http: reqwest::Client,
        cache: Arc<ArtifactCache>,
        browser: Arc<dyn Browser>,
        endpoints: RossmannEndpoints,
    ) -> Self {
        Self {
            http,
            cache,
            browser,
            endpoints,
        }
    }

    fn cached_cookie(&self) -> Option<String> {
        self.cache
            .get(CACHE_NAMESPACE, COOKIE_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Visit `url` in the browser and capture its cookies as a header.
    async fn acquire_cookie(&self, url: &str) -> Result<String, AdapterError> {
        let page = self.browser.page().await?;
        let result = async {
            page.navigate(url).await?;
            page.cookie_header().await
        }
        .await;
        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "rossmann cookie page close failed");
        }
        let cookie = result?;

        self.cache.set(
            CACHE_NAMESPACE,
            COOKIE_KEY,
            Value::String(cookie.clone()),
            TTL_FOREVER,
        );
        self.cache.persist(CACHE_NAMESPACE).await;
        Ok(cookie)
    }

    /// Fetch a product page, refreshing the session cookie at most once
    /// when the structural marker is missing.
    async fn product_page(&self, url: &str) -> Result<(String, String), AdapterError> {
        let mut cookie = self.cached_cookie();

        for attempt in 0..2u8 {
            let cookie_value = match cookie.take() {
                Some(c) => c,
                None => self.acquire_cookie(url).await?,
            };

            let (html, final_url) = fetch_html(&self.http, url, Some(&cookie_value)).await?;
            if html.contains(CART_MARKER) || html.contains(STORE_ONLY_BANNER) {
                return Ok((html, final_url));
            }

            self.cache.remove(CACHE_NAMESPACE, COOKIE_KEY);
            if attempt == 0 {
                tracing::debug!(url, "rossmann page lacks cart marker; refreshing session cookie");
            }
        }

        Err(AdapterError::NotFound {
            brand: Brand::Rossmann,
            code: url.to_string(),
        })
    }

    async fn extract_from_page(&self, url: &str, code: &str) -> Result<ProductDetails, AdapterError> {
        let (html, final_url) = self.product_page(url).await?;

        if html.contains(STORE_ONLY_BANNER) {
            return Err(AdapterError::NotFound {
                brand: Brand::Rossmann,
                code: code.to_string(),
            });
        }

        parse_product_html(&html, &final_url).ok_or(AdapterError::NotFound {
            brand: Brand::Rossmann,
            code: code.to_string(),
        })
    }

    async fn resolve_article_number(&self, reference: &ProductRef) -> Result<String, AdapterError> {
        match reference {
            ProductRef::ArticleNumber(dan) => Ok(dan.clone()),
            ProductRef::Url(url) => {
                let details = self.extract_from_page(url, url).await?;
                details.article_number.ok_or_else(|| AdapterError::Parse {
                    context: format!("rossmann page at {url} has no article number"),
                })
            }
        }
    }
}

#[async_trait]
impl BrandAdapter for RossmannAdapter {
    fn brand(&self) -> Brand {
        Brand::Rossmann
    }

    async fn resolve_by_code(&self, code: &str) -> Result<ProductDetails, AdapterError> {
        let url = format!("{}/de/p/{code}", self.endpoints.shop_base);
        self.extract_from_page(&url, code).await
    }

    async fn fetch_product_details(
        &self,
        reference: &ProductRef,
    ) -> Result<ProductDetails, AdapterError> {
        match reference {
            ProductRef::Url(url) => self.extract_from_page(url, url).await,
            ProductRef::ArticleNumber(dan) => Err(AdapterError::Parse {
                context: format!("rossmann details need a product URL, got article number {dan}"),
            }),
        }
    }

    async fn check_store_availability(
        &self,
        reference: &ProductRef,
        store_id: &str,
    ) -> Result<AvailabilityRecord, AdapterError> {
        let dan = self.resolve_article_number(reference).await?;
        let url = format!("{}/{store_id}?dan={dan}", self.endpoints.storefinder_base);

        let mut cookie = self.cached_cookie();
        for attempt in 0..2u8 {
            let cookie_value = match cookie.take() {
                Some(c) => c,
                None => self.acquire_cookie(&self.endpoints.shop_base).await?,
            };

            let (body, _) = fetch_html(&self.http, &url, Some(&cookie_value)).await?;
            // A stale session gets an HTML challenge page instead of JSON.
            if let Ok(json) = serde_json::from_str::<Value>(&body) {
                return Ok(availability_from_storefinder(&json, store_id));
            }

            self.cache.remove(CACHE_NAMESPACE, COOKIE_KEY);
            if attempt == 0 {
                tracing::debug!(store_id, "rossmann storefinder returned non-JSON; refreshing session cookie");
            }
        }

        Err(AdapterError::NotFound {
            brand: Brand::Rossmann,
            code: dan,
        })
    }

    fn availability_reference(&self, details: &ProductDetails) -> Option<ProductRef> {
        details
            .article_number
            .clone()
            .map(ProductRef::ArticleNumber)
            .or_else(|| details.url.clone().map(ProductRef::Url))
    }

    async fn find_stores(&self, search_param: &str) -> Result<Vec<StoreListing>, AdapterError> {
        let (body, _) = fetch_html(&self.http, &self.endpoints.locations_url, None).await?;
        let locations: Value =
            serde_json::from_str(&body).map_err(|source| AdapterError::Deserialize {
                context: self.endpoints.locations_url.clone(),
                source,
            })?;

        let Some(map) = locations.as_object() else {
            return Ok(Vec::new());
        };

        let param = search_param.trim();
        let is_zip = crate::geo::is_zip_code(param);
        let upper = param.to_uppercase();

        let listings = map
            .values()
            .filter(|store| {
                if is_zip && store.get("postalCode").and_then(Value::as_str) == Some(param) {
                    return true;
                }
                ["locality", "address", "name", "city"].iter().any(|key| {
                    store
                        .get(*key)
                        .and_then(Value::as_str)
                        .is_some_and(|v| v.to_uppercase() == upper)
                })
            })
            .filter_map(listing_from_location)
            .collect();

        Ok(listings)
    }
}

fn availability_from_storefinder(json: &Value, store_id: &str) -> AvailabilityRecord {
    let stock = json
        .pointer("/store/productInfo/0/stock")
        .and_then(Value::as_str);

    match stock {
        Some(stock) => AvailabilityRecord {
            store_id: store_id.to_string(),
            available: Some(stock != "0"),
            quantity: Some(if stock == "+5" {
                5
            } else {
                stock.parse().unwrap_or(0)
            }),
        },
        None => AvailabilityRecord {
            store_id: store_id.to_string(),
            available: None,
            quantity: None,
        },
    }
}

/// Pull product data out of the add-to-cart button's `data-*` attributes.
fn parse_product_html(html: &str, final_url: &str) -> Option<ProductDetails> {
    let button_re = Regex::new(r"<button[^>]*data-cart-add[^>]*>").expect("valid regex");
    let attr_re = Regex::new(r#"data-([a-z0-9-]+)\s*=\s*"([^"]*)""#).expect("valid regex");

    let button = button_re.find(html)?.as_str();

    let mut brand_name = None;
    let mut product_name = None;
    let mut price = None;
    let mut article_number = None;
    for capture in attr_re.captures_iter(button) {
        match &capture[1] {
            "product-brand" => brand_name = Some(capture[2].to_string()),
            "product-name" => product_name = Some(capture[2].to_string()),
            "product-price" => price = capture[2].replace(',', ".").parse::<f64>().ok(),
            "product-id" => article_number = Some(capture[2].to_string()),
            _ => {}
        }
    }

    let display_name = format!("{} {}", brand_name?, product_name?);
    let image_url = find_image_by_alt(html, &display_name);

    Some(ProductDetails {
        url: Some(final_url.to_string()),
        name: Some(display_name),
        price,
        image_url,
        article_number,
    })
}

/// The product image is identified by its `alt` text matching the
/// composed display name; lazy-loaded pages carry the real URL in
/// `data-src`.
fn find_image_by_alt(html: &str, alt: &str) -> Option<String> {
    let img_re = Regex::new(&format!(
        r#"<img[^>]*alt\s*=\s*"{}"[^>]*>"#,
        regex::escape(alt)
    ))
    .expect("valid regex");
    let tag = img_re.find(html)?.as_str();

    let src_re = Regex::new(r#"(?:data-src|src)\s*=\s*"([^"]+)""#).expect("valid regex");
    src_re
        .captures(tag)
        .map(|capture| capture[1].to_string())
}

fn listing_from_location(store: &Value) -> Option<StoreListing> {
    let code = store.get("storeCode").map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })?;
    let lat = store.get("lat").and_then(Value::as_f64)?;
    let lng = store.get("lng").and_then(Value::as_f64)?;

    Some(StoreListing {
        data: vorrat_core::StoreData {
            store_id: code.clone(),
            store_number: code,
            address: vorrat_core::StoreAddress {
                name: Some("Rossmann".to_string()),
                street: store
                    .get("address")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                zip: store
                    .get("postalCode")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                city: store
                    .get("locality")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                region_name: store
                    .get("region")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            phone: None,
            coordinates: [lat, lng],
        },
        opening_hours: store
            .get("openingHours")
            .map(from_abbreviated_days)
            .unwrap_or_default(),
    })
}
