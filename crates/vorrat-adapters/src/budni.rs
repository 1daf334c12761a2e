//! Budni adapter: HTML scraping behind a session cookie.
//!
//! The search page answers with product links only for cookie-carrying
//! sessions; the cookie is cached without expiry and refreshed at most
//! once per lookup when the page structure goes missing. A search that
//! yields anything other than exactly one distinct product link is
//! rejected as ambiguous.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use vorrat_browser::Browser;
use vorrat_cache::{ArtifactCache, TTL_FOREVER};
use vorrat_core::{AvailabilityRecord, Brand, ProductDetails, ProductRef, StoreListing};

use crate::adapter::BrandAdapter;
use crate::error::AdapterError;
use crate::geo::{get_coordinates, haversine_km};
use crate::hours::from_working_days_summary;
use crate::http::{fetch_html, fetch_json};

pub(crate) const CACHE_NAMESPACE: &str = "budni_session";
const COOKIE_KEY: &str = "cookies";

/// Marker whose absence means the session cookie no longer works: every
/// assortment page links into the product catalog.
const CATALOG_MARKER: &str = "/sortiment/produkte";

#[derive(Debug, Clone)]
pub struct BudniEndpoints {
    pub shop_base: String,
    pub stocks_base: String,
    pub markets_url: String,
    pub nominatim_base: String,
}

impl Default for BudniEndpoints {
    fn default() -> Self {
        Self {
            shop_base: "https://www.budni.de".to_string(),
            stocks_base: "https://www.budni.de/api/stocks/api/v1".to_string(),
            markets_url: "https://www.budni.de/api/markets".to_string(),
            nominatim_base: "https://nominatim.openstreetmap.org".to_string(),
        }
    }
}

pub struct BudniAdapter {
    http: reqwest::Client,
    cache: Arc<ArtifactCache>,
    browser: Arc<dyn Browser>,
    endpoints: BudniEndpoints,
}

impl BudniAdapter {
    pub fn new(http: reqwest::Client, cache: Arc<ArtifactCache>, browser: Arc<dyn Browser>) -> Self {
        Self::with_endpoints(http, cache, browser, BudniEndpoints::default())
    }

    pub fn with_endpoints(
        http: reqwest::Client,
        cache: Arc<ArtifactCache>,
        browser: Arc<dyn Browser>,
        endpoints: BudniEndpoints,
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

    async fn acquire_cookie(&self) -> Result<String, AdapterError> {
        let page = self.browser.page().await?;
        let result = async {
            page.navigate(&self.endpoints.shop_base).await?;
            page.cookie_header().await
        }
        .await;
        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "budni cookie page close failed");
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

    /// Fetch a shop page, refreshing the session cookie at most once when
    /// the catalog structure is missing from the response.
    async fn shop_page(&self, url: &str) -> Result<String, AdapterError> {
        let mut cookie = self.cached_cookie();

        for attempt in 0..2u8 {
            let cookie_value = match cookie.take() {
                Some(c) => c,
                None => self.acquire_cookie().await?,
            };

            let (html, _) = fetch_html(&self.http, url, Some(&cookie_value)).await?;
            if html.contains(CATALOG_MARKER) {
                return Ok(html);
            }

            self.cache.remove(CACHE_NAMESPACE, COOKIE_KEY);
            if attempt == 0 {
                tracing::debug!(url, "budni page lacks catalog links; refreshing session cookie");
            }
        }

        Err(AdapterError::NotFound {
            brand: Brand::Budni,
            code: url.to_string(),
        })
    }

    /// Search by barcode; accept only an unambiguous single-product page.
    async fn product_url_for_code(&self, code: &str) -> Result<String, AdapterError> {
        let url = format!("{}/sortiment/produkte?search={code}", self.endpoints.shop_base);
        let html = self.shop_page(&url).await?;

        let links = product_links(&html);
        if links.len() == 1 {
            Ok(format!("{}{}", self.endpoints.shop_base, links[0]))
        } else {
            tracing::debug!(code, hits = links.len(), "budni search was not unambiguous");
            Err(AdapterError::NotFound {
                brand: Brand::Budni,
                code: code.to_string(),
            })
        }
    }
}

#[async_trait]
impl BrandAdapter for BudniAdapter {
    fn brand(&self) -> Brand {
        Brand::Budni
    }

    async fn resolve_by_code(&self, code: &str) -> Result<ProductDetails, AdapterError> {
        let url = self.product_url_for_code(code).await?;
        self.fetch_product_details(&ProductRef::Url(url)).await
    }

    async fn fetch_product_details(
        &self,
        reference: &ProductRef,
    ) -> Result<ProductDetails, AdapterError> {
        let ProductRef::Url(url) = reference else {
            return Err(AdapterError::Parse {
                context: "budni details need a product URL".to_string(),
            });
        };

        let html = self.shop_page(url).await?;
        Ok(parse_product_page(&html, url, &self.endpoints.shop_base))
    }

    async fn check_store_availability(
        &self,
        reference: &ProductRef,
        store_id: &str,
    ) -> Result<AvailabilityRecord, AdapterError> {
        let ProductRef::Url(url) = reference else {
            return Err(AdapterError::Parse {
                context: "budni availability needs a product URL".to_string(),
            });
        };
        let article_id = article_number_from_url(url).ok_or_else(|| AdapterError::Parse {
            context: format!("no article id in budni URL {url}"),
        })?;

        let status_url = format!(
            "{}/Stocks/markets/{store_id}/article-id/{article_id}/status",
            self.endpoints.stocks_base
        );
        let json = fetch_json(&self.http, &status_url, &[]).await?;

        let available = json.get("status").and_then(Value::as_str) == Some("inStock");
        let quantity = if available {
            json.get("quantity").and_then(Value::as_i64).unwrap_or(0)
        } else {
            0
        };

        Ok(AvailabilityRecord {
            store_id: store_id.to_string(),
            available: Some(available),
            quantity: Some(quantity),
        })
    }

    async fn find_stores(&self, search_param: &str) -> Result<Vec<StoreListing>, AdapterError> {
        let markets = fetch_json(&self.http, &self.endpoints.markets_url, &[]).await?;
        let Some(markets) = markets.as_array() else {
            return Ok(Vec::new());
        };

        let (lat, lon) =
            get_coordinates(&self.http, &self.endpoints.nominatim_base, search_param).await?;

        let mut ranked: Vec<(f64, StoreListing)> = markets
            .iter()
            .filter_map(|market| {
                let listing = listing_from_market(market)?;
                let [market_lat, market_lon] = listing.data.coordinates;
                Some((haversine_km(lat, lon, market_lat, market_lon), listing))
            })
            .collect();

        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked.into_iter().take(5).map(|(_, listing)| listing).collect())
    }
}

/// Distinct catalog links on a search result page, in first-seen order.
fn product_links(html: &str) -> Vec<String> {
    let href_re = Regex::new(r#"href\s*=\s*"(/sortiment/produkte/[^"?#]+)""#).expect("valid regex");
    let mut links = Vec::new();
    for capture in href_re.captures_iter(html) {
        let link = capture[1].to_string();
        if !links.contains(&link) {
            links.push(link);
        }
    }
    links
}

fn parse_product_page(html: &str, url: &str, shop_base: &str) -> ProductDetails {
    let price_re = Regex::new(r"(\d{1,3},\d{2})\s*€").expect("valid regex");
    let price = price_re
        .captures(html)
        .and_then(|capture| capture[1].replace(',', ".").parse::<f64>().ok());

    ProductDetails {
        url: Some(url.to_string()),
        name: None,
        price,
        image_url: find_product_image(html, shop_base),
        article_number: article_number_from_url(url),
    }
}

/// The product photo is the image whose `alt` text mentions "product".
fn find_product_image(html: &str, shop_base: &str) -> Option<String> {
    let img_re = Regex::new(r"<img[^>]*>").expect("valid regex");
    let alt_re = Regex::new(r#"alt\s*=\s*"([^"]*)""#).expect("valid regex");
    let src_re = Regex::new(r#"src\s*=\s*"([^"]+)""#).expect("valid regex");

    for tag in img_re.find_iter(html) {
        let tag = tag.as_str();
        let alt_matches = alt_re
            .captures(tag)
            .is_some_and(|c| c[1].to_ascii_lowercase().contains("product"));
        if !alt_matches {
            continue;
        }
        if let Some(src) = src_re.captures(tag).map(|c| c[1].to_string()) {
            return Some(if src.starts_with('/') {
                format!("{shop_base}{src}")
            } else {
                src
            });
        }
    }
    None
}

fn article_number_from_url(url: &str) -> Option<String> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn listing_from_market(market: &Value) -> Option<StoreListing> {
    let id = market.get("id").map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })?;
    let lat = market.pointer("/contact/latitude").and_then(Value::as_f64)?;
    let lon = market.pointer("/contact/longitude").and_then(Value::as_f64)?;

    Some(StoreListing {
        data: vorrat_core::StoreData {
            store_id: id.clone(),
            store_number: id,
            address: vorrat_core::StoreAddress {
                name: market
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                street: market
                    .pointer("/contact/streetAndNumber")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                zip: market
                    .pointer("/contact/zip")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                city: market
                    .pointer("/contact/city")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                region_name: None,
            },
            phone: None,
            coordinates: [lat, lon],
        },
        opening_hours: market
            .get("workingDaysSummary")
            .and_then(Value::as_str)
            .map(from_working_days_summary)
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_links_dedupes_and_strips_queries() {
        let html = r#"
            <a href="/sortiment/produkte/zahncreme-123">x</a>
            <a href="/sortiment/produkte/zahncreme-123">x again</a>
            <a href="/sortiment/marken">not a product</a>
        "#;
        assert_eq!(product_links(html), vec!["/sortiment/produkte/zahncreme-123"]);
    }

    #[test]
    fn multiple_distinct_links_mean_ambiguity() {
        let html = r#"
            <a href="/sortiment/produkte/a-1">a</a>
            <a href="/sortiment/produkte/b-2">b</a>
        "#;
        assert_eq!(product_links(html).len(), 2);
    }

    #[test]
    fn parses_price_image_and_article_number() {
        let html = r#"
            <div>/sortiment/produkte</div>
            <span>2,49 €</span>
            <img alt="Product photo" src="/media/zahncreme.jpg">
        "#;
        let details = parse_product_page(
            html,
            "https://www.budni.de/sortiment/produkte/zahncreme-123",
            "https://www.budni.de",
        );
        assert_eq!(details.price, Some(2.49));
        assert_eq!(
            details.image_url.as_deref(),
            Some("https://www.budni.de/media/zahncreme.jpg")
        );
        assert_eq!(details.article_number.as_deref(), Some("zahncreme-123"));
    }

    #[test]
    fn market_listing_parses_contact_block() {
        let market = serde_json::json!({
            "id": 412131,
            "name": "BUDNI Eppendorf",
            "workingDaysSummary": "Mo-Sa: 8:00-20:00",
            "contact": {
                "streetAndNumber": "Eppendorfer Landstr. 1",
                "zip": "20249",
                "city": "Hamburg",
                "latitude": 53.59,
                "longitude": 9.98
            }
        });
        let listing = listing_from_market(&market).unwrap();
        assert_eq!(listing.data.store_id, "412131");
        assert_eq!(listing.data.address.zip.as_deref(), Some("20249"));
        assert_eq!(listing.opening_hours.saturday[0].close, "20:00");
        assert!(listing.opening_hours.sunday.is_empty());
    }
}
