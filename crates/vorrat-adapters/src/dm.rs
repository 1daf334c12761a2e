//! dm adapter: the one storefront with a stable public JSON API.
//!
//! Product identity and store availability are plain HTTP. The product
//! *search* API sits behind anti-automation checks, so search requests
//! reuse request headers captured from a real browser navigation, cached
//! without expiry until a fresh acquisition replaces them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use vorrat_browser::Browser;
use vorrat_cache::{ArtifactCache, TTL_FOREVER};
use vorrat_core::{AvailabilityRecord, Brand, ProductDetails, ProductRef, SearchHit, StoreListing};

use crate::adapter::{BrandAdapter, SearchResponse};
use crate::error::AdapterError;
use crate::geo::{get_coordinates, urlencode};
use crate::hours::from_weekday_numbers;
use crate::http::{fetch_json, parse_displayed_price};

pub(crate) const CACHE_NAMESPACE: &str = "dm_session";
const SEARCH_HEADERS_KEY: &str = "search_headers";

#[derive(Debug, Clone)]
pub struct DmEndpoints {
    pub product_base: String,
    pub search_base: String,
    pub store_base: String,
    pub shop_base: String,
    pub nominatim_base: String,
}

impl Default for DmEndpoints {
    fn default() -> Self {
        Self {
            product_base: "https://products.dm.de".to_string(),
            search_base: "https://product-search.services.dmtech.com".to_string(),
            store_base: "https://store-data-service.services.dmtech.com".to_string(),
            shop_base: "https://www.dm.de".to_string(),
            nominatim_base: "https://nominatim.openstreetmap.org".to_string(),
        }
    }
}

pub struct DmAdapter {
    http: reqwest::Client,
    cache: Arc<ArtifactCache>,
    browser: Arc<dyn Browser>,
    endpoints: DmEndpoints,
    intercept_timeout: Duration,
}

impl DmAdapter {
    pub fn new(
        http: reqwest::Client,
        cache: Arc<ArtifactCache>,
        browser: Arc<dyn Browser>,
        intercept_timeout: Duration,
    ) -> Self {
        Self::with_endpoints(http, cache, browser, intercept_timeout, DmEndpoints::default())
    }

    pub fn with_endpoints(
        http: reqwest::Client,
        cache: Arc<ArtifactCache>,
        browser: Arc<dyn Browser>,
        intercept_timeout: Duration,
        endpoints: DmEndpoints,
    ) -> Self {
        Self {
            http,
            cache,
            browser,
            endpoints,
            intercept_timeout,
        }
    }

    fn search_url(&self, query: &str, from: i64, to: i64) -> String {
        format!(
            "{}/de/search?query={}&searchProviderType=dm-products&price.value.from={from}&price.value.to={to}",
            self.endpoints.search_base,
            urlencode(query),
        )
    }

    async fn resolve_article_number(&self, reference: &ProductRef) -> Result<String, AdapterError> {
        match reference {
            ProductRef::ArticleNumber(dan) => Ok(dan.clone()),
            ProductRef::Url(url) => {
                let details = self.fetch_product_details(&ProductRef::Url(url.clone())).await?;
                details.article_number.ok_or_else(|| AdapterError::Parse {
                    context: format!("dm product at {url} has no article number"),
                })
            }
        }
    }

    async fn search_via_cached_headers(
        &self,
        url: &str,
        headers: &Value,
    ) -> Result<Vec<SearchHit>, AdapterError> {
        let mut request = self.http.get(url);
        if let Some(map) = headers.as_object() {
            for (name, value) in map {
                // HTTP/2 pseudo headers and connection-scoped headers are
                // set by the client itself.
                if name.starts_with(':') || matches!(name.as_str(), "host" | "content-length") {
                    continue;
                }
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(AdapterError::Network)?;
        Ok(hits_from_products(&body))
    }

    async fn search_via_browser(&self, url: &str) -> Result<Vec<SearchHit>, AdapterError> {
        let prefix = format!("{}/de/search?query", self.endpoints.search_base);
        let page = self.browser.page().await?;
        let intercepted = page
            .navigate_and_intercept(url, &prefix, self.intercept_timeout)
            .await;
        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "dm search page close failed");
        }
        let intercepted = intercepted?;

        let headers = serde_json::to_value(&intercepted.request_headers).unwrap_or_default();
        self.cache
            .set(CACHE_NAMESPACE, SEARCH_HEADERS_KEY, headers, TTL_FOREVER);
        self.cache.persist(CACHE_NAMESPACE).await;

        Ok(hits_from_products(&intercepted.body))
    }
}

fn hits_from_products(body: &Value) -> Vec<SearchHit> {
    let Some(products) = body.get("products").and_then(Value::as_array) else {
        return Vec::new();
    };

    products
        .iter()
        .filter_map(|product| {
            let title = product.get("title")?.as_str()?.to_string();
            let displayed_price = product
                .pointer("/tileData/price/price/current/value")
                .and_then(Value::as_str)
                .and_then(parse_displayed_price);
            Some(SearchHit {
                title,
                brand_name: product
                    .get("brandName")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                gtin: product.get("gtin").map(stringify),
                displayed_price,
            })
        })
        .collect()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl BrandAdapter for DmAdapter {
    fn brand(&self) -> Brand {
        Brand::Dm
    }

    async fn resolve_by_code(&self, code: &str) -> Result<ProductDetails, AdapterError> {
        let url = format!(
            "{}/product/DE/products/detail/gtin/{code}",
            self.endpoints.product_base
        );

        let json = match fetch_json(&self.http, &url, &[]).await {
            Ok(json) => json,
            Err(AdapterError::Status { status: 404, .. }) => {
                return Err(AdapterError::NotFound {
                    brand: Brand::Dm,
                    code: code.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let path = json
            .get("self")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::Parse {
                context: format!("dm product payload for {code} has no self link"),
            })?;

        Ok(ProductDetails {
            url: Some(format!("{}{path}", self.endpoints.shop_base)),
            name: json
                .pointer("/title/headline")
                .and_then(Value::as_str)
                .map(str::to_string),
            price: json.pointer("/metadata/price").and_then(Value::as_f64),
            image_url: json
                .pointer("/images/0/src")
                .and_then(Value::as_str)
                .map(str::to_string),
            article_number: json.get("dan").map(stringify),
        })
    }

    async fn fetch_product_details(
        &self,
        reference: &ProductRef,
    ) -> Result<ProductDetails, AdapterError> {
        match reference {
            // dm product URLs end in the GTIN: /p/<slug>-p<gtin>.html
            ProductRef::Url(url) => {
                let gtin = url
                    .rsplit_once("-p")
                    .map(|(_, tail)| tail.trim_end_matches(".html"))
                    .filter(|gtin| !gtin.is_empty() && gtin.chars().all(|c| c.is_ascii_digit()))
                    .ok_or_else(|| AdapterError::Parse {
                        context: format!("no GTIN in dm product URL {url}"),
                    })?;
                self.resolve_by_code(gtin).await
            }
            ProductRef::ArticleNumber(dan) => Err(AdapterError::Parse {
                context: format!("dm details need a product URL, got article number {dan}"),
            }),
        }
    }

    async fn check_store_availability(
        &self,
        reference: &ProductRef,
        store_id: &str,
    ) -> Result<AvailabilityRecord, AdapterError> {
        let dan = self.resolve_article_number(reference).await?;
        let url = format!(
            "{}/availability/api/v1/detail/DE/{dan}?pickupStoreId={store_id}",
            self.endpoints.product_base
        );
        let referer = format!("{}/", self.endpoints.shop_base);

        let json = match fetch_json(
            &self.http,
            &url,
            &[
                ("sec-ch-ua-platform", "\"macOS\""),
                ("referer", referer.as_str()),
            ],
        )
        .await
        {
            Ok(json) => json,
            Err(AdapterError::Status { .. }) => {
                return Ok(AvailabilityRecord {
                    store_id: store_id.to_string(),
                    available: None,
                    quantity: Some(0),
                });
            }
            Err(e) => return Err(e),
        };

        let row = json.pointer("/rows/1");
        let quantity = row.map_or(0, |row| {
            extract_quantity(row.get("text").and_then(Value::as_str))
                .or_else(|| extract_quantity(row.get("subText").and_then(Value::as_str)))
                .unwrap_or(0)
        });
        let available = row
            .and_then(|row| row.get("icon"))
            .and_then(Value::as_str)
            .map(|icon| icon == "GREEN");

        Ok(AvailabilityRecord {
            store_id: store_id.to_string(),
            available,
            quantity: Some(quantity),
        })
    }

    fn availability_reference(&self, details: &ProductDetails) -> Option<ProductRef> {
        details
            .article_number
            .clone()
            .map(ProductRef::ArticleNumber)
    }

    async fn search_by_price_window(
        &self,
        query: &str,
        from: i64,
        to: i64,
        force_fresh: bool,
    ) -> Result<SearchResponse, AdapterError> {
        let url = self.search_url(query, from, to);

        if !force_fresh {
            if let Some(headers) = self.cache.get(CACHE_NAMESPACE, SEARCH_HEADERS_KEY) {
                match self.search_via_cached_headers(&url, &headers).await {
                    Ok(hits) if !hits.is_empty() => {
                        return Ok(SearchResponse {
                            hits,
                            from_cached_artifact: true,
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(query, error = %e, "dm search with cached headers failed; acquiring fresh session");
                    }
                }
            }
        }

        let hits = self.search_via_browser(&url).await?;
        Ok(SearchResponse {
            hits,
            from_cached_artifact: false,
        })
    }

    async fn find_stores(&self, search_param: &str) -> Result<Vec<StoreListing>, AdapterError> {
        let (lat, lon) =
            get_coordinates(&self.http, &self.endpoints.nominatim_base, search_param).await?;

        let url = format!(
            "{}/stores/nearby/{lat}%2C{lon}/5?fields=storeId,countryCode,storeNumber,storeUrlPath,openingHours,phone,address,location",
            self.endpoints.store_base
        );
        let json = fetch_json(&self.http, &url, &[]).await?;

        let Some(stores) = json.get("stores").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };

        Ok(stores.iter().filter_map(listing_from_store).collect())
    }
}

fn listing_from_store(store: &Value) -> Option<StoreListing> {
    let store_id = store.get("storeId").map(stringify)?;
    let location_lat = store.pointer("/location/lat").and_then(Value::as_f64)?;
    let location_lon = store.pointer("/location/lon").and_then(Value::as_f64)?;

    Some(StoreListing {
        data: vorrat_core::StoreData {
            store_number: store
                .get("storeNumber")
                .map(stringify)
                .unwrap_or_else(|| store_id.clone()),
            store_id,
            address: store
                .get("address")
                .cloned()
                .and_then(|a| serde_json::from_value(a).ok())
                .unwrap_or_default(),
            phone: store
                .get("phone")
                .and_then(Value::as_str)
                .map(str::to_string),
            coordinates: [location_lat, location_lon],
        },
        opening_hours: store
            .get("openingHours")
            .map(from_weekday_numbers)
            .unwrap_or_default(),
    })
}

/// Pull the unit count out of dm's German availability row text,
/// e.g. `"Verfügbar (4 Stück)"`.
fn extract_quantity(text: Option<&str>) -> Option<i64> {
    let text = text?;
    let (_, tail) = text.split_once("Verfügbar")?;
    let open = tail.find('(')?;
    let close = tail[open..].find(')')? + open;
    let inner = tail[open + 1..close].trim();
    let digits: String = inner.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() || !inner.ends_with("Stück") {
        return None;
    }
    digits.parse().ok()
}
