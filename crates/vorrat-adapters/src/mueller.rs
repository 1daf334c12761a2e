//! Müller adapter: the storefront without any scrape-friendly API.
//!
//! Search results live inside the Next.js flight payload embedded in the
//! page's script tags; product pages carry a JSON-LD `Product` block; and
//! store stock only surfaces as a backend response fired while a real
//! page load runs, so availability checks drive a browser page and wait
//! for the intercepted response, bounded by the configured timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use vorrat_browser::Browser;
use vorrat_core::{AvailabilityRecord, Brand, ProductDetails, ProductRef, StoreListing};

use crate::adapter::BrandAdapter;
use crate::error::AdapterError;
use crate::geo::is_zip_code;
use crate::hours::from_lowercase_days;
use crate::http::fetch_html;

#[derive(Debug, Clone)]
pub struct MuellerEndpoints {
    pub shop_base: String,
    pub backend_prefix: String,
}

impl Default for MuellerEndpoints {
    fn default() -> Self {
        Self {
            shop_base: "https://www.mueller.de".to_string(),
            backend_prefix: "https://backend.prod.ecom.mueller.de".to_string(),
        }
    }
}

pub struct MuellerAdapter {
    http: reqwest::Client,
    browser: Arc<dyn Browser>,
    endpoints: MuellerEndpoints,
    intercept_timeout: Duration,
}

impl MuellerAdapter {
    pub fn new(
        http: reqwest::Client,
        browser: Arc<dyn Browser>,
        intercept_timeout: Duration,
    ) -> Self {
        Self::with_endpoints(http, browser, intercept_timeout, MuellerEndpoints::default())
    }

    pub fn with_endpoints(
        http: reqwest::Client,
        browser: Arc<dyn Browser>,
        intercept_timeout: Duration,
        endpoints: MuellerEndpoints,
    ) -> Self {
        Self {
            http,
            browser,
            endpoints,
            intercept_timeout,
        }
    }

    fn stock_response_prefix(&self) -> String {
        format!(
            "{}/?operatingChain=B2C_DE_Store&operationName=GetStoreStockForProductV2",
            self.endpoints.backend_prefix
        )
    }

    fn stores_response_prefix(&self) -> String {
        format!(
            "{}/?operatingChain=B2C_DE_Store&operationName=GetStoresByIds",
            self.endpoints.backend_prefix
        )
    }
}

#[async_trait]
impl BrandAdapter for MuellerAdapter {
    fn brand(&self) -> Brand {
        Brand::Mueller
    }

    async fn resolve_by_code(&self, code: &str) -> Result<ProductDetails, AdapterError> {
        let url = format!("{}/search/?q={code}", self.endpoints.shop_base);
        let (html, _) = fetch_html(&self.http, &url, None).await?;

        if html.contains(&format!("Ihre Suche nach {code} ergab leider keine Treffer")) {
            return Err(AdapterError::NotFound {
                brand: Brand::Mueller,
                code: code.to_string(),
            });
        }

        let products = flight_payload(&html)
            .as_deref()
            .and_then(extract_products)
            .unwrap_or_default();

        let Some(path) = products
            .first()
            .and_then(|p| p.get("path"))
            .and_then(Value::as_str)
        else {
            return Err(AdapterError::NotFound {
                brand: Brand::Mueller,
                code: code.to_string(),
            });
        };

        let product_url = format!("{}{path}", self.endpoints.shop_base);
        self.fetch_product_details(&ProductRef::Url(product_url))
            .await
    }

    async fn fetch_product_details(
        &self,
        reference: &ProductRef,
    ) -> Result<ProductDetails, AdapterError> {
        let ProductRef::Url(url) = reference else {
            return Err(AdapterError::Parse {
                context: "mueller details need a product URL".to_string(),
            });
        };

        let (html, final_url) = fetch_html(&self.http, url, None).await?;
        let product = extract_jsonld_product(&html).ok_or_else(|| AdapterError::Parse {
            context: format!("no JSON-LD product block at {url}"),
        })?;

        Ok(ProductDetails {
            url: Some(final_url),
            name: product
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
            price: product.pointer("/offers/0/price").and_then(price_value),
            image_url: product
                .pointer("/image/0")
                .and_then(Value::as_str)
                .map(str::to_string),
            article_number: product
                .get("sku")
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
        })
    }

    async fn check_store_availability(
        &self,
        reference: &ProductRef,
        store_id: &str,
    ) -> Result<AvailabilityRecord, AdapterError> {
        let ProductRef::Url(url) = reference else {
            return Err(AdapterError::Parse {
                context: "mueller availability needs a product URL".to_string(),
            });
        };

        let page = self.browser.page().await?;
        let result = async {
            // Seed the store choice before the product page queries stock.
            page.navigate(&self.endpoints.shop_base).await?;
            page.set_local_storage("preferredStoreId", store_id).await?;
            page.navigate_and_intercept(url, &self.stock_response_prefix(), self.intercept_timeout)
                .await
        }
        .await;
        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "mueller availability page close failed");
        }
        let intercepted = result?;

        let stock = intercepted.body.pointer("/data/getStoreStockForProductV2");
        let available = match stock {
            Some(Value::Bool(b)) => Some(*b),
            Some(Value::Null) | None => None,
            Some(_) => Some(true),
        };

        Ok(AvailabilityRecord {
            store_id: store_id.to_string(),
            available,
            quantity: None,
        })
    }

    async fn find_stores(&self, search_param: &str) -> Result<Vec<StoreListing>, AdapterError> {
        let url = format!(
            "{}/storefinder/?search={}",
            self.endpoints.shop_base,
            crate::geo::urlencode(search_param)
        );

        let page = self.browser.page().await?;
        let result = page
            .navigate_and_intercept(&url, &self.stores_response_prefix(), self.intercept_timeout)
            .await;
        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "mueller storefinder page close failed");
        }
        let intercepted = result?;

        let Some(stores) = intercepted
            .body
            .pointer("/data/getStoresByIds")
            .and_then(Value::as_array)
        else {
            return Ok(Vec::new());
        };

        let listings: Vec<StoreListing> = stores.iter().filter_map(listing_from_store).collect();

        // A ZIP query narrows to exact matches when any exist.
        if is_zip_code(search_param) {
            let filtered: Vec<StoreListing> = listings
                .iter()
                .filter(|l| l.data.address.zip.as_deref() == Some(search_param.trim()))
                .cloned()
                .collect();
            if !filtered.is_empty() {
                return Ok(filtered);
            }
        }

        Ok(listings)
    }
}

/// Reassemble the Next.js flight payload from the page's push-chunk
/// scripts and isolate the component segment holding the product list.
fn flight_payload(html: &str) -> Option<String> {
    let script_re = Regex::new(r"(?s)<script[^>]*>(.*?)</script>").expect("valid regex");

    let mut text = String::new();
    for capture in script_re.captures_iter(html) {
        let content = capture[1].trim();
        if content.contains("self.__next_f.push([1") {
            text.push_str(content);
        }
    }
    if text.is_empty() {
        return None;
    }

    let text = text
        .replace("\"])self.__next_f.push([1,\"", "")
        .replace("\\\"", "\"");

    text.split("\"components\":")
        .find(|segment| segment.contains("\"type\":\"product-list\""))
        .map(str::to_string)
}

/// Cut the `"products":[…]` array out of the flight segment by balanced
/// bracket scanning — the payload is not valid JSON as a whole, so the
/// array has to be isolated before parsing.
fn extract_products(text: &str) -> Option<Vec<Value>> {
    let start = text.find("\"products\":")?;
    let array_start = text[start..].find('[')? + start;

    let bytes = text.as_bytes();
    let mut bracket_count = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (offset, &byte) in bytes[array_start..].iter().enumerate() {
        if escape {
            escape = false;
            continue;
        }
        match byte {
            b'\\' => escape = true,
            b'"' => in_string = !in_string,
            b'[' if !in_string => bracket_count += 1,
            b']' if !in_string => {
                bracket_count -= 1;
                if bracket_count == 0 {
                    let array_str = &text[array_start..=array_start + offset];
                    return serde_json::from_str::<Vec<Value>>(array_str).ok();
                }
            }
            _ => {}
        }
    }

    None
}

/// First JSON-LD block on the page whose `@type` is `Product`.
fn extract_jsonld_product(html: &str) -> Option<Value> {
    let script_re =
        Regex::new(r#"(?s)<script[^>]*type="application/ld\+json"[^>]*>(.*?)</script>"#)
            .expect("valid regex");

    for capture in script_re.captures_iter(html) {
        if let Ok(json) = serde_json::from_str::<Value>(capture[1].trim()) {
            if json.get("@type").and_then(Value::as_str) == Some("Product") {
                return Some(json);
            }
        }
    }
    None
}

fn price_value(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn listing_from_store(store: &Value) -> Option<StoreListing> {
    let code = store.get("code").map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })?;
    let lat = store.pointer("/geoLocation/lat").and_then(Value::as_f64)?;
    let lng = store.pointer("/geoLocation/lng").and_then(Value::as_f64)?;

    Some(StoreListing {
        data: vorrat_core::StoreData {
            store_id: code.clone(),
            store_number: code,
            address: vorrat_core::StoreAddress {
                name: store
                    .pointer("/company/name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                street: store
                    .pointer("/address/street")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                zip: store
                    .pointer("/address/zip")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                city: store
                    .pointer("/address/town")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                region_name: None,
            },
            phone: store
                .get("phone")
                .and_then(Value::as_str)
                .map(str::to_string),
            coordinates: [lat, lng],
        },
        opening_hours: store
            .get("openingHours")
            .map(from_lowercase_days)
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_products_handles_nested_brackets_and_strings() {
        let text = r#"prefix "products":[{"path":"/p/duschgel-123","tags":["a]b","c"],"nested":[1,[2,3]]}] suffix"#;
        let products = extract_products(text).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(
            products[0].get("path").and_then(Value::as_str),
            Some("/p/duschgel-123")
        );
    }

    #[test]
    fn extract_products_without_marker_is_none() {
        assert!(extract_products("no array here").is_none());
        assert!(extract_products(r#""products": oops"#).is_none());
    }

    #[test]
    fn extract_products_respects_escaped_quotes() {
        let text = r#""products":[{"name":"say \"hi\" [ok]"}]"#;
        let products = extract_products(text).unwrap();
        assert_eq!(
            products[0].get("name").and_then(Value::as_str),
            Some(r#"say "hi" [ok]"#)
        );
    }

    #[test]
    fn flight_payload_reassembles_push_chunks() {
        let html = concat!(
            r#"<script>self.__next_f.push([1,"{\"components\":{\"type\":\"product-list\","#,
            r#"\"products\":[{\"path\":\"/p/x-1\"}]}"])self.__next_f.push([1,"tail"])</script>"#,
        );
        let segment = flight_payload(html).unwrap();
        assert!(segment.contains(r#""type":"product-list""#));
        let products = extract_products(&segment).unwrap();
        assert_eq!(
            products[0].get("path").and_then(Value::as_str),
            Some("/p/x-1")
        );
    }

    #[test]
    fn jsonld_product_block_is_found_among_others() {
        let html = r#"
            <script type="application/ld+json">{"@type":"Organization","name":"Müller"}</script>
            <script type="application/ld+json">
                {"@type":"Product","sku":"100027","offers":[{"price":"4.95"}],"image":["https://m.de/i.jpg"]}
            </script>
        "#;
        let product = extract_jsonld_product(html).unwrap();
        assert_eq!(product.get("sku").and_then(Value::as_str), Some("100027"));
        assert_eq!(product.pointer("/offers/0/price").and_then(price_value), Some(4.95));
    }

    #[test]
    fn store_listing_reads_geo_and_address() {
        let store = serde_json::json!({
            "code": "MU-77",
            "company": {"name": "Müller Handels GmbH"},
            "address": {"street": "Bahnhofstr. 3", "zip": "89073", "town": "Ulm"},
            "phone": "+49 731 000",
            "geoLocation": {"lat": 48.399, "lng": 9.993},
            "openingHours": [
                {"day": "monday", "openingTime": "09:00", "closingTime": "20:00"}
            ]
        });
        let listing = listing_from_store(&store).unwrap();
        assert_eq!(listing.data.store_id, "MU-77");
        assert_eq!(listing.data.address.city.as_deref(), Some("Ulm"));
        assert_eq!(listing.opening_hours.monday[0].close, "20:00");
    }
}
