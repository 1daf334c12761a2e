//! Integration tests for `DmAdapter` against a local mock of the dm APIs.
//!
//! Uses `wiremock` so no real network traffic is made; the browser
//! capability is the unavailable stub, which also proves the plain-HTTP
//! paths never touch it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vorrat_adapters::dm::{DmAdapter, DmEndpoints};
use vorrat_adapters::{AdapterError, BrandAdapter};
use vorrat_browser::UnavailableBrowser;
use vorrat_cache::{ArtifactCache, TTL_FOREVER};
use vorrat_core::{ProductRef, SearchHit};

fn adapter_for(server: &MockServer, cache: Arc<ArtifactCache>) -> DmAdapter {
    let endpoints = DmEndpoints {
        product_base: server.uri(),
        search_base: server.uri(),
        store_base: server.uri(),
        shop_base: "https://www.dm.de".to_string(),
        nominatim_base: server.uri(),
    };
    let http = vorrat_adapters::build_http_client(5, "vorrat-test/0.1").expect("http client");
    DmAdapter::with_endpoints(
        http,
        cache,
        Arc::new(UnavailableBrowser),
        Duration::from_secs(1),
        endpoints,
    )
}

fn empty_cache() -> Arc<ArtifactCache> {
    Arc::new(ArtifactCache::new("./unused-cache"))
}

#[tokio::test]
async fn resolve_by_code_extracts_price_image_and_article_number() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/product/DE/products/detail/gtin/4010355570036"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "gtin": "4010355570036",
            "dan": 595420,
            "self": "/p/balea-shampoo-p4010355570036.html",
            "metadata": {"price": 2.95},
            "images": [{"src": "https://media.dm.de/images/balea.png"}]
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server, empty_cache());
    let details = adapter.resolve_by_code("4010355570036").await.expect("resolve");

    assert_eq!(details.price, Some(2.95));
    assert_eq!(details.article_number.as_deref(), Some("595420"));
    assert_eq!(
        details.url.as_deref(),
        Some("https://www.dm.de/p/balea-shampoo-p4010355570036.html")
    );
    assert_eq!(
        details.image_url.as_deref(),
        Some("https://media.dm.de/images/balea.png")
    );
}

#[tokio::test]
async fn resolve_by_code_maps_404_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/product/DE/products/detail/gtin/0000000000000"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server, empty_cache());
    let result = adapter.resolve_by_code("0000000000000").await;
    assert!(
        matches!(result, Err(AdapterError::NotFound { .. })),
        "expected NotFound, got: {result:?}"
    );
}

#[tokio::test]
async fn availability_parses_german_quantity_row() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/availability/api/v1/detail/DE/595420"))
        .and(query_param("pickupStoreId", "2711"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "rows": [
                {"text": "dm-Markt Schlossstraße"},
                {"icon": "GREEN", "text": "Verfügbar (7 Stück)"}
            ]
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server, empty_cache());
    let record = adapter
        .check_store_availability(&ProductRef::ArticleNumber("595420".to_string()), "2711")
        .await
        .expect("availability");

    assert_eq!(record.store_id, "2711");
    assert_eq!(record.available, Some(true));
    assert_eq!(record.quantity, Some(7));
}

#[tokio::test]
async fn availability_upstream_error_degrades_to_unknown() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/availability/api/v1/detail/DE/595420"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server, empty_cache());
    let record = adapter
        .check_store_availability(&ProductRef::ArticleNumber("595420".to_string()), "2711")
        .await
        .expect("availability must not fail on upstream 5xx");

    assert_eq!(record.available, None);
    assert_eq!(record.quantity, Some(0));
}

#[tokio::test]
async fn search_uses_cached_session_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/de/search"))
        .and(query_param("query", "balea shampoo"))
        .and(query_param("price.value.from", "2"))
        .and(query_param("price.value.to", "3"))
        .and(wiremock::matchers::header("x-session", "cached-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "products": [{
                "title": "Balea Shampoo Volumen",
                "brandName": "Balea",
                "gtin": "4010355570036",
                "tileData": {"price": {"price": {"current": {"value": "2,95 €"}}}}
            }]
        })))
        .mount(&server)
        .await;

    let cache = empty_cache();
    cache.set(
        "dm_session",
        "search_headers",
        json!({"x-session": "cached-token"}),
        TTL_FOREVER,
    );

    let adapter = adapter_for(&server, cache);
    let response = adapter
        .search_by_price_window("balea shampoo", 2, 3, false)
        .await
        .expect("search");

    assert!(response.from_cached_artifact);
    assert_eq!(
        response.hits,
        vec![SearchHit {
            title: "Balea Shampoo Volumen".to_string(),
            brand_name: Some("Balea".to_string()),
            gtin: Some("4010355570036".to_string()),
            displayed_price: Some(2.95),
        }]
    );
}

#[tokio::test]
async fn search_without_session_artifact_needs_the_browser() {
    let server = MockServer::start().await;
    let adapter = adapter_for(&server, empty_cache());

    // No cached headers and no browser: the fresh-session path must
    // surface a typed automation error, not panic or hang.
    let result = adapter.search_by_price_window("balea", 2, 3, false).await;
    assert!(
        matches!(result, Err(AdapterError::Automation(_))),
        "expected Automation error, got: {result:?}"
    );
}

#[tokio::test]
async fn fetch_product_details_reuses_gtin_embedded_in_url() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/product/DE/products/detail/gtin/4010355570036"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "dan": "595420",
            "self": "/p/balea-shampoo-p4010355570036.html",
            "metadata": {"price": 3.15},
            "images": []
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server, empty_cache());
    let details = adapter
        .fetch_product_details(&ProductRef::Url(
            "https://www.dm.de/p/balea-shampoo-p4010355570036.html".to_string(),
        ))
        .await
        .expect("details");

    assert_eq!(details.price, Some(3.15));
}
