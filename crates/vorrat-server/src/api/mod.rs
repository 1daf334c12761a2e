mod articles;
mod brand;
mod lookup;
mod receipt;
mod stores;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use vorrat_adapters::{BrandAdapter, OpenFoodFacts};
use vorrat_core::{AppConfig, Brand};
use vorrat_receipt::ReceiptMatcher;

use crate::lifecycle::Lifecycle;
use crate::middleware::{request_id, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub adapters: Arc<Vec<Arc<dyn BrandAdapter>>>,
    pub lifecycle: Arc<Lifecycle>,
    pub matcher: Arc<ReceiptMatcher>,
    pub catalog: Arc<OpenFoodFacts>,
}

impl AppState {
    /// The adapter for an active brand, `None` when the brand is not in
    /// the configured set.
    #[must_use]
    pub fn adapter_for(&self, brand: Brand) -> Option<Arc<dyn BrandAdapter>> {
        self.adapters
            .iter()
            .find(|adapter| adapter.brand() == brand)
            .cloned()
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &vorrat_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

/// Parse a `{brand}` path segment, rejecting unknown and inactive brands.
pub(super) fn parse_active_brand(
    state: &AppState,
    raw: &str,
    request_id: &str,
) -> Result<(Brand, Arc<dyn BrandAdapter>), ApiError> {
    let brand: Brand = raw.parse().map_err(|_| {
        ApiError::new(
            request_id.to_string(),
            "validation_error",
            format!("unknown brand '{raw}'"),
        )
    })?;

    let adapter = state.adapter_for(brand).ok_or_else(|| {
        ApiError::new(
            request_id.to_string(),
            "not_found",
            format!("brand '{brand}' is not active"),
        )
    })?;

    Ok((brand, adapter))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/lookup/{code}", get(lookup::lookup_code))
        .route(
            "/api/v1/articles",
            get(articles::list_articles).post(articles::create_article),
        )
        .route(
            "/api/v1/articles/{ean}",
            get(articles::get_article).delete(articles::delete_article),
        )
        .route(
            "/api/v1/articles/{ean}/prices",
            put(articles::update_prices),
        )
        .route(
            "/api/v1/articles/{ean}/availability",
            put(articles::update_availability),
        )
        .route("/api/v1/{brand}/ean/{ean}", get(brand::resolve_ean))
        .route("/api/v1/{brand}/product", get(brand::product_details))
        .route(
            "/api/v1/{brand}/store/product",
            get(brand::store_availability),
        )
        .route(
            "/api/v1/{brand}/stores",
            get(stores::saved_stores).post(stores::save_store),
        )
        .route(
            "/api/v1/{brand}/stores/search/{param}",
            get(stores::search_stores),
        )
        .route(
            "/api/v1/{brand}/stores/{store_id}",
            delete(stores::delete_store),
        )
        .route("/api/v1/{brand}/receipt", post(receipt::upload_receipt))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match vorrat_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use vorrat_adapters::AdapterError;
    use vorrat_core::{
        AvailabilityRecord, MatcherTuning, ProductDetails, ProductRef, StoreListing,
    };

    use super::*;

    #[test]
    fn api_error_codes_map_to_statuses() {
        let cases = [
            ("not_found", StatusCode::NOT_FOUND),
            ("validation_error", StatusCode::BAD_REQUEST),
            ("bad_request", StatusCode::BAD_REQUEST),
            ("conflict", StatusCode::CONFLICT),
            ("upstream_error", StatusCode::BAD_GATEWAY),
            ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, status) in cases {
            let response = ApiError::new("req-1", code, "message").into_response();
            assert_eq!(response.status(), status, "code {code}");
        }
    }

    /// Stub adapter so dm counts as an active brand in route tests.
    struct StubAdapter;

    #[async_trait]
    impl BrandAdapter for StubAdapter {
        fn brand(&self) -> Brand {
            Brand::Dm
        }

        async fn resolve_by_code(&self, code: &str) -> Result<ProductDetails, AdapterError> {
            Err(AdapterError::NotFound {
                brand: Brand::Dm,
                code: code.to_string(),
            })
        }

        async fn fetch_product_details(
            &self,
            _reference: &ProductRef,
        ) -> Result<ProductDetails, AdapterError> {
            Ok(ProductDetails::empty())
        }

        async fn check_store_availability(
            &self,
            _reference: &ProductRef,
            store_id: &str,
        ) -> Result<AvailabilityRecord, AdapterError> {
            Ok(AvailabilityRecord {
                store_id: store_id.to_string(),
                available: None,
                quantity: None,
            })
        }

        async fn find_stores(&self, _search_param: &str) -> Result<Vec<StoreListing>, AdapterError> {
            Ok(Vec::new())
        }
    }

    fn test_state(pool: SqlitePool) -> AppState {
        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".to_string(),
            env: vorrat_core::Environment::Test,
            bind_addr: "127.0.0.1:0".parse().expect("addr"),
            log_level: "info".to_string(),
            cache_dir: "./cache".into(),
            brands: vec![Brand::Dm],
            price_threshold_days: 7,
            availability_threshold_days: 2,
            stores_per_brand: 4,
            http_timeout_secs: 5,
            user_agent: "vorrat-test/0.1".to_string(),
            browser_max_pages: 1,
            intercept_timeout_secs: 1,
            matcher: MatcherTuning::default(),
        });

        let adapters: Vec<Arc<dyn BrandAdapter>> = vec![Arc::new(StubAdapter)];
        let lifecycle = Lifecycle::new(pool.clone(), adapters.clone(), vec![Brand::Dm], 7, 2);
        let http = vorrat_adapters::build_http_client(5, "vorrat-test/0.1").expect("http client");

        AppState {
            pool,
            config,
            adapters: Arc::new(adapters),
            lifecycle: Arc::new(lifecycle),
            matcher: Arc::new(ReceiptMatcher::new(MatcherTuning::default())),
            catalog: Arc::new(OpenFoodFacts::new(http)),
        }
    }

    fn store_body(store_id: &str) -> String {
        serde_json::json!({
            "data": {
                "storeId": store_id,
                "storeNumber": store_id,
                "address": {"name": "dm", "street": null, "zip": "20095", "city": "Hamburg", "regionName": null},
                "phone": null,
                "coordinates": [53.55, 9.99]
            },
            "openingHours": {}
        })
        .to_string()
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_reports_ok_with_live_database(pool: SqlitePool) {
        let app = build_app(test_state(pool));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["data"]["status"], "ok");
        assert!(json["meta"]["request_id"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_article_is_a_not_found_envelope(pool: SqlitePool) {
        let app = build_app(test_state(pool));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/articles/0000000000000")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["error"]["code"], "not_found");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn fifth_store_save_is_refused_with_the_cap_message(pool: SqlitePool) {
        let state = test_state(pool);

        for i in 0..4 {
            let response = build_app(state.clone())
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/api/v1/dm/stores")
                        .header("content-type", "application/json")
                        .body(Body::from(store_body(&format!("d-{i}"))))
                        .expect("request"),
                )
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::CREATED, "store {i}");
        }

        let response = build_app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/dm/stores")
                    .header("content-type", "application/json")
                    .body(Body::from(store_body("d-4")))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["data"]["success"], false);
        assert_eq!(json["data"]["message"], "Brand store limit (4) reached");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn inactive_brand_routes_are_rejected(pool: SqlitePool) {
        // Only dm is active in the test state.
        let app = build_app(test_state(pool));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/budni/stores")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_brand_segment_is_a_validation_error(pool: SqlitePool) {
        let app = build_app(test_state(pool));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/edeka/stores")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
