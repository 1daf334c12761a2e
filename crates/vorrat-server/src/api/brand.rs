//! Single-brand routes: resolution, detail re-extraction, and
//! availability across that brand's saved stores.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use vorrat_adapters::AdapterError;
use vorrat_core::{AvailabilityRecord, ProductDetails, ProductRef};

use super::{map_db_error, parse_active_brand, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BrandProductData {
    pub ean: String,
    #[serde(flatten)]
    pub details: ProductDetails,
}

fn map_adapter_error(request_id: String, error: &AdapterError) -> ApiError {
    if error.is_not_found() {
        ApiError::new(request_id, "not_found", error.to_string())
    } else {
        tracing::warn!(error = %error, "adapter call failed");
        ApiError::new(request_id, "upstream_error", error.to_string())
    }
}

/// GET /api/v1/{brand}/ean/{ean}
pub async fn resolve_ean(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((brand, ean)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, adapter) = parse_active_brand(&state, &brand, &req_id.0)?;

    let details = adapter
        .resolve_by_code(&ean)
        .await
        .map_err(|e| map_adapter_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: BrandProductData { ean, details },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/{brand}/product?url= — re-extract current price/image.
pub async fn product_details(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(brand): Path<String>,
    Query(query): Query<UrlQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, adapter) = parse_active_brand(&state, &brand, &req_id.0)?;
    let url = query.url.ok_or_else(|| {
        ApiError::new(
            req_id.0.clone(),
            "validation_error",
            "missing url query parameter",
        )
    })?;

    let details = adapter
        .fetch_product_details(&ProductRef::Url(url))
        .await
        .map_err(|e| map_adapter_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: details,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/{brand}/store/product?url= — availability at every saved
/// store of the brand.
pub async fn store_availability(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(brand): Path<String>,
    Query(query): Query<UrlQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (brand, adapter) = parse_active_brand(&state, &brand, &req_id.0)?;
    let url = query.url.ok_or_else(|| {
        ApiError::new(
            req_id.0.clone(),
            "validation_error",
            "missing url query parameter",
        )
    })?;

    let stores = vorrat_db::get_stores_by_brand(&state.pool, brand)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let reference = ProductRef::Url(url);
    let mut records: Vec<AvailabilityRecord> = Vec::with_capacity(stores.len());
    for store in &stores {
        let record = adapter
            .check_store_availability(&reference, &store.store_id)
            .await
            .map_err(|e| map_adapter_error(req_id.0.clone(), &e))?;
        records.push(record);
    }

    Ok(Json(ApiResponse {
        data: records,
        meta: ResponseMeta::new(req_id.0),
    }))
}
