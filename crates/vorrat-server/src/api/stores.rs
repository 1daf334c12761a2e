//! Saved-store routes: directory search plus cap-enforced CRUD.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use vorrat_adapters::geo::{is_valid_plz, is_zip_code};
use vorrat_core::StoreListing;
use vorrat_db::SaveOutcome;

use super::{map_db_error, parse_active_brand, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

/// GET /api/v1/{brand}/stores/search/{param}
pub async fn search_stores(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((brand, param)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, adapter) = parse_active_brand(&state, &brand, &req_id.0)?;

    if is_zip_code(&param) {
        let http = vorrat_adapters::build_http_client(
            state.config.http_timeout_secs,
            &state.config.user_agent,
        )
        .map_err(|e| {
            ApiError::new(req_id.0.clone(), "internal_error", e.to_string())
        })?;
        let valid = is_valid_plz(&http, "https://api.zippopotam.us", param.trim())
            .await
            .unwrap_or(true);
        if !valid {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                format!("'{param}' is not a known German postal code"),
            ));
        }
    }

    let stores = adapter.find_stores(&param).await.map_err(|e| {
        tracing::warn!(brand = %brand, param = %param, error = %e, "store search failed");
        ApiError::new(req_id.0.clone(), "upstream_error", e.to_string())
    })?;

    if stores.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("no stores found for '{param}'"),
        ));
    }

    Ok(Json(ApiResponse {
        data: stores,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/{brand}/stores — saved stores of the brand.
pub async fn saved_stores(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(brand): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (brand, _) = parse_active_brand(&state, &brand, &req_id.0)?;

    let stores = vorrat_db::get_stores_by_brand(&state.pool, brand)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let listings: Vec<StoreListing> = stores.iter().map(vorrat_db::StoreRecord::to_listing).collect();

    Ok(Json(ApiResponse {
        data: listings,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/{brand}/stores — save one store, cap-enforced.
///
/// The outcome shape is returned verbatim: a refused save answers 400
/// with `{success: false, message: …}` and persists nothing.
pub async fn save_store(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(brand): Path<String>,
    Json(listing): Json<StoreListing>,
) -> Result<impl IntoResponse, ApiError> {
    let (brand, _) = parse_active_brand(&state, &brand, &req_id.0)?;

    let outcome = vorrat_db::save_store(
        &state.pool,
        brand,
        &listing,
        state.config.stores_per_brand,
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let status = if outcome.success {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_REQUEST
    };

    Ok((
        status,
        Json(ApiResponse {
            data: outcome,
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// DELETE /api/v1/{brand}/stores/{store_id}
pub async fn delete_store(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((brand, store_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    parse_active_brand(&state, &brand, &req_id.0)?;

    let removed = vorrat_db::delete_store_by_id(&state.pool, &store_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let (status, outcome) = if removed {
        (
            StatusCode::OK,
            SaveOutcome {
                success: true,
                message: "Store deleted successfully".to_string(),
            },
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            SaveOutcome {
                success: false,
                message: "Store not found".to_string(),
            },
        )
    };

    Ok((
        status,
        Json(ApiResponse {
            data: outcome,
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}
