//! Article routes: CRUD plus the lifecycle-driven upsert and the two
//! forced-refresh endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use vorrat_db::ArticleRecord;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::lifecycle::LifecycleError;
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct CreateArticleBody {
    pub ean: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct UpsertData {
    pub message: &'static str,
    pub article: ArticleRecord,
}

fn map_lifecycle_error(request_id: String, error: &LifecycleError) -> ApiError {
    match error {
        LifecycleError::NotFound(ean) => ApiError::new(
            request_id,
            "not_found",
            format!("no article found for {ean}"),
        ),
        LifecycleError::Db(e) => map_db_error(request_id, e),
    }
}

pub async fn list_articles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<impl IntoResponse, ApiError> {
    let articles = vorrat_db::list_articles(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: articles,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub async fn get_article(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(ean): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let article = vorrat_db::get_article(&state.pool, &ean)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("no article found for {ean}"),
            )
        })?;

    Ok(Json(ApiResponse {
        data: article,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub async fn delete_article(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(ean): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = vorrat_db::delete_article(&state.pool, &ean)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if !removed {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("no article found for {ean}"),
        ));
    }

    Ok(Json(ApiResponse {
        data: serde_json::json!({"message": "Article deleted successfully"}),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/articles — upsert-and-refresh by `{ean, name}`.
pub async fn create_article(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateArticleBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.ean.trim().is_empty() || body.name.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "ean and name are required",
        ));
    }

    let outcome = state
        .lifecycle
        .upsert_and_refresh(body.ean.trim(), body.name.trim())
        .await
        .map_err(|e| map_lifecycle_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse {
            data: UpsertData {
                message: outcome.message,
                article: outcome.article,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// PUT /api/v1/articles/{ean}/prices — forced price refresh.
pub async fn update_prices(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(ean): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let article = state
        .lifecycle
        .force_price_refresh(&ean)
        .await
        .map_err(|e| map_lifecycle_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: article,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// PUT /api/v1/articles/{ean}/availability — forced availability refresh.
pub async fn update_availability(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(ean): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let article = state
        .lifecycle
        .force_availability_refresh(&ean)
        .await
        .map_err(|e| map_lifecycle_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: article,
        meta: ResponseMeta::new(req_id.0),
    }))
}
