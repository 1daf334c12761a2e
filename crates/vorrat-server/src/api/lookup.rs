//! Identity-only lookup: durable store first, then the public catalog,
//! then the one storefront with a cheap JSON lookup. First hit wins.

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;

use vorrat_core::Brand;
use vorrat_receipt::{CodeLookup, NamedProduct};

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    pub source: &'static str,
    pub product: LookupProduct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupProduct {
    pub name: String,
    pub brand: String,
}

/// Resolve identity through the chain; `Ok(None)` when every source
/// came up empty.
pub(super) async fn lookup_by_code(
    state: &AppState,
    code: &str,
) -> Result<Option<LookupResult>, vorrat_db::DbError> {
    if let Some(article) = vorrat_db::get_article(&state.pool, code).await? {
        return Ok(Some(LookupResult {
            source: "Database",
            product: LookupProduct {
                name: article.name,
                brand: String::new(),
            },
        }));
    }

    match state.catalog.lookup(code).await {
        Ok(Some(product)) => {
            return Ok(Some(LookupResult {
                source: "OpenFoodFacts",
                product: LookupProduct {
                    name: product.name,
                    brand: product.brand,
                },
            }));
        }
        Ok(None) => {
            tracing::debug!(code, "public catalog has no entry; falling back to dm");
        }
        Err(e) => {
            tracing::warn!(code, error = %e, "public catalog lookup failed; falling back to dm");
        }
    }

    let Some(dm) = state.adapter_for(Brand::Dm) else {
        return Ok(None);
    };
    match dm.resolve_by_code(code).await {
        Ok(details) => Ok(details.name.map(|name| LookupResult {
            source: "dm",
            product: LookupProduct {
                name,
                brand: String::new(),
            },
        })),
        Err(e) => {
            if !e.is_not_found() {
                tracing::warn!(code, error = %e, "dm fallback lookup failed");
            }
            Ok(None)
        }
    }
}

/// GET /api/v1/lookup/{code}
pub async fn lookup_code(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = lookup_by_code(&state, &code)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("nothing known about {code}"),
            )
        })?;

    Ok(Json(ApiResponse {
        data: result,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// [`CodeLookup`] for the receipt matcher, backed by the same chain.
pub struct ArticleCodeLookup {
    pub state: AppState,
}

#[async_trait]
impl CodeLookup for ArticleCodeLookup {
    async fn lookup_name(&self, ean: &str) -> Option<NamedProduct> {
        match lookup_by_code(&self.state, ean).await {
            Ok(Some(result)) => Some(NamedProduct {
                brand: result.product.brand,
                name: result.product.name,
            }),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(ean, error = %e, "lookup chain failed during receipt matching");
                None
            }
        }
    }
}
