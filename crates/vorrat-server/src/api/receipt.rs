//! Receipt upload: multipart PDF in, normalized catalog references out.

use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    Extension, Json,
};

use vorrat_core::Brand;
use vorrat_receipt::ReceiptError;

use super::{parse_active_brand, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::api::lookup::ArticleCodeLookup;
use crate::middleware::RequestId;

fn map_receipt_error(request_id: String, error: &ReceiptError) -> ApiError {
    match error {
        ReceiptError::Pdf(_) | ReceiptError::Layout { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        ReceiptError::Unsupported { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
    }
}

/// POST /api/v1/{brand}/receipt — multipart upload of one PDF document.
pub async fn upload_receipt(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(brand): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (brand, adapter) = parse_active_brand(&state, &brand, &req_id.0)?;

    let mut document: Option<Vec<u8>> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.bytes().await {
            Ok(bytes) if !bytes.is_empty() => {
                document = Some(bytes.to_vec());
                break;
            }
            Ok(_) => {}
            Err(e) => {
                return Err(ApiError::new(
                    req_id.0,
                    "validation_error",
                    format!("unreadable upload: {e}"),
                ));
            }
        }
    }

    let Some(document) = document else {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "no document uploaded",
        ));
    };

    let items = match brand {
        Brand::Dm => state
            .matcher
            .match_dm_receipt(&document, adapter.as_ref())
            .await,
        Brand::Rossmann => {
            let lookup = ArticleCodeLookup {
                state: state.clone(),
            };
            state
                .matcher
                .match_rossmann_receipt(&document, &lookup)
                .await
        }
        other => Err(ReceiptError::Unsupported { brand: other }),
    }
    .map_err(|e| map_receipt_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: items,
        meta: ResponseMeta::new(req_id.0),
    }))
}
