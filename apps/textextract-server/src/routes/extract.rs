//! Text extraction endpoints
//!
//! `POST /extract-text` runs the full gateway (usage gate, primary provider,
//! fallback, text heuristics). `POST /extract` is the thin multipart variant
//! that calls the hosted provider once and returns its raw response.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use super::user_id;
use crate::error::AppError;
use crate::ocr::{OcrError, OcrRequest, RecognizeOptions, MAX_UPLOAD_BYTES};
use crate::regions::TextRegion;
use crate::state::AppState;
use crate::usage::UsageStatus;

/// Base64 inflates the upload ceiling by a third, plus JSON framing
const MAX_BODY_BYTES: usize = MAX_UPLOAD_BYTES / 3 * 4 + 64 * 1024;

/// Create the extraction router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/extract-text", post(extract_text))
        .route("/extract", post(extract_upload))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

/// Response for `POST /extract-text`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTextResponse {
    pub text: String,
    pub confidence: f64,
    pub words: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text_regions: Vec<TextRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl ExtractTextResponse {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            words: 0,
            success: false,
            error: Some(error.into()),
            text_regions: Vec::new(),
            raw_text: None,
        }
    }
}

/// 403 body when the daily allowance is used up
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpgradeRequiredResponse {
    success: bool,
    error: String,
    upgrade_required: bool,
    usage: UsageStatus,
}

async fn extract_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<OcrRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ExtractTextResponse::failure(rejection.body_text())),
            )
                .into_response();
        }
    };

    let user = user_id(&headers);
    let usage = match state.usage().check(&user).await {
        Ok(usage) => usage,
        Err(e) => return AppError::from(e).into_response(),
    };

    if !usage.can_process {
        tracing::warn!(
            "Denied extraction for {}: {} images today",
            user,
            usage.image_count
        );
        return (
            StatusCode::FORBIDDEN,
            Json(UpgradeRequiredResponse {
                success: false,
                error: usage.reason.clone().unwrap_or_default(),
                upgrade_required: true,
                usage,
            }),
        )
            .into_response();
    }

    match state.ocr().extract(&request).await {
        Ok(result) => {
            if let Err(e) = state.usage().record_processed(&user).await {
                tracing::error!("Failed to record usage for {}: {}", user, e);
            }

            Json(ExtractTextResponse {
                text: result.extracted_text,
                confidence: result.confidence,
                words: result.word_count,
                success: true,
                error: None,
                text_regions: result.text_regions,
                raw_text: result.raw_text,
            })
            .into_response()
        }
        Err(e) if e.is_client_error() => (
            StatusCode::BAD_REQUEST,
            Json(ExtractTextResponse::failure(e.to_string())),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Text extraction failed for {}: {}", user, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ExtractTextResponse::failure(e.user_message())),
            )
                .into_response()
        }
    }
}

/// Error body for `POST /extract`
#[derive(Debug, Serialize)]
struct UploadError {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn upload_error(status: StatusCode, error: &str, details: Option<String>) -> Response {
    (
        status,
        Json(UploadError {
            error: error.to_string(),
            details,
        }),
    )
        .into_response()
}

async fn extract_upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return upload_error(StatusCode::BAD_REQUEST, "Failed to read upload", Some(e.to_string()));
            }
        };

        if field.name() == Some("file") {
            match field.bytes().await {
                Ok(data) => file = Some(data),
                Err(e) => {
                    return upload_error(
                        StatusCode::BAD_REQUEST,
                        "Failed to read file data",
                        Some(e.to_string()),
                    );
                }
            }
            break;
        }
    }

    let Some(data) = file else {
        return upload_error(StatusCode::BAD_REQUEST, "No file uploaded", None);
    };

    let image = match state.ocr().validate(data.to_vec()) {
        Ok(image) => image,
        Err(e) => return upload_error(StatusCode::BAD_REQUEST, &e.to_string(), None),
    };

    let options = RecognizeOptions {
        language: state.config().ocr.default_language.clone(),
        is_table: false,
    };

    match state.ocr().recognize_primary(&image, &options).await {
        Ok(recognition) => Json(serde_json::json!({
            "text": recognition.text,
            "raw": recognition.raw,
        }))
        .into_response(),
        Err(OcrError::ProviderNotAvailable(details)) => upload_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "OCR service is not configured",
            Some(details),
        ),
        Err(e) if e.is_client_error() => upload_error(StatusCode::BAD_REQUEST, &e.to_string(), None),
        Err(e) => {
            tracing::error!("OCR provider failed: {}", e);
            upload_error(StatusCode::BAD_GATEWAY, "OCR provider failed", Some(e.to_string()))
        }
    }
}
