//! Error types for the TextExtract server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::blog::BlogError;
use crate::usage::UsageError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Usage tracking error: {0}")]
    Usage(#[from] UsageError),

    #[error("Blog error: {0}")]
    Blog(#[from] BlogError),

    #[error("XML writing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::Usage(e) => {
                tracing::error!("Usage store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "usage_error",
                    "Usage tracking is unavailable".to_string(),
                )
            }
            AppError::Blog(e) => {
                tracing::error!("Blog error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "blog_error",
                    "Failed to load blog content".to_string(),
                )
            }
            AppError::Xml(e) => {
                tracing::error!("XML error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "xml_error",
                    "Failed to write XML".to_string(),
                )
            }
            AppError::Utf8(e) => {
                tracing::error!("UTF-8 error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "encoding_error",
                    "Invalid UTF-8 encoding".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
