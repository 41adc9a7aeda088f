//! OCR Types
//!
//! Request, result and error types shared by the OCR gateway and its providers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::regions::{RegionBounds, TextRegion};

/// OCR provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrProvider {
    /// OCR.space hosted API
    OcrSpace,
    /// Tesseract OCR (local)
    Tesseract,
}

impl std::fmt::Display for OcrProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OcrSpace => write!(f, "OCR.space"),
            Self::Tesseract => write!(f, "Tesseract"),
        }
    }
}

fn default_language() -> String {
    "eng".to_string()
}

/// Text extraction request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrRequest {
    /// Base64 image, optionally as a `data:` URL
    pub image: String,
    /// Provider language code
    #[serde(default = "default_language")]
    pub language: String,
    /// Ask the provider to keep table rows together
    #[serde(default)]
    pub is_table: bool,
}

/// Per-call provider options
#[derive(Debug, Clone)]
pub struct RecognizeOptions {
    pub language: String,
    pub is_table: bool,
}

impl Default for RecognizeOptions {
    fn default() -> Self {
        Self {
            language: default_language(),
            is_table: false,
        }
    }
}

/// Image formats accepted for recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Webp,
}

impl ImageKind {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }
}

/// A recognized line with its bounding box
#[derive(Debug, Clone)]
pub struct RecognizedLine {
    pub text: String,
    pub bounds: RegionBounds,
}

/// Raw provider output before post-processing
#[derive(Debug, Clone)]
pub struct Recognition {
    pub text: String,
    pub provider: OcrProvider,
    /// Line layout, when the provider reports one
    pub lines: Vec<RecognizedLine>,
    /// Provider response body as received
    pub raw: serde_json::Value,
}

/// Post-processed OCR result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    pub extracted_text: String,
    /// Confidence score (0-100)
    pub confidence: f64,
    pub word_count: usize,
    /// Unfiltered text, present only when filtering changed the output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    pub provider: OcrProvider,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text_regions: Vec<TextRegion>,
}

/// Shown to the user when no provider could read the image
pub const TOTAL_FAILURE_MESSAGE: &str =
    "We couldn't extract text from this image. Please try again with a different image.";

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("Invalid image: {0}")]
    InvalidInput(String),

    #[error("Unsupported image type; upload a PNG, JPEG or WebP image")]
    UnsupportedImageType,

    #[error("Image is too large: {size} bytes (limit {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Failed to process image: {0}")]
    ImageProcessing(String),

    #[error("OCR provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("OCR provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("No text found in image")]
    NoTextFound,

    #[error("All OCR providers failed (primary: {primary}; fallback: {fallback})")]
    AllProvidersFailed { primary: String, fallback: String },
}

impl OcrError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::InvalidInput(_) | Self::UnsupportedImageType | Self::ImageTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::ProviderNotAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::ApiError(_) | Self::ProcessingError(_) | Self::MalformedResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Rejected before any provider was called
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::UnsupportedImageType | Self::ImageTooLarge { .. }
        )
    }

    /// Message safe to show to the end user
    pub fn user_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            TOTAL_FAILURE_MESSAGE.to_string()
        }
    }
}
