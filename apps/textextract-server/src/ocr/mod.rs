//! OCR Module
//!
//! Turns an uploaded image into text.
//!
//! Providers:
//! - OCR.space (hosted API, primary)
//! - Tesseract (local CLI, fallback)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use textextract_server::ocr::{OcrRequest, OcrService};
//!
//! let service = OcrService::from_config(&config.ocr);
//!
//! let result = service.extract(&OcrRequest {
//!     image: base64_png,
//!     language: "eng".to_string(),
//!     is_table: false,
//! }).await?;
//! println!("{} ({}%)", result.extracted_text, result.confidence);
//! ```

mod intake;
mod provider;
mod service;
mod types;

pub use intake::{
    decode_base64_image, prepare_for_provider, sniff_image_kind, CompressionSettings, PreparedImage,
    MAX_PROVIDER_BYTES, MAX_UPLOAD_BYTES,
};
pub use provider::{parse_ocr_space_response, OcrProviderTrait, OcrSpaceProvider, TesseractProvider};
pub use service::{OcrService, OcrServiceConfig, ValidatedImage};
pub use types::{
    ImageKind, OcrError, OcrProvider, OcrRequest, OcrResult, RecognizeOptions, Recognition,
    RecognizedLine, TOTAL_FAILURE_MESSAGE,
};
