//! OCR Providers
//!
//! Defines the provider trait and the OCR.space and Tesseract backends.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use super::types::{ImageKind, OcrError, OcrProvider, RecognizeOptions, Recognition, RecognizedLine};
use crate::regions::RegionBounds;

/// OCR provider trait
#[async_trait]
pub trait OcrProviderTrait: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> OcrProvider;

    /// Check if the provider is available
    async fn is_available(&self) -> bool;

    /// Perform OCR on an image
    async fn recognize(
        &self,
        image_data: &[u8],
        kind: ImageKind,
        options: &RecognizeOptions,
    ) -> Result<Recognition, OcrError>;
}

/// OCR.space hosted API provider
pub struct OcrSpaceProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OcrSpaceProvider {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build OCR HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl OcrProviderTrait for OcrSpaceProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::OcrSpace
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn recognize(
        &self,
        image_data: &[u8],
        kind: ImageKind,
        options: &RecognizeOptions,
    ) -> Result<Recognition, OcrError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| OcrError::ProviderNotAvailable("OCR.space API key is not configured".to_string()))?;

        let image_base64 = base64::engine::general_purpose::STANDARD.encode(image_data);

        let form = reqwest::multipart::Form::new()
            .text("language", options.language.clone())
            .text("isTable", options.is_table.to_string())
            .text("isOverlayRequired", "true")
            .text("scale", "true")
            .text("OCREngine", "2")
            .text("base64Image", format!("data:{};base64,{}", kind.mime(), image_base64));

        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OcrError::ApiError(format!("OCR.space request timed out: {}", e))
                } else {
                    OcrError::ApiError(format!("Failed to call OCR.space: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::ApiError(format!(
                "OCR.space returned {}: {}",
                status, body
            )));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OcrError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        parse_ocr_space_response(raw)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Option<Vec<OcrSpaceParsedResult>>,
    #[serde(default)]
    is_errored_on_processing: bool,
    /// A string or a list of strings
    #[serde(default)]
    error_message: Option<serde_json::Value>,
    #[serde(default)]
    error_details: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceParsedResult {
    #[serde(default)]
    parsed_text: String,
    #[serde(default)]
    text_overlay: Option<OcrSpaceOverlay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceOverlay {
    #[serde(default)]
    lines: Vec<OcrSpaceLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceLine {
    #[serde(default)]
    line_text: String,
    #[serde(default)]
    words: Vec<OcrSpaceWord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceWord {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

/// Normalize an OCR.space response body
pub fn parse_ocr_space_response(raw: serde_json::Value) -> Result<Recognition, OcrError> {
    let response: OcrSpaceResponse = serde_json::from_value(raw.clone())
        .map_err(|e| OcrError::MalformedResponse(e.to_string()))?;

    if response.is_errored_on_processing {
        let message = match &response.error_message {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            _ => response
                .error_details
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        };
        return Err(OcrError::ProcessingError(message));
    }

    let results = response
        .parsed_results
        .filter(|r| !r.is_empty())
        .ok_or_else(|| OcrError::MalformedResponse("response has no ParsedResults".to_string()))?;

    let text = results
        .iter()
        .map(|r| r.parsed_text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        return Err(OcrError::NoTextFound);
    }

    let lines = results
        .iter()
        .filter_map(|r| r.text_overlay.as_ref())
        .flat_map(|overlay| overlay.lines.iter())
        .filter_map(|line| {
            let boxes: Vec<RegionBounds> = line
                .words
                .iter()
                .map(|w| RegionBounds {
                    x: w.left,
                    y: w.top,
                    width: w.width,
                    height: w.height,
                })
                .collect();
            let bounds = RegionBounds::union(&boxes)?;
            let text = line.line_text.trim();
            (!text.is_empty()).then(|| RecognizedLine {
                text: text.to_string(),
                bounds,
            })
        })
        .collect();

    Ok(Recognition {
        text,
        provider: OcrProvider::OcrSpace,
        lines,
        raw,
    })
}

/// Tesseract CLI provider, used as the local fallback
pub struct TesseractProvider {
    binary: String,
}

impl TesseractProvider {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }
}

#[async_trait]
impl OcrProviderTrait for TesseractProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        tokio::process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    async fn recognize(
        &self,
        image_data: &[u8],
        kind: ImageKind,
        options: &RecognizeOptions,
    ) -> Result<Recognition, OcrError> {
        let input_path = std::env::temp_dir().join(format!(
            "ocr_input_{}.{}",
            uuid::Uuid::new_v4(),
            kind.extension()
        ));

        tokio::fs::write(&input_path, image_data)
            .await
            .map_err(|e| OcrError::ProcessingError(format!("Failed to write temp file: {}", e)))?;

        // psm 6 treats the image as one uniform block, which keeps table rows intact
        let psm = if options.is_table { "6" } else { "3" };
        let output = tokio::process::Command::new(&self.binary)
            .arg(&input_path)
            .arg("stdout")
            .arg("-l")
            .arg(&options.language)
            .arg("--psm")
            .arg(psm)
            .output()
            .await;

        let _ = tokio::fs::remove_file(&input_path).await;

        let output = output.map_err(|e| {
            OcrError::ProviderNotAvailable(format!("Failed to run {}: {}", self.binary, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ProcessingError(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(OcrError::NoTextFound);
        }

        Ok(Recognition {
            raw: serde_json::json!({ "text": text }),
            text,
            provider: OcrProvider::Tesseract,
            lines: Vec::new(),
        })
    }
}

/// Mock provider for testing
#[cfg(test)]
pub struct MockProvider {
    pub provider: OcrProvider,
    pub response: Result<String, String>,
    pub delay: Option<Duration>,
    pub lines: Vec<RecognizedLine>,
    pub calls: std::sync::atomic::AtomicUsize,
    pub last_len: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockProvider {
    pub fn ok(provider: OcrProvider, text: &str) -> Self {
        Self {
            provider,
            response: Ok(text.to_string()),
            delay: None,
            lines: Vec::new(),
            calls: Default::default(),
            last_len: Default::default(),
        }
    }

    pub fn failing(provider: OcrProvider, message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            ..Self::ok(provider, "")
        }
    }

    pub fn with_lines(self, lines: Vec<RecognizedLine>) -> Self {
        Self { lines, ..self }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl OcrProviderTrait for MockProvider {
    fn provider_type(&self) -> OcrProvider {
        self.provider
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn recognize(
        &self,
        image_data: &[u8],
        _kind: ImageKind,
        _options: &RecognizeOptions,
    ) -> Result<Recognition, OcrError> {
        use std::sync::atomic::Ordering;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_len.store(image_data.len(), Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.response {
            Ok(text) => Ok(Recognition {
                text: text.clone(),
                provider: self.provider,
                lines: self.lines.clone(),
                raw: serde_json::json!({ "text": text }),
            }),
            Err(message) => Err(OcrError::ApiError(message.clone())),
        }
    }
}
