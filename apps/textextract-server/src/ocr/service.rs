//! OCR Service
//!
//! Validates uploads, runs the primary provider with a local fallback and
//! post-processes the recognized text.

use std::sync::Arc;
use std::time::Duration;

use super::{
    intake::{decode_base64_image, prepare_for_provider, sniff_image_kind, CompressionSettings, MAX_UPLOAD_BYTES},
    provider::{OcrProviderTrait, OcrSpaceProvider, TesseractProvider},
    types::{ImageKind, OcrError, OcrProvider, OcrRequest, OcrResult, RecognizeOptions, Recognition},
};
use crate::config::OcrConfig;
use crate::regions::TextRegion;
use crate::text::{estimate_confidence, word_count, TextFilter, GARBLED_TEXT_MESSAGE, MIN_CONFIDENCE};

/// OCR service configuration
#[derive(Debug, Clone)]
pub struct OcrServiceConfig {
    /// Upper bound on a single primary provider call
    pub primary_timeout: Duration,
    /// Largest decoded upload accepted
    pub max_upload_bytes: usize,
    pub compression: CompressionSettings,
    /// Heuristic filter output cap
    pub max_lines: usize,
}

impl Default for OcrServiceConfig {
    fn default() -> Self {
        Self {
            primary_timeout: Duration::from_secs(20),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            compression: CompressionSettings::default(),
            max_lines: 20,
        }
    }
}

/// An uploaded image that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    pub bytes: Vec<u8>,
    pub kind: ImageKind,
}

/// OCR gateway: primary provider, local fallback, text post-processing
pub struct OcrService {
    config: OcrServiceConfig,
    primary: Arc<dyn OcrProviderTrait>,
    fallback: Option<Arc<dyn OcrProviderTrait>>,
    filter: TextFilter,
}

impl OcrService {
    pub fn new(
        config: OcrServiceConfig,
        primary: Arc<dyn OcrProviderTrait>,
        fallback: Option<Arc<dyn OcrProviderTrait>>,
    ) -> Self {
        let filter = TextFilter::new(config.max_lines);
        Self {
            config,
            primary,
            fallback,
            filter,
        }
    }

    /// OCR.space as primary, Tesseract as fallback
    pub fn from_config(ocr: &OcrConfig) -> Self {
        let config = OcrServiceConfig {
            primary_timeout: ocr.timeout,
            max_lines: ocr.max_lines,
            ..OcrServiceConfig::default()
        };
        let primary = Arc::new(OcrSpaceProvider::new(&ocr.endpoint, ocr.api_key.clone(), ocr.timeout));
        let fallback: Arc<dyn OcrProviderTrait> = Arc::new(TesseractProvider::new(&ocr.tesseract_path));
        Self::new(config, primary, Some(fallback))
    }

    pub fn config(&self) -> &OcrServiceConfig {
        &self.config
    }

    /// Availability of each configured provider, primary first
    pub async fn provider_status(&self) -> Vec<(OcrProvider, bool)> {
        let mut status = vec![(self.primary.provider_type(), self.primary.is_available().await)];
        if let Some(fallback) = &self.fallback {
            status.push((fallback.provider_type(), fallback.is_available().await));
        }
        status
    }

    /// Check size and real format before any provider is called
    pub fn validate(&self, bytes: Vec<u8>) -> Result<ValidatedImage, OcrError> {
        if bytes.is_empty() {
            return Err(OcrError::InvalidInput("No image provided".to_string()));
        }
        if bytes.len() > self.config.max_upload_bytes {
            return Err(OcrError::ImageTooLarge {
                size: bytes.len(),
                max: self.config.max_upload_bytes,
            });
        }
        let kind = sniff_image_kind(&bytes).ok_or(OcrError::UnsupportedImageType)?;
        Ok(ValidatedImage { bytes, kind })
    }

    /// Single primary attempt: recompress if needed, bounded by the timeout
    pub async fn recognize_primary(
        &self,
        image: &ValidatedImage,
        options: &RecognizeOptions,
    ) -> Result<Recognition, OcrError> {
        let prepared = if image.bytes.len() > self.config.compression.max_bytes {
            let bytes = image.bytes.clone();
            let kind = image.kind;
            let settings = self.config.compression.clone();
            tokio::task::spawn_blocking(move || prepare_for_provider(&bytes, kind, &settings))
                .await
                .map_err(|e| OcrError::ImageProcessing(format!("Compression task failed: {}", e)))??
        } else {
            prepare_for_provider(&image.bytes, image.kind, &self.config.compression)?
        };

        if prepared.compressed {
            tracing::info!(
                "Compressed image from {} to {} bytes for {}",
                image.bytes.len(),
                prepared.bytes.len(),
                self.primary.provider_type()
            );
        }

        let mut recognition = match tokio::time::timeout(
            self.config.primary_timeout,
            self.primary.recognize(&prepared.bytes, prepared.kind, options),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(OcrError::Timeout(self.config.primary_timeout)),
        };

        // Boxes refer to the rescaled image; map them back to the upload
        if prepared.scale != 1.0 {
            for line in &mut recognition.lines {
                line.bounds = line.bounds.scaled(prepared.scale);
            }
        }

        Ok(recognition)
    }

    /// Primary provider, then the fallback on any primary error
    pub async fn recognize(
        &self,
        image: &ValidatedImage,
        options: &RecognizeOptions,
    ) -> Result<Recognition, OcrError> {
        let primary_error = match self.recognize_primary(image, options).await {
            Ok(recognition) => return Ok(recognition),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(OcrError::AllProvidersFailed {
                primary: primary_error.to_string(),
                fallback: "no fallback provider configured".to_string(),
            });
        };

        tracing::warn!(
            "OCR provider {} failed: {}, falling back to {}",
            self.primary.provider_type(),
            primary_error,
            fallback.provider_type()
        );

        fallback
            .recognize(&image.bytes, image.kind, options)
            .await
            .map_err(|fallback_error| {
                tracing::error!(
                    "Fallback OCR provider {} failed: {}",
                    fallback.provider_type(),
                    fallback_error
                );
                OcrError::AllProvidersFailed {
                    primary: primary_error.to_string(),
                    fallback: fallback_error.to_string(),
                }
            })
    }

    /// Filter, score and count a provider recognition
    pub fn build_result(&self, recognition: Recognition) -> OcrResult {
        let raw = recognition.text;
        let extracted = self.filter.apply(&raw).unwrap_or_else(|| raw.clone());
        let garbled = extracted == GARBLED_TEXT_MESSAGE;

        let confidence = if garbled {
            MIN_CONFIDENCE
        } else {
            estimate_confidence(&extracted)
        };

        let text_regions = recognition
            .lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| {
                let line_confidence = estimate_confidence(&line.text);
                TextRegion::new(format!("region-{}", i), line.text, line.bounds, line_confidence)
            })
            .collect();

        OcrResult {
            word_count: if garbled { 0 } else { word_count(&extracted) },
            raw_text: (extracted != raw).then_some(raw),
            extracted_text: extracted,
            confidence,
            provider: recognition.provider,
            text_regions,
        }
    }

    /// Full pipeline for a JSON extraction request
    pub async fn extract(&self, request: &OcrRequest) -> Result<OcrResult, OcrError> {
        let bytes = decode_base64_image(&request.image)?;
        let image = self.validate(bytes)?;
        let options = RecognizeOptions {
            language: request.language.clone(),
            is_table: request.is_table,
        };

        let recognition = self.recognize(&image, &options).await?;
        let result = self.build_result(recognition);

        tracing::info!(
            "Extracted {} words via {} (confidence {})",
            result.word_count,
            result.provider,
            result.confidence
        );

        Ok(result)
    }
}
