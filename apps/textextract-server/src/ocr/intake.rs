//! Image intake for OCR
//!
//! Decodes base64 payloads, sniffs the real format from magic bytes and
//! recompresses images that exceed the provider's payload ceiling.

use std::io::Cursor;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use super::types::{ImageKind, OcrError};

/// OCR.space rejects payloads above 1 MB on the free tier
pub const MAX_PROVIDER_BYTES: usize = 1024 * 1024;

/// Largest upload accepted at all
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Detect the image format from its leading bytes
pub fn sniff_image_kind(bytes: &[u8]) -> Option<ImageKind> {
    if bytes.starts_with(PNG_MAGIC) {
        Some(ImageKind::Png)
    } else if bytes.starts_with(JPEG_MAGIC) {
        Some(ImageKind::Jpeg)
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(ImageKind::Webp)
    } else {
        None
    }
}

/// Decode a base64 payload, accepting an optional `data:<mime>;base64,` prefix
pub fn decode_base64_image(input: &str) -> Result<Vec<u8>, OcrError> {
    let payload = match input.find(";base64,") {
        Some(idx) if input.starts_with("data:") => &input[idx + ";base64,".len()..],
        _ => input,
    };
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    if payload.is_empty() {
        return Err(OcrError::InvalidInput("No image provided".to_string()));
    }

    base64::engine::general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| OcrError::InvalidInput(format!("Image is not valid base64: {}", e)))
}

/// Recompression limits
#[derive(Debug, Clone)]
pub struct CompressionSettings {
    pub max_bytes: usize,
    /// Longest side after rescaling
    pub max_dimension: u32,
    /// JPEG quality (percent) of the first attempt
    pub start_quality: u8,
    /// Lowest JPEG quality tried
    pub min_quality: u8,
    pub quality_step: u8,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_bytes: MAX_PROVIDER_BYTES,
            max_dimension: 2000,
            start_quality: 70,
            min_quality: 30,
            quality_step: 10,
        }
    }
}

/// Image ready to send to a provider
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub kind: ImageKind,
    /// Whether the bytes were re-encoded
    pub compressed: bool,
    /// Original width over sent width; multiply provider coordinates by it
    pub scale: f64,
}

/// Make an image fit under `settings.max_bytes`.
///
/// Images already under the ceiling are returned untouched. Larger images are
/// rescaled to `max_dimension` and re-encoded as JPEG at decreasing quality.
pub fn prepare_for_provider(
    bytes: &[u8],
    kind: ImageKind,
    settings: &CompressionSettings,
) -> Result<PreparedImage, OcrError> {
    if bytes.len() <= settings.max_bytes {
        return Ok(PreparedImage {
            bytes: bytes.to_vec(),
            kind,
            compressed: false,
            scale: 1.0,
        });
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| OcrError::ImageProcessing(format!("Failed to decode image: {}", e)))?;

    let original_width = img.width();
    let img = if img.width() > settings.max_dimension || img.height() > settings.max_dimension {
        img.resize(settings.max_dimension, settings.max_dimension, FilterType::Lanczos3)
    } else {
        img
    };
    let scale = f64::from(original_width) / f64::from(img.width().max(1));
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut quality = settings.start_quality;
    let mut last_size = bytes.len();
    loop {
        let encoded = encode_jpeg(&rgb, quality)?;
        tracing::debug!(
            "Recompressed image at quality {}: {} -> {} bytes",
            quality,
            bytes.len(),
            encoded.len()
        );

        if encoded.len() <= settings.max_bytes {
            return Ok(PreparedImage {
                bytes: encoded,
                kind: ImageKind::Jpeg,
                compressed: true,
                scale,
            });
        }
        last_size = last_size.min(encoded.len());

        if quality <= settings.min_quality {
            break;
        }
        quality = quality
            .saturating_sub(settings.quality_step.max(1))
            .max(settings.min_quality);
    }

    Err(OcrError::ImageTooLarge {
        size: last_size,
        max: settings.max_bytes,
    })
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, OcrError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), quality);
    img.write_with_encoder(encoder)
        .map_err(|e| OcrError::ImageProcessing(format!("Failed to encode JPEG: {}", e)))?;
    Ok(buffer)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    /// PNG of deterministic noise, which compresses poorly as PNG
    pub(crate) fn noise_png(width: u32, height: u32) -> Vec<u8> {
        let mut state: u32 = 0x1234_5678;
        let img = RgbImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let [r, g, b, _] = state.to_le_bytes();
            image::Rgb([r, g, b])
        });
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_sniff_magic_bytes() {
        assert_eq!(sniff_image_kind(&noise_png(4, 4)), Some(ImageKind::Png));
        assert_eq!(sniff_image_kind(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), Some(ImageKind::Jpeg));
        assert_eq!(sniff_image_kind(b"RIFF\x24\x00\x00\x00WEBPVP8 "), Some(ImageKind::Webp));
        assert_eq!(sniff_image_kind(b"GIF89a......"), None);
        assert_eq!(sniff_image_kind(b""), None);
    }

    #[test]
    fn test_decode_base64_with_data_url() {
        let plain = decode_base64_image("aGVsbG8=").unwrap();
        assert_eq!(plain, b"hello");

        let data_url = decode_base64_image("data:image/png;base64,aGVs\nbG8=").unwrap();
        assert_eq!(data_url, b"hello");

        assert!(matches!(decode_base64_image(""), Err(OcrError::InvalidInput(_))));
        assert!(matches!(
            decode_base64_image("data:image/png;base64,"),
            Err(OcrError::InvalidInput(_))
        ));
        assert!(matches!(decode_base64_image("not base64!!"), Err(OcrError::InvalidInput(_))));
    }

    #[test]
    fn test_small_image_is_not_compressed() {
        let png = noise_png(32, 32);
        let prepared = prepare_for_provider(&png, ImageKind::Png, &CompressionSettings::default()).unwrap();
        assert!(!prepared.compressed);
        assert_eq!(prepared.bytes, png);
        assert_eq!(prepared.kind, ImageKind::Png);
        assert_eq!(prepared.scale, 1.0);
    }

    #[test]
    fn test_large_image_is_compressed_under_cap() {
        let png = noise_png(256, 256);
        let settings = CompressionSettings {
            max_bytes: 150_000,
            ..CompressionSettings::default()
        };
        assert!(png.len() > settings.max_bytes);

        let prepared = prepare_for_provider(&png, ImageKind::Png, &settings).unwrap();
        assert!(prepared.compressed);
        assert_eq!(prepared.kind, ImageKind::Jpeg);
        assert!(prepared.bytes.len() <= settings.max_bytes);
        assert_eq!(sniff_image_kind(&prepared.bytes), Some(ImageKind::Jpeg));
    }

    #[test]
    fn test_oversized_image_is_rescaled() {
        let png = noise_png(600, 40);
        let settings = CompressionSettings {
            max_bytes: 40_000,
            max_dimension: 300,
            ..CompressionSettings::default()
        };
        let prepared = prepare_for_provider(&png, ImageKind::Png, &settings).unwrap();
        let decoded = image::load_from_memory(&prepared.bytes).unwrap();
        assert_eq!(decoded.width(), 300);
        assert_eq!(decoded.height(), 20);
        assert_eq!(prepared.scale, 2.0);
    }

    #[test]
    fn test_incompressible_image_fails_with_size_error() {
        let png = noise_png(128, 128);
        let settings = CompressionSettings {
            max_bytes: 200,
            ..CompressionSettings::default()
        };
        let result = prepare_for_provider(&png, ImageKind::Png, &settings);
        assert!(matches!(result, Err(OcrError::ImageTooLarge { max: 200, .. })));
    }
}
