//! Conversion of accepted files.
//!
//! The re-encoding itself is delegated to the `image` crate behind the
//! [`Converter`] trait. This module only decides which bytes to return and how
//! to name them: if conversion fails or does not make the file smaller, the
//! original bytes are returned under the original (sanitized) name.

use base64::Engine;
use serde::Serialize;
use std::io::Cursor;
use std::str::FromStr;
use thiserror::Error;

use crate::observability::metrics;
use crate::upload::{create_safe_file_path, UploadFile};

pub const MIN_QUALITY: u8 = 10;
pub const MAX_QUALITY: u8 = 100;

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetFormat {
    /// Keep every file as uploaded.
    #[default]
    All,
    Jpeg,
    Png,
    /// Written as PNG; the encoder has no lossy WebP support.
    Webp,
}

impl TargetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::All => "all",
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Png => "png",
            TargetFormat::Webp => "webp",
        }
    }

    /// Extension of the bytes actually produced, if any conversion happens.
    pub fn output_extension(&self) -> Option<&'static str> {
        match self {
            TargetFormat::All => None,
            TargetFormat::Jpeg => Some("jpg"),
            TargetFormat::Png | TargetFormat::Webp => Some("png"),
        }
    }
}

impl FromStr for TargetFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "all" => Ok(TargetFormat::All),
            "jpeg" | "jpg" => Ok(TargetFormat::Jpeg),
            "png" => Ok(TargetFormat::Png),
            "webp" => Ok(TargetFormat::Webp),
            other => Err(ConvertError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Unknown target format: {0}")]
    UnknownFormat(String),

    #[error("Image decoding failed: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Image encoding failed: {0}")]
    Encode(#[source] image::ImageError),
}

/// Re-encodes image bytes.
pub trait Converter: Send + Sync {
    fn convert(&self, input: &[u8], format: TargetFormat, quality: u8) -> Result<Vec<u8>, ConvertError>;
}

/// [`Converter`] backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageConverter;

impl Converter for ImageConverter {
    fn convert(&self, input: &[u8], format: TargetFormat, quality: u8) -> Result<Vec<u8>, ConvertError> {
        if format == TargetFormat::All {
            return Ok(input.to_vec());
        }

        let image = image::load_from_memory(input).map_err(ConvertError::Decode)?;
        let mut out = Cursor::new(Vec::new());

        if format == TargetFormat::Jpeg {
            // JPEG has no alpha channel.
            let rgb = image::DynamicImage::ImageRgb8(image.to_rgb8());
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
            rgb.write_with_encoder(encoder).map_err(ConvertError::Encode)?;
        } else {
            image
                .write_to(&mut out, image::ImageFormat::Png)
                .map_err(ConvertError::Encode)?;
        }

        Ok(out.into_inner())
    }
}

/// Converted file as returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedFile {
    pub original_name: String,
    pub compressed_name: String,
    pub original_size: u64,
    pub compressed_size: u64,
    /// Percentage saved, never negative.
    pub compression_ratio: f64,
    pub base64_data: String,
}

/// Check a requested quality against the accepted range.
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_QUALITY..=MAX_QUALITY).contains(&quality)
}

/// Replace the extension of `name` with `ext`.
pub fn with_extension(name: &str, ext: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    format!("{stem}.{ext}")
}

/// Convert one accepted file.
///
/// Conversion errors are logged and the original bytes are kept; this never fails.
pub fn compress_file(
    converter: &dyn Converter,
    file: &UploadFile,
    format: TargetFormat,
    quality: u8,
) -> CompressedFile {
    let original = file.content.as_ref();
    let original_size = original.len() as u64;

    let converted = match format.output_extension() {
        None => None,
        Some(ext) => match converter.convert(original, format, quality) {
            Ok(bytes) if (bytes.len() as u64) < original_size => Some((bytes, ext)),
            Ok(bytes) => {
                tracing::debug!(
                    file = %file.name,
                    original_size,
                    converted_size = bytes.len(),
                    "Conversion did not shrink file, keeping original"
                );
                None
            }
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "Conversion failed, keeping original");
                None
            }
        },
    };

    let (data, compressed_name) = match converted {
        Some((bytes, ext)) => (bytes, create_safe_file_path(&with_extension(&file.name, ext))),
        None => (original.to_vec(), create_safe_file_path(&file.name)),
    };

    let compressed_size = data.len() as u64;
    let compression_ratio = if original_size == 0 {
        0.0
    } else {
        ((original_size as f64 - compressed_size as f64) / original_size as f64 * 100.0).max(0.0)
    };

    metrics::record_file_processed(format.as_str(), original_size, compressed_size);

    CompressedFile {
        original_name: file.name.clone(),
        compressed_name,
        original_size,
        compressed_size,
        compression_ratio,
        base64_data: base64::engine::general_purpose::STANDARD.encode(&data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Halving;

    impl Converter for Halving {
        fn convert(&self, input: &[u8], _: TargetFormat, _: u8) -> Result<Vec<u8>, ConvertError> {
            Ok(input[..input.len() / 2].to_vec())
        }
    }

    struct Growing;

    impl Converter for Growing {
        fn convert(&self, input: &[u8], _: TargetFormat, _: u8) -> Result<Vec<u8>, ConvertError> {
            let mut out = input.to_vec();
            out.extend_from_slice(input);
            Ok(out)
        }
    }

    fn file() -> UploadFile {
        UploadFile::new("holiday photo.jpeg", "image/jpeg", vec![0xFF; 100])
    }

    #[test]
    fn test_parse_target_format() {
        assert_eq!("all".parse::<TargetFormat>().unwrap(), TargetFormat::All);
        assert_eq!("".parse::<TargetFormat>().unwrap(), TargetFormat::All);
        assert_eq!("JPEG".parse::<TargetFormat>().unwrap(), TargetFormat::Jpeg);
        assert_eq!("webp".parse::<TargetFormat>().unwrap(), TargetFormat::Webp);
        assert!("bmp".parse::<TargetFormat>().is_err());
    }

    #[test]
    fn test_quality_range() {
        assert!(!is_valid_quality(9));
        assert!(is_valid_quality(10));
        assert!(is_valid_quality(100));
        assert!(!is_valid_quality(101));
    }

    #[test]
    fn test_with_extension() {
        assert_eq!(with_extension("a.png", "jpg"), "a.jpg");
        assert_eq!(with_extension("a.b.png", "jpg"), "a.b.jpg");
        assert_eq!(with_extension("noext", "png"), "noext.png");
        assert_eq!(with_extension(".hidden", "png"), ".hidden.png");
    }

    #[test]
    fn test_smaller_output_is_used_and_renamed() {
        let result = compress_file(&Halving, &file(), TargetFormat::Webp, 80);
        assert_eq!(result.compressed_size, 50);
        assert_eq!(result.original_size, 100);
        assert!((result.compression_ratio - 50.0).abs() < 1e-9);
        assert!(result.compressed_name.ends_with("_holiday_photo.png"));
        assert_eq!(result.original_name, "holiday photo.jpeg");
    }

    #[test]
    fn test_larger_output_falls_back_to_original() {
        let original = file();
        let result = compress_file(&Growing, &original, TargetFormat::Png, 80);
        assert_eq!(result.compressed_size, 100);
        assert_eq!(result.compression_ratio, 0.0);
        assert!(result.compressed_name.ends_with("_holiday_photo.jpeg"));
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&result.base64_data)
            .unwrap();
        assert_eq!(decoded, original.content.to_vec());
    }

    #[test]
    fn test_undecodable_input_falls_back_to_original() {
        let result = compress_file(&ImageConverter, &file(), TargetFormat::Jpeg, 80);
        assert_eq!(result.compressed_size, 100);
        assert!(result.compressed_name.ends_with("_holiday_photo.jpeg"));
    }

    #[test]
    fn test_all_keeps_original() {
        let result = compress_file(&Halving, &file(), TargetFormat::All, 80);
        assert_eq!(result.compressed_size, 100);
    }

    #[test]
    fn test_image_converter_round_trip_png() {
        let image = image::RgbImage::from_pixel(32, 32, image::Rgb([200, 10, 10]));
        let mut png = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        let png = png.into_inner();

        let jpeg = ImageConverter.convert(&png, TargetFormat::Jpeg, 50).unwrap();
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
    }
}
