//! Inputs and outputs of the transcoding engine.
//!
//! ```text
//! SourceImage ──┐
//!               ├─ convert() ─▶ ConversionResult
//! TranscodeOptions
//! ```
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

use crate::dimensions::Dimensions;
use crate::error::{TranscodeError, TranscodeResult};
use crate::format::ImageFormat;
use crate::report::SizeReport;

/// An encoded image as handed over by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// Original file name, used to derive the output name.
    pub name: String,
    /// Media type the caller declared, if any. Not trusted for decoding.
    pub media_type: Option<String>,
    pub bytes: Bytes,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Declared format, resolved through the closed media type table.
    pub fn declared_format(&self) -> Option<ImageFormat> {
        self.media_type.as_deref().and_then(ImageFormat::from_mime)
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// What to produce from a source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TranscodeOptions {
    pub format: ImageFormat,
    /// Quality fraction in `[0, 1]`; ignored by lossless encoders.
    #[serde(default)]
    pub quality: Option<f32>,
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub max_height: Option<u32>,
}

impl TranscodeOptions {
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            quality: None,
            max_width: None,
            max_height: None,
        }
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width);
        self
    }

    pub fn with_max_height(mut self, max_height: u32) -> Self {
        self.max_height = Some(max_height);
        self
    }

    /// Check quality range and bound positivity, returning the bounds in
    /// their validated form.
    pub fn validate(&self) -> TranscodeResult<(Option<NonZeroU32>, Option<NonZeroU32>)> {
        if let Some(quality) = self.quality.filter(|q| !(0.0..=1.0).contains(q)) {
            return Err(TranscodeError::InvalidOptions(format!(
                "quality must be within [0, 1], got {quality}"
            )));
        }
        Ok((
            positive_bound("max_width", self.max_width)?,
            positive_bound("max_height", self.max_height)?,
        ))
    }
}

fn positive_bound(name: &str, value: Option<u32>) -> TranscodeResult<Option<NonZeroU32>> {
    match value {
        None => Ok(None),
        Some(raw) => NonZeroU32::new(raw).map(Some).ok_or_else(|| {
            TranscodeError::InvalidOptions(format!("{name} must be a positive integer"))
        }),
    }
}

/// A finished conversion. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub bytes: Bytes,
    pub filename: String,
    pub format: ImageFormat,
    pub dimensions: Dimensions,
    pub original_size: u64,
    pub converted_size: u64,
}

impl ConversionResult {
    /// Media type of the produced payload.
    pub fn media_type(&self) -> &'static str {
        self.format.mime()
    }

    pub fn size_report(&self) -> SizeReport {
        SizeReport::new(self.original_size, self.converted_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_edges() {
        let opts = TranscodeOptions::new(ImageFormat::Jpeg).with_quality(0.0);
        assert!(opts.validate().is_ok());
        let opts = TranscodeOptions::new(ImageFormat::Jpeg).with_quality(1.0);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_quality_and_zero_bounds() {
        let opts = TranscodeOptions::new(ImageFormat::Jpeg).with_quality(1.01);
        assert!(matches!(opts.validate(), Err(TranscodeError::InvalidOptions(_))));

        let opts = TranscodeOptions::new(ImageFormat::Jpeg).with_quality(f32::NAN);
        assert!(matches!(opts.validate(), Err(TranscodeError::InvalidOptions(_))));

        let opts = TranscodeOptions::new(ImageFormat::Png).with_max_height(0);
        let err = opts.validate().unwrap_err();
        assert_eq!(
            err,
            TranscodeError::InvalidOptions("max_height must be a positive integer".into())
        );
    }

    #[test]
    fn options_deserialize_with_optional_fields() {
        let opts: TranscodeOptions =
            serde_json::from_str(r#"{"format":"webp","max_width":800}"#).unwrap();
        assert_eq!(opts.format, ImageFormat::Webp);
        assert_eq!(opts.max_width, Some(800));
        assert_eq!(opts.quality, None);
    }

    #[test]
    fn declared_format_uses_closed_table() {
        let src = SourceImage::new("a.gif", vec![1u8]).with_media_type("image/gif");
        assert_eq!(src.declared_format(), None);
        let src = SourceImage::new("a.jpg", vec![1u8]).with_media_type("image/jpeg");
        assert_eq!(src.declared_format(), Some(ImageFormat::Jpeg));
    }
}
