//! Closed mapping between target formats, media types and file extensions.
//!
//! Media types are never split apart to guess an extension. Anything not in
//! the table is unknown, and callers decide the fallback explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raster formats the engine can encode to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

/// Media type aliases accepted on input, including the non-standard ones
/// browsers and older tools still send.
const MIME_TABLE: &[(&str, ImageFormat)] = &[
    ("image/jpeg", ImageFormat::Jpeg),
    ("image/jpg", ImageFormat::Jpeg),
    ("image/pjpeg", ImageFormat::Jpeg),
    ("image/png", ImageFormat::Png),
    ("image/x-png", ImageFormat::Png),
    ("image/webp", ImageFormat::Webp),
];

impl ImageFormat {
    pub const ALL: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Webp];

    /// Look up a declared media type. Parameters (`; charset=...`) and case
    /// are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        MIME_TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(essence))
            .map(|(_, format)| *format)
    }

    /// Look up a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    /// Canonical media type.
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }

    /// Canonical extension. JPEG output is always written as `.jpg`.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    /// Whether the encoder can store an alpha channel. Formats without one
    /// are flattened onto white before encoding.
    pub fn supports_transparency(self) -> bool {
        !matches!(self, ImageFormat::Jpeg)
    }

    /// Whether the quality fraction influences the encoder. PNG is the only
    /// lossless target.
    pub fn is_lossy(self) -> bool {
        !matches!(self, ImageFormat::Png)
    }

    pub(crate) fn codec(self) -> image::ImageFormat {
        match self {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Webp => image::ImageFormat::WebP,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Replace the final extension of `name` with the one for `format`.
///
/// Only a trailing `.ext` segment is stripped (`photo.final.png` keeps
/// `photo.final`). A name that is nothing but an extension falls back to
/// `image`.
pub fn derive_filename(name: &str, format: ImageFormat) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => stem,
        _ => name,
    };
    let stem = if stem.is_empty() { "image" } else { stem };
    format!("{stem}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_table_is_closed() {
        assert_eq!(ImageFormat::from_mime("image/jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_mime("IMAGE/PJPEG"), Some(ImageFormat::Jpeg));
        assert_eq!(
            ImageFormat::from_mime("image/png; charset=binary"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_mime("image/webp"), Some(ImageFormat::Webp));
        assert_eq!(ImageFormat::from_mime("image/svg+xml"), None);
        assert_eq!(ImageFormat::from_mime("image/"), None);
        assert_eq!(ImageFormat::from_mime(""), None);
    }

    #[test]
    fn jpeg_maps_to_jpg_extension() {
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
        assert_eq!(ImageFormat::Jpeg.mime(), "image/jpeg");
        assert_eq!(ImageFormat::from_extension("JPEG"), Some(ImageFormat::Jpeg));
    }

    #[test]
    fn only_jpeg_is_flattened() {
        for format in ImageFormat::ALL {
            assert_eq!(
                format.supports_transparency(),
                format != ImageFormat::Jpeg,
                "{format}"
            );
        }
    }

    #[test]
    fn only_png_ignores_quality() {
        assert!(ImageFormat::Jpeg.is_lossy());
        assert!(ImageFormat::Webp.is_lossy());
        assert!(!ImageFormat::Png.is_lossy());
    }

    #[test]
    fn filename_replaces_last_extension() {
        assert_eq!(derive_filename("holiday.png", ImageFormat::Jpeg), "holiday.jpg");
        assert_eq!(
            derive_filename("scan.final.jpeg", ImageFormat::Webp),
            "scan.final.webp"
        );
        assert_eq!(derive_filename("README", ImageFormat::Png), "README.png");
        assert_eq!(derive_filename("trailing.", ImageFormat::Png), "trailing..png");
        assert_eq!(derive_filename(".png", ImageFormat::Jpeg), "image.jpg");
    }
}
