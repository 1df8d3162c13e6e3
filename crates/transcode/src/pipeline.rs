//! The three pixel stages: decode, render, encode.
//!
//! Each stage is a plain blocking function so the engine can run them either
//! inline or on the blocking pool.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, ImageReader, Pixel, Rgb, RgbImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

use crate::config::TranscodeConfig;
use crate::dimensions::Dimensions;
use crate::error::{TranscodeError, TranscodeResult};
use crate::format::ImageFormat;

/// Smooth resampling filter. Triangle is bilinear interpolation.
const RESAMPLE_FILTER: FilterType = FilterType::Triangle;

/// Decode encoded bytes into a pixel surface, enforcing the configured
/// input budget before any pixel buffer is allocated.
pub(crate) fn decode(bytes: &[u8], config: &TranscodeConfig) -> TranscodeResult<DynamicImage> {
    if bytes.is_empty() {
        return Err(TranscodeError::Decode("file is empty".into()));
    }

    let reader = guessed_reader(bytes)?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| TranscodeError::Decode(e.to_string()))?;
    if width as u64 * height as u64 > config.max_input_pixels {
        return Err(TranscodeError::ResolutionTooLarge { width, height });
    }

    let mut reader = guessed_reader(bytes)?;
    reader.limits(config.decoder_limits());
    let image = reader
        .decode()
        .map_err(|e| TranscodeError::Decode(e.to_string()))?;

    debug!(
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        "source decoded"
    );
    Ok(image)
}

fn guessed_reader(bytes: &[u8]) -> TranscodeResult<ImageReader<Cursor<&[u8]>>> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TranscodeError::Decode(e.to_string()))?;
    if reader.format().is_none() {
        return Err(TranscodeError::Decode("unsupported image format".into()));
    }
    Ok(reader)
}

/// Produce the output surface at `target` size for `format`.
///
/// Targets without an alpha channel get the source composited onto opaque
/// white. Compositing happens before resampling, which gives the same result
/// as painting white first and drawing the scaled source on top.
pub(crate) fn render(image: &DynamicImage, target: Dimensions, format: ImageFormat) -> DynamicImage {
    let has_alpha = image.color().has_alpha();

    if has_alpha && format.supports_transparency() {
        let rgba = resample(image.to_rgba8(), target);
        return DynamicImage::ImageRgba8(rgba);
    }

    let rgb = if has_alpha {
        flatten_onto_white(&image.to_rgba8())
    } else {
        image.to_rgb8()
    };
    DynamicImage::ImageRgb8(resample(rgb, target))
}

fn resample<P>(buffer: ImageBuffer<P, Vec<u8>>, target: Dimensions) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    if buffer.dimensions() == (target.width, target.height) {
        return buffer;
    }
    imageops::resize(&buffer, target.width, target.height, RESAMPLE_FILTER)
}

/// Alpha-composite every pixel over opaque white.
pub(crate) fn flatten_onto_white(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Map a `[0, 1]` quality fraction onto the JPEG encoder's 1..=100 scale.
pub(crate) fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Encode the surface. Quality is only consulted by lossy encoders.
pub(crate) fn encode(image: &DynamicImage, format: ImageFormat, quality: f32) -> TranscodeResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality(quality));
            image
                .to_rgb8()
                .write_with_encoder(encoder)
                .map_err(|e| TranscodeError::Encode(format!("JPEG encode failed: {e}")))?;
        }
        ImageFormat::Png => {
            image
                .write_to(&mut buf, format.codec())
                .map_err(|e| TranscodeError::Encode(format!("PNG encode failed: {e}")))?;
        }
        ImageFormat::Webp => buf.get_mut().extend_from_slice(&encode_webp(image, quality)?),
    }

    let encoded = buf.into_inner();
    if encoded.is_empty() {
        return Err(TranscodeError::Encode("encoder produced no output".into()));
    }
    debug!(bytes = encoded.len(), format = %format, "output encoded");
    Ok(encoded)
}

/// Map a `[0, 1]` quality fraction onto libwebp's 0..=100 scale.
pub(crate) fn webp_quality(quality: f32) -> f32 {
    (quality * 100.0).clamp(0.0, 100.0)
}

/// Lossy WebP through libwebp. Alpha is carried when the surface has it.
fn encode_webp(image: &DynamicImage, quality: f32) -> TranscodeResult<Vec<u8>> {
    let (width, height) = (image.width(), image.height());
    let encoded = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height)
            .encode_simple(false, webp_quality(quality))
            .map(|memory| memory.to_vec())
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height)
            .encode_simple(false, webp_quality(quality))
            .map(|memory| memory.to_vec())
    };
    encoded.map_err(|e| TranscodeError::Encode(format!("WebP encode failed: {e:?}")))
}
