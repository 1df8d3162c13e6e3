//! The [`Transcoder`] entry points.
//!
//! Every conversion is a pure function of its inputs: decode, fit the target
//! dimensions, render, encode. The async variants run decode and encode on
//! the blocking pool and therefore suspend exactly twice, once when the source
//! is decoded and once when the output is encoded. There is no cancellation;
//! dropping the future only discards the result.

use bytes::Bytes;
use image::DynamicImage;
use std::num::NonZeroU32;
use std::time::Instant;
use tracing::{info, instrument};

use crate::config::{ConfigError, TranscodeConfig};
use crate::dimensions::Dimensions;
use crate::error::{TranscodeError, TranscodeResult};
use crate::format::{derive_filename, ImageFormat};
use crate::pipeline::{decode, encode, render};
use crate::types::{ConversionResult, SourceImage, TranscodeOptions};

/// Local, stateless image converter.
#[derive(Debug, Clone, Default)]
pub struct Transcoder {
    config: TranscodeConfig,
}

/// Validated plan for the render and encode stages.
#[derive(Debug, Clone, Copy)]
struct RenderPlan {
    format: ImageFormat,
    quality: f32,
    target: Dimensions,
}

impl Transcoder {
    pub fn new(config: TranscodeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    /// Convert on the current thread.
    #[instrument(skip_all, fields(name = %source.name, format = %options.format))]
    pub fn convert_blocking(
        &self,
        source: &SourceImage,
        options: &TranscodeOptions,
    ) -> TranscodeResult<ConversionResult> {
        let start = Instant::now();
        let bounds = options.validate()?;
        let decoded = decode(&source.bytes, &self.config)?;
        let plan = self.plan(&decoded, options, bounds)?;
        let encoded = encode(&render(&decoded, plan.target, plan.format), plan.format, plan.quality)?;
        Ok(finish(source, plan, encoded, start))
    }

    /// Convert with decode and encode offloaded to the blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip_all, fields(name = %source.name, format = %options.format))]
    pub async fn convert(
        &self,
        source: SourceImage,
        options: TranscodeOptions,
    ) -> TranscodeResult<ConversionResult> {
        let start = Instant::now();
        let bounds = options.validate()?;

        let bytes = source.bytes.clone();
        let config = self.config.clone();
        let decoded = run_blocking(move || decode(&bytes, &config)).await?;

        let plan = self.plan(&decoded, &options, bounds)?;
        let encoded = run_blocking(move || {
            let surface = render(&decoded, plan.target, plan.format);
            drop(decoded);
            encode(&surface, plan.format, plan.quality)
        })
        .await?;

        Ok(finish(&source, plan, encoded, start))
    }

    /// Re-encode at `quality`, keeping PNG as PNG and turning everything else
    /// into JPEG.
    pub fn compress_blocking(&self, source: &SourceImage, quality: f32) -> TranscodeResult<ConversionResult> {
        self.convert_blocking(source, &compress_options(source, quality))
    }

    pub async fn compress(&self, source: SourceImage, quality: f32) -> TranscodeResult<ConversionResult> {
        let options = compress_options(&source, quality);
        self.convert(source, options).await
    }

    /// Bound the dimensions, keeping the source's own format.
    pub fn resize_blocking(
        &self,
        source: &SourceImage,
        max_width: u32,
        max_height: u32,
    ) -> TranscodeResult<ConversionResult> {
        self.convert_blocking(source, &resize_options(source, max_width, max_height))
    }

    pub async fn resize(
        &self,
        source: SourceImage,
        max_width: u32,
        max_height: u32,
    ) -> TranscodeResult<ConversionResult> {
        let options = resize_options(&source, max_width, max_height);
        self.convert(source, options).await
    }

    fn plan(
        &self,
        decoded: &DynamicImage,
        options: &TranscodeOptions,
        (max_width, max_height): (Option<NonZeroU32>, Option<NonZeroU32>),
    ) -> TranscodeResult<RenderPlan> {
        let target =
            Dimensions::new(decoded.width(), decoded.height()).fit_within(max_width, max_height);
        if target.pixel_count() > self.config.max_output_pixels {
            return Err(TranscodeError::ResolutionTooLarge {
                width: target.width,
                height: target.height,
            });
        }
        Ok(RenderPlan {
            format: options.format,
            quality: options.quality.unwrap_or(self.config.default_quality),
            target,
        })
    }
}

/// Format the source is considered to be in: the declared media type when it
/// is in the table, otherwise whatever the bytes look like.
pub fn source_format(source: &SourceImage) -> Option<ImageFormat> {
    if source.media_type.is_some() {
        return source.declared_format();
    }
    match image::guess_format(&source.bytes).ok()? {
        image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
        image::ImageFormat::Png => Some(ImageFormat::Png),
        image::ImageFormat::WebP => Some(ImageFormat::Webp),
        _ => None,
    }
}

fn compress_options(source: &SourceImage, quality: f32) -> TranscodeOptions {
    let format = match source_format(source) {
        Some(ImageFormat::Png) => ImageFormat::Png,
        _ => ImageFormat::Jpeg,
    };
    TranscodeOptions::new(format).with_quality(quality)
}

/// Resize keeps the source format. A declared type outside the table comes
/// out as PNG so transparency survives; an undeclared, unrecognised source
/// comes out as JPEG.
fn resize_options(source: &SourceImage, max_width: u32, max_height: u32) -> TranscodeOptions {
    let declared = source.media_type.as_deref().is_some_and(|m| !m.trim().is_empty());
    let format = match source_format(source) {
        Some(format) => format,
        None if declared => ImageFormat::Png,
        None => ImageFormat::Jpeg,
    };
    TranscodeOptions::new(format)
        .with_max_width(max_width)
        .with_max_height(max_height)
}

fn finish(source: &SourceImage, plan: RenderPlan, encoded: Vec<u8>, start: Instant) -> ConversionResult {
    let result = ConversionResult {
        filename: derive_filename(&source.name, plan.format),
        format: plan.format,
        dimensions: plan.target,
        original_size: source.len(),
        converted_size: encoded.len() as u64,
        bytes: Bytes::from(encoded),
    };
    info!(
        filename = %result.filename,
        width = result.dimensions.width,
        height = result.dimensions.height,
        original_size = result.original_size,
        converted_size = result.converted_size,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "conversion complete"
    );
    result
}

async fn run_blocking<T, F>(stage: F) -> TranscodeResult<T>
where
    F: FnOnce() -> TranscodeResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(stage)
        .await
        .map_err(|e| TranscodeError::Runtime(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn encoded(image: &DynamicImage, format: image::ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn gradient_jpeg(width: u32, height: u32) -> SourceImage {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let bytes = encoded(&DynamicImage::ImageRgb8(img), image::ImageFormat::Jpeg);
        SourceImage::new("landscape.jpeg", bytes).with_media_type("image/jpeg")
    }

    /// Photographic-ish content: a gradient with per-pixel noise, left half
    /// fully transparent.
    fn transparent_png(side: u32) -> SourceImage {
        let img = RgbaImage::from_fn(side, side, |x, y| {
            let noise = (x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503))
                .wrapping_mul(2_246_822_519)
                >> 28;
            let alpha = if x < side / 2 { 0 } else { 255 };
            Rgba([
                ((x % 256) as u8).wrapping_add(noise as u8),
                ((y % 256) as u8).wrapping_add(noise as u8),
                128 + noise as u8,
                alpha,
            ])
        });
        let bytes = encoded(&DynamicImage::ImageRgba8(img), image::ImageFormat::Png);
        SourceImage::new("logo.png", bytes).with_media_type("image/png")
    }

    #[test]
    fn max_width_scales_proportionally() {
        let result = Transcoder::default()
            .convert_blocking(
                &gradient_jpeg(2000, 1000),
                &TranscodeOptions::new(ImageFormat::Jpeg).with_max_width(1000),
            )
            .unwrap();
        assert_eq!(result.dimensions, Dimensions::new(1000, 500));

        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1000, 500));
        assert_eq!(result.filename, "landscape.jpg");
        assert_eq!(result.media_type(), "image/jpeg");
    }

    #[test]
    fn transparent_png_to_jpeg_is_opaque_and_smaller_than_lossless() {
        let source = transparent_png(500);
        let engine = Transcoder::default();

        let jpeg = engine
            .convert_blocking(&source, &TranscodeOptions::new(ImageFormat::Jpeg).with_quality(0.8))
            .unwrap();
        let decoded = image::load_from_memory(&jpeg.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (500, 500));
        assert!(!decoded.color().has_alpha());

        let lossless = engine
            .convert_blocking(&source, &TranscodeOptions::new(ImageFormat::Png))
            .unwrap();
        assert!(jpeg.converted_size < lossless.converted_size);
    }

    #[test]
    fn same_format_keeps_format_string() {
        let source = transparent_png(16);
        let result = Transcoder::default()
            .convert_blocking(&source, &TranscodeOptions::new(ImageFormat::Png))
            .unwrap();
        assert_eq!(result.format, ImageFormat::Png);
        assert_eq!(result.filename, "logo.png");
        assert!(image::load_from_memory(&result.bytes).unwrap().color().has_alpha());
    }

    #[test]
    fn corrupt_input_is_a_decode_error() {
        let source = SourceImage::new("broken.jpg", b"\xFF\xD8\xFF\xE0 truncated".to_vec());
        let err = Transcoder::default()
            .convert_blocking(&source, &TranscodeOptions::new(ImageFormat::Png))
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Decode(_)), "{err:?}");
    }

    #[test]
    fn output_budget_blocks_runaway_upscale() {
        let engine = Transcoder::new(TranscodeConfig {
            max_output_pixels: 10_000,
            ..Default::default()
        })
        .unwrap();
        // Bounds only shrink, so an upscale can only come from a source that
        // is already over budget.
        let err = engine
            .convert_blocking(&gradient_jpeg(200, 100), &TranscodeOptions::new(ImageFormat::Png))
            .unwrap_err();
        assert_eq!(
            err,
            TranscodeError::ResolutionTooLarge {
                width: 200,
                height: 100
            }
        );
    }

    #[test]
    fn compress_keeps_png_and_jpegs_the_rest() {
        let engine = Transcoder::default();
        let png = engine.compress_blocking(&transparent_png(32), 0.5).unwrap();
        assert_eq!(png.format, ImageFormat::Png);

        let webp_bytes = encoded(&DynamicImage::new_rgb8(8, 8), image::ImageFormat::WebP);
        let webp = SourceImage::new("shot.webp", webp_bytes).with_media_type("image/webp");
        let out = engine.compress_blocking(&webp, 0.5).unwrap();
        assert_eq!(out.format, ImageFormat::Jpeg);
        assert_eq!(out.filename, "shot.jpg");
    }

    #[test]
    fn resize_keeps_declared_format() {
        let engine = Transcoder::default();
        let png = engine.resize_blocking(&transparent_png(64), 32, 32).unwrap();
        assert_eq!(png.format, ImageFormat::Png);
        assert_eq!(png.dimensions, Dimensions::new(32, 32));
    }

    #[test]
    fn resize_of_unlisted_type_keeps_transparency_as_png() {
        let engine = Transcoder::default();
        let gif_bytes = encoded(&DynamicImage::new_rgba8(40, 20), image::ImageFormat::Gif);
        let gif = SourceImage::new("anim.gif", gif_bytes).with_media_type("image/gif");
        let out = engine.resize_blocking(&gif, 20, 20).unwrap();
        assert_eq!(out.format, ImageFormat::Png);
        assert_eq!(out.filename, "anim.png");
        assert_eq!(out.dimensions, Dimensions::new(20, 10));
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn resize_of_undeclared_unknown_bytes_falls_back_to_jpeg() {
        let bmp_bytes = encoded(&DynamicImage::new_rgb8(40, 20), image::ImageFormat::Bmp);
        let bmp = SourceImage::new("scan.bmp", bmp_bytes);
        let out = Transcoder::default().resize_blocking(&bmp, 20, 20).unwrap();
        assert_eq!(out.format, ImageFormat::Jpeg);
        assert_eq!(out.filename, "scan.jpg");
    }

    #[test]
    fn undeclared_sources_are_sniffed() {
        let mut source = transparent_png(4);
        source.media_type = None;
        assert_eq!(source_format(&source), Some(ImageFormat::Png));
    }

    #[tokio::test]
    async fn async_convert_matches_blocking() {
        let engine = Transcoder::default();
        let source = gradient_jpeg(300, 200);
        let options = TranscodeOptions::new(ImageFormat::Png).with_max_height(100);

        let sync = engine.convert_blocking(&source, &options).unwrap();
        let asynchronous = engine.convert(source, options).await.unwrap();
        assert_eq!(sync.dimensions, asynchronous.dimensions);
        assert_eq!(asynchronous.dimensions, Dimensions::new(150, 100));
        assert_eq!(sync.bytes, asynchronous.bytes);
    }

    #[tokio::test]
    async fn async_options_are_validated_before_decoding() {
        let err = Transcoder::default()
            .convert(
                SourceImage::new("x.png", Vec::<u8>::new()),
                TranscodeOptions::new(ImageFormat::Png).with_max_width(0),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidOptions(_)));
    }
}
