//! Filekit Transcode Layer
//!
//! Local bitmap conversion with no network involved: decode an image, bound
//! its dimensions, re-encode it to a target format and report how the size
//! changed.
//!
//! ## What we do here
//!
//! - **Format conversion** between JPEG, PNG and WebP through an explicit
//!   media type table (`image/jpeg` → `.jpg`, never string surgery)
//! - **Two-stage bounding**: width bound first, then height bound, aspect
//!   ratio preserved
//! - **Flatten to white** when the target cannot store transparency
//! - **Quality control** for lossy targets; lossless targets ignore it
//! - **Byte accounting** via [`SizeReport`] and [`format_bytes`]
//!
//! ## Example
//!
//! ```no_run
//! use transcode::{ImageFormat, SourceImage, TranscodeOptions, Transcoder};
//!
//! let bytes = std::fs::read("photo.png").unwrap();
//! let source = SourceImage::new("photo.png", bytes).with_media_type("image/png");
//! let options = TranscodeOptions::new(ImageFormat::Jpeg)
//!     .with_quality(0.8)
//!     .with_max_width(1280);
//!
//! let result = Transcoder::default().convert_blocking(&source, &options).unwrap();
//! println!("{} {}", result.filename, result.size_report());
//! ```

mod config;
mod dimensions;
mod engine;
mod error;
mod format;
mod pipeline;
mod report;
mod types;

pub use crate::config::{ConfigError, TranscodeConfig};
pub use crate::dimensions::Dimensions;
pub use crate::engine::{source_format, Transcoder};
pub use crate::error::{TranscodeError, TranscodeResult};
pub use crate::format::{derive_filename, ImageFormat};
pub use crate::report::{format_bytes, SizeReport};
pub use crate::types::{ConversionResult, SourceImage, TranscodeOptions};
