//! Runtime configuration for the transcoding engine.
//!
//! [`TranscodeConfig`] holds the defaults and resource ceilings that apply to
//! every conversion. It is cheap to clone and deserializes from JSON, TOML or
//! YAML like the other pipeline configs.
//!
//! ```rust
//! use transcode::TranscodeConfig;
//!
//! let config = TranscodeConfig::default();
//! config.validate().expect("defaults are valid");
//! assert_eq!(config.default_quality, 0.85);
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine-wide defaults and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Quality used by lossy encoders when the caller leaves it unset.
    ///
    /// Default: `0.85`
    pub default_quality: f32,

    /// Largest source surface (width × height) the decoder will accept.
    ///
    /// Default: 100 megapixels
    pub max_input_pixels: u64,

    /// Largest target surface the engine will allocate. Upscaling beyond the
    /// source is allowed, but not past this budget.
    ///
    /// Default: 100 megapixels
    pub max_output_pixels: u64,

    /// Decoder allocation ceiling in bytes.
    ///
    /// Default: 1 GiB
    pub max_alloc_bytes: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            default_quality: 0.85,
            max_input_pixels: 100_000_000,
            max_output_pixels: 100_000_000,
            max_alloc_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Configuration validation failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("default_quality must be within [0, 1], got {0}")]
    QualityOutOfRange(f32),

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),
}

impl TranscodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.default_quality) {
            return Err(ConfigError::QualityOutOfRange(self.default_quality));
        }
        if self.max_input_pixels == 0 {
            return Err(ConfigError::ZeroLimit("max_input_pixels"));
        }
        if self.max_output_pixels == 0 {
            return Err(ConfigError::ZeroLimit("max_output_pixels"));
        }
        if self.max_alloc_bytes == 0 {
            return Err(ConfigError::ZeroLimit("max_alloc_bytes"));
        }
        Ok(())
    }

    /// Decoder limits derived from this config.
    pub(crate) fn decoder_limits(&self) -> image::Limits {
        let mut limits = image::Limits::default();
        limits.max_alloc = Some(self.max_alloc_bytes);
        limits
    }
}
