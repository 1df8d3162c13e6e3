//! Error types produced by the transcode crate.
//!
//! Every failure is a user-input problem (an unreadable file, an option out of
//! range) or an encoder that produced nothing. None of them are transient, so
//! callers should surface the message and never retry.
//!
//! | Error | Category | Description |
//! |-------|----------|-------------|
//! | [`Decode`](TranscodeError::Decode) | Input | Source bytes are corrupt or in an unsupported format |
//! | [`Encode`](TranscodeError::Encode) | Output | Encoder failed or produced zero bytes |
//! | [`InvalidOptions`](TranscodeError::InvalidOptions) | Validation | Quality or bounds out of range |
//! | [`ResolutionTooLarge`](TranscodeError::ResolutionTooLarge) | Validation | Target surface exceeds the configured pixel budget |
//! | [`Runtime`](TranscodeError::Runtime) | Runtime | The blocking worker running a stage panicked or was shut down |
//!
//! ```rust
//! use transcode::TranscodeError;
//!
//! let err = TranscodeError::Decode("unexpected end of file".into());
//! assert_eq!(err.to_string(), "failed to load image: unexpected end of file");
//! ```
use thiserror::Error;

/// Errors that can occur while decoding, transforming or encoding an image.
///
/// Cloneable and comparable so tests can match on exact variants, the same
/// way the ingest errors are handled upstream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TranscodeError {
    /// The source could not be decoded.
    #[error("failed to load image: {0}")]
    Decode(String),

    /// The encoder failed or returned an empty buffer.
    #[error("conversion failed: {0}")]
    Encode(String),

    /// Options or configuration were rejected before any pixel work started.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The computed output surface is larger than the configured budget.
    #[error("image resolution exceeds maximum ({width}x{height})")]
    ResolutionTooLarge { width: u32, height: u32 },

    /// A blocking stage did not complete (panic or runtime shutdown).
    #[error("transcode worker failed: {0}")]
    Runtime(String),
}

pub type TranscodeResult<T> = Result<T, TranscodeError>;
