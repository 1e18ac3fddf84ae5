//! Barcode decoding
//!
//! Decoders are built per session from a list of [`DecoderFactory`]s and tried
//! in priority order for every frame. Reads are then debounced by the
//! [`Stabilizer`] until one value is confirmed.

mod cascade;
mod qr;
mod stabilizer;

pub use cascade::DecoderCascade;
pub use qr::{QrDecoder, QrDecoderFactory};
pub use stabilizer::Stabilizer;

use crate::frame::Frame;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Decoder back end, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderSource {
    /// Platform-native detector covering 1D and 2D formats
    Native,
    /// General-purpose multi-format decoder
    MultiFormat,
    /// QR-only decoder
    QrOnly,
}

impl DecoderSource {
    /// Lower runs first
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::Native => 0,
            Self::MultiFormat => 1,
            Self::QrOnly => 2,
        }
    }

    /// Stable name for logs and output
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::MultiFormat => "multi_format",
            Self::QrOnly => "qr_only",
        }
    }
}

impl fmt::Display for DecoderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw value read from one frame by one decoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeCandidate {
    /// Decoded payload
    pub raw_value: String,
    /// Decoder that produced it
    pub source: DecoderSource,
    /// When the frame was sampled
    pub timestamp: DateTime<Utc>,
}

/// Decoder failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct DecodeError(pub String);

impl DecodeError {
    /// Create a decode error
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// One decoding back end
#[async_trait]
pub trait BarcodeDecoder: Send + Sync {
    /// Decode a frame.
    ///
    /// `Ok(None)` is an ordinary miss.
    async fn decode(&self, frame: &Frame) -> Result<Option<String>, DecodeError>;
}

/// Capability-checked constructor for a decoder back end
pub trait DecoderFactory: Send + Sync {
    /// Which back end this factory builds
    fn source(&self) -> DecoderSource;

    /// Build the decoder.
    ///
    /// `Ok(None)` means the back end is not available on this platform and is
    /// skipped; `Err` means it is available but failed to construct.
    fn create(&self) -> Result<Option<Box<dyn BarcodeDecoder>>, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut sources = vec![DecoderSource::QrOnly, DecoderSource::Native, DecoderSource::MultiFormat];
        sources.sort_by_key(|s| s.priority());
        assert_eq!(
            sources,
            vec![DecoderSource::Native, DecoderSource::MultiFormat, DecoderSource::QrOnly]
        );
    }

    #[test]
    fn test_source_names() {
        assert_eq!(DecoderSource::MultiFormat.to_string(), "multi_format");
        assert_eq!(
            serde_json::to_string(&DecoderSource::QrOnly).unwrap(),
            r#""qr_only""#
        );
    }
}
