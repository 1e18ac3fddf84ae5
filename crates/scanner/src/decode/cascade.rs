//! Priority-ordered decoder cascade

use super::{BarcodeDecoder, DecodeCandidate, DecoderFactory, DecoderSource};
use crate::error::{ScanError, ScanResult};
use crate::frame::Frame;
use pantry_telemetry::{metrics, names};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Decoders available for one session, in priority order
pub struct DecoderCascade {
    decoders: Vec<(DecoderSource, Box<dyn BarcodeDecoder>)>,
}

impl DecoderCascade {
    /// Build every available decoder, highest priority first.
    ///
    /// Unavailable back ends are skipped. A back end that fails to construct,
    /// or an empty result, is a hard failure.
    pub fn build(factories: &[Arc<dyn DecoderFactory>]) -> ScanResult<Self> {
        let mut ordered: Vec<&Arc<dyn DecoderFactory>> = factories.iter().collect();
        ordered.sort_by_key(|f| f.source().priority());

        let mut decoders = Vec::with_capacity(ordered.len());
        for factory in ordered {
            let source = factory.source();
            match factory.create() {
                Ok(Some(decoder)) => decoders.push((source, decoder)),
                Ok(None) => debug!(%source, "Decoder not available on this platform"),
                Err(e) => {
                    return Err(ScanError::DecoderInit {
                        source_name: source.as_str(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if decoders.is_empty() {
            return Err(ScanError::DecoderInit {
                source_name: "any",
                reason: "no decoder back end is available".to_string(),
            });
        }

        debug!(sources = ?decoders.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>(), "Decoder cascade ready");
        Ok(Self { decoders })
    }

    /// Back ends in the order they are tried
    #[must_use]
    pub fn sources(&self) -> Vec<DecoderSource> {
        self.decoders.iter().map(|(s, _)| *s).collect()
    }

    /// Try each decoder in order, stopping at the first hit.
    ///
    /// A decoder error counts as a miss for that decoder only.
    pub async fn decode(&self, frame: &Frame) -> Option<DecodeCandidate> {
        for (source, decoder) in &self.decoders {
            match decoder.decode(frame).await {
                Ok(Some(raw_value)) => {
                    trace!(%source, value = %raw_value, "Decoder hit");
                    metrics().increment(names::DECODE_HITS);
                    return Some(DecodeCandidate {
                        raw_value,
                        source: *source,
                        timestamp: frame.captured_at(),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(%source, error = %e, "Decoder error, treating as miss");
                    metrics().increment(names::DECODE_ERRORS);
                }
            }
        }
        None
    }
}

impl fmt::Debug for DecoderCascade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderCascade")
            .field("sources", &self.sources())
            .finish()
    }
}
