//! Photo capture pipeline
//!
//! For items without a machine-readable code: each cycle photographs the
//! label, runs OCR, asks the extraction model for the fields and parses its
//! reply line by line.

mod extract;
mod label;
mod ocr;

pub use extract::{extractor_from_config, ChatCompletionsExtractor, PassthroughExtractor, TextExtractor};
pub use label::{parse_label_fields, CapturedLabelData};
pub use ocr::{recognize_once, OcrEngine, OcrWorker};

use crate::error::CaptureError;
use crate::frame::Frame;
use pantry_core::config::CaptureConfig;
use pantry_telemetry::{metrics, names, Timer};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// OCR + extraction + parsing for one frame
#[derive(Clone)]
pub struct CapturePipeline {
    ocr: Arc<dyn OcrEngine>,
    extractor: Arc<dyn TextExtractor>,
    language: String,
    prompt: String,
}

impl CapturePipeline {
    /// Pipeline with default language and prompt
    pub fn new(ocr: Arc<dyn OcrEngine>, extractor: Arc<dyn TextExtractor>) -> Self {
        Self::with_config(ocr, extractor, &CaptureConfig::default())
    }

    /// Pipeline using the configured OCR language and extraction prompt
    pub fn with_config(ocr: Arc<dyn OcrEngine>, extractor: Arc<dyn TextExtractor>, config: &CaptureConfig) -> Self {
        Self {
            ocr,
            extractor,
            language: config.ocr_language.clone(),
            prompt: config.extraction_prompt.clone(),
        }
    }

    /// Run one capture cycle over a frame.
    ///
    /// Frames with no recognizable text yield empty data without calling the
    /// extraction model.
    #[instrument(skip_all, fields(language = %self.language))]
    pub async fn run_cycle(&self, frame: &Frame) -> Result<CapturedLabelData, CaptureError> {
        metrics().increment(names::CAPTURE_CYCLES);
        let result = self.process(frame).await;
        if result.is_err() {
            metrics().increment(names::CAPTURE_FAILURES);
        }
        result
    }

    async fn process(&self, frame: &Frame) -> Result<CapturedLabelData, CaptureError> {
        let text = {
            let _timer = Timer::start(names::OCR_LATENCY_MS);
            recognize_once(self.ocr.as_ref(), &self.language, frame).await?
        };
        if text.trim().is_empty() {
            debug!("No text recognized");
            return Ok(CapturedLabelData::default());
        }

        let reply = {
            let _timer = Timer::start(names::EXTRACTION_LATENCY_MS);
            self.extractor.extract(&text, &self.prompt).await?
        };

        let data = parse_label_fields(&reply);
        debug!(has_name = data.has_name(), empty = data.is_empty(), "Label parsed");
        Ok(data)
    }
}

impl fmt::Debug for CapturePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturePipeline")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{blank_frame, MockOcr, RecordingExtractor};

    #[tokio::test]
    async fn test_cycle_parses_ocr_text() {
        let ocr = Arc::new(MockOcr::new("name: Organic Milk\nexpiry: 2025-03-01"));
        let pipeline = CapturePipeline::new(ocr.clone(), Arc::new(PassthroughExtractor));

        let data = pipeline.run_cycle(&blank_frame()).await.unwrap();

        assert_eq!(data.name.as_deref(), Some("Organic Milk"));
        assert_eq!(data.expiry_date.as_deref(), Some("2025-03-01"));
        assert!(data.manufacturing_date.is_none());
        assert!(data.batch_number.is_none());
        assert_eq!(ocr.terminated(), 1);
    }

    #[tokio::test]
    async fn test_extractor_receives_text_and_prompt() {
        let extractor = Arc::new(RecordingExtractor::replying("Name: Basmati Rice\nBatch Number: 7781"));
        let config = CaptureConfig {
            extraction_prompt: "List the label fields".to_string(),
            ..CaptureConfig::default()
        };
        let pipeline = CapturePipeline::with_config(Arc::new(MockOcr::new("BASMATI RICE LOT 7781")), extractor.clone(), &config);

        let data = pipeline.run_cycle(&blank_frame()).await.unwrap();

        assert_eq!(data.name.as_deref(), Some("Basmati Rice"));
        assert_eq!(data.batch_number.as_deref(), Some("7781"));
        assert_eq!(
            extractor.last_call(),
            Some(("BASMATI RICE LOT 7781".to_string(), "List the label fields".to_string()))
        );
    }

    #[tokio::test]
    async fn test_blank_text_skips_extraction() {
        let extractor = Arc::new(RecordingExtractor::replying("Name: never"));
        let pipeline = CapturePipeline::new(Arc::new(MockOcr::new("  \n ")), extractor.clone());

        let data = pipeline.run_cycle(&blank_frame()).await.unwrap();

        assert!(data.is_empty());
        assert!(extractor.last_call().is_none());
    }

    #[tokio::test]
    async fn test_ocr_failure_is_reported() {
        let ocr = Arc::new(MockOcr::failing());
        let pipeline = CapturePipeline::new(ocr.clone(), Arc::new(PassthroughExtractor));

        assert!(matches!(pipeline.run_cycle(&blank_frame()).await, Err(CaptureError::Ocr(_))));
        assert_eq!(ocr.terminated(), 1);
    }
}
