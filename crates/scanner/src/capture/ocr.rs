//! OCR engine seam
//!
//! OCR back ends hand out short-lived workers. A worker is created for one
//! frame and terminated right after, whether recognition succeeded or not.

use crate::error::CaptureError;
use crate::frame::Frame;
use async_trait::async_trait;
use tracing::debug;

/// Creates OCR workers
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Start a worker for the given language code (e.g. `eng`)
    async fn create_worker(&self, language: &str) -> Result<Box<dyn OcrWorker>, CaptureError>;
}

/// One OCR worker
#[async_trait]
pub trait OcrWorker: Send {
    /// Recognize text in a frame
    async fn recognize(&mut self, frame: &Frame) -> Result<String, CaptureError>;

    /// Shut the worker down and free its resources
    async fn terminate(self: Box<Self>);
}

/// Create a worker, recognize one frame, and always terminate the worker
pub async fn recognize_once(engine: &dyn OcrEngine, language: &str, frame: &Frame) -> Result<String, CaptureError> {
    let mut worker = engine.create_worker(language).await?;
    let result = worker.recognize(frame).await;
    worker.terminate().await;
    debug!(ok = result.is_ok(), "OCR worker terminated");
    result
}
