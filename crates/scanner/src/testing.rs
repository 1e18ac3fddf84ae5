//! Test doubles shared by the unit tests

use crate::camera::{CameraPlatform, PlatformError, StreamConstraints, VideoStream};
use crate::capture::{OcrEngine, OcrWorker, TextExtractor};
use crate::decode::{BarcodeDecoder, DecodeError, DecoderFactory, DecoderSource};
use crate::error::CaptureError;
use crate::frame::Frame;
use async_trait::async_trait;
use pantry_lookup::{LookupResult, ProductProvider, ProductRecord};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn blank_frame() -> Frame {
    Frame::from_luma(8, 8, vec![255; 64]).unwrap()
}

// ============================================================================
// Camera
// ============================================================================

#[derive(Default)]
struct StreamCounters {
    active: AtomicUsize,
    stops: AtomicUsize,
    grabs: AtomicUsize,
}

pub(crate) struct MockCamera {
    secure: bool,
    supported: bool,
    open_delay: Option<Duration>,
    failures: Mutex<VecDeque<PlatformError>>,
    requests: Mutex<Vec<StreamConstraints>>,
    open_calls: AtomicUsize,
    opening: AtomicUsize,
    max_opening: AtomicUsize,
    counters: Arc<StreamCounters>,
}

impl MockCamera {
    pub(crate) fn new() -> Self {
        Self {
            secure: true,
            supported: true,
            open_delay: None,
            failures: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            open_calls: AtomicUsize::new(0),
            opening: AtomicUsize::new(0),
            max_opening: AtomicUsize::new(0),
            counters: Arc::default(),
        }
    }

    pub(crate) fn insecure(mut self) -> Self {
        self.secure = false;
        self
    }

    pub(crate) fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Queue a failure for the next open attempt
    pub(crate) fn fail_with(self, error: PlatformError) -> Self {
        self.failures.lock().unwrap().push_back(error);
        self
    }

    pub(crate) fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub(crate) fn active_streams(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn grabs(&self) -> usize {
        self.counters.grabs.load(Ordering::SeqCst)
    }

    pub(crate) fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_concurrent_opens(&self) -> usize {
        self.max_opening.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<StreamConstraints> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CameraPlatform for MockCamera {
    fn is_secure_context(&self) -> bool {
        self.secure
    }

    fn supports_capture(&self) -> bool {
        self.supported
    }

    async fn open_stream(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>, PlatformError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(constraints.clone());

        let now_opening = self.opening.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_opening.fetch_max(now_opening, Ordering::SeqCst);
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        self.opening.fetch_sub(1, Ordering::SeqCst);

        let failure = self.failures.lock().unwrap().pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        self.counters.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            counters: Arc::clone(&self.counters),
            stopped: false,
        }))
    }
}

struct MockStream {
    counters: Arc<StreamCounters>,
    stopped: bool,
}

impl VideoStream for MockStream {
    fn grab_frame(&mut self) -> Option<Frame> {
        if self.stopped {
            return None;
        }
        self.counters.grabs.fetch_add(1, Ordering::SeqCst);
        Some(blank_frame())
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.counters.active.fetch_sub(1, Ordering::SeqCst);
            self.counters.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ============================================================================
// Decoders
// ============================================================================

/// Decoder factory whose decoders replay a shared script of reads
pub(crate) struct ScriptedDecoder {
    source: DecoderSource,
    script: Arc<Mutex<VecDeque<Option<String>>>>,
    fallback: Option<String>,
    fail: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDecoder {
    pub(crate) fn new(source: DecoderSource) -> Self {
        Self {
            source,
            script: Arc::default(),
            fallback: None,
            fail: false,
            delay: None,
            calls: Arc::default(),
        }
    }

    /// Read returned once the script is exhausted
    pub(crate) fn repeat(mut self, value: Option<&str>) -> Self {
        self.fallback = value.map(String::from);
        self
    }

    /// Reads returned in order, one per decode call
    pub(crate) fn reads(self, values: &[Option<&str>]) -> Self {
        self.script
            .lock()
            .unwrap()
            .extend(values.iter().map(|v| v.map(String::from)));
        self
    }

    pub(crate) fn fail_always(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl DecoderFactory for ScriptedDecoder {
    fn source(&self) -> DecoderSource {
        self.source
    }

    fn create(&self) -> Result<Option<Box<dyn BarcodeDecoder>>, DecodeError> {
        Ok(Some(Box::new(ScriptedInstance {
            script: Arc::clone(&self.script),
            fallback: self.fallback.clone(),
            fail: self.fail,
            delay: self.delay,
            calls: Arc::clone(&self.calls),
        })))
    }
}

struct ScriptedInstance {
    script: Arc<Mutex<VecDeque<Option<String>>>>,
    fallback: Option<String>,
    fail: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl BarcodeDecoder for ScriptedInstance {
    async fn decode(&self, _frame: &Frame) -> Result<Option<String>, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(DecodeError::new("scripted failure"));
        }
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

// ============================================================================
// OCR and extraction
// ============================================================================

pub(crate) struct MockOcr {
    text: Option<String>,
    created: Arc<AtomicUsize>,
    terminated: Arc<AtomicUsize>,
    last_language: Mutex<Option<String>>,
}

impl MockOcr {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            created: Arc::default(),
            terminated: Arc::default(),
            last_language: Mutex::new(None),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            text: None,
            ..Self::new("")
        }
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    pub(crate) fn last_language(&self) -> Option<String> {
        self.last_language.lock().unwrap().clone()
    }
}

#[async_trait]
impl OcrEngine for MockOcr {
    async fn create_worker(&self, language: &str) -> Result<Box<dyn OcrWorker>, CaptureError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        *self.last_language.lock().unwrap() = Some(language.to_string());
        Ok(Box::new(MockOcrWorker {
            text: self.text.clone(),
            terminated: Arc::clone(&self.terminated),
        }))
    }
}

struct MockOcrWorker {
    text: Option<String>,
    terminated: Arc<AtomicUsize>,
}

#[async_trait]
impl OcrWorker for MockOcrWorker {
    async fn recognize(&mut self, _frame: &Frame) -> Result<String, CaptureError> {
        self.text
            .clone()
            .ok_or_else(|| CaptureError::Ocr("engine crashed".to_string()))
    }

    async fn terminate(self: Box<Self>) {
        self.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct RecordingExtractor {
    reply: String,
    last_call: Mutex<Option<(String, String)>>,
}

impl RecordingExtractor {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            last_call: Mutex::new(None),
        }
    }

    pub(crate) fn last_call(&self) -> Option<(String, String)> {
        self.last_call.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextExtractor for RecordingExtractor {
    async fn extract(&self, text: &str, prompt: &str) -> Result<String, CaptureError> {
        *self.last_call.lock().unwrap() = Some((text.to_string(), prompt.to_string()));
        Ok(self.reply.clone())
    }
}

// ============================================================================
// Lookup
// ============================================================================

/// Provider answering from a fixed table
pub(crate) struct StaticProvider {
    products: HashMap<String, ProductRecord>,
}

impl StaticProvider {
    pub(crate) fn with(barcode: &str, name: &str) -> Self {
        let record = ProductRecord {
            source: Some("static".to_string()),
            ..ProductRecord::named(name)
        };
        Self {
            products: HashMap::from([(barcode.to_string(), record)]),
        }
    }
}

#[async_trait]
impl ProductProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self, barcode: &str) -> LookupResult<Option<ProductRecord>> {
        Ok(self.products.get(barcode).cloned())
    }
}
