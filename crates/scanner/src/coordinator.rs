//! Scan session coordinator
//!
//! Owns the mode state machine and the single active scan session:
//!
//! ```text
//! idle ──start_barcode_scan──▶ scanning ──confirmed──▶ resolved ──reset──▶ idle
//! idle ──start_photo_capture─▶ photo_capturing ──name found──▶ captured ──accept──▶ idle
//! any ──stop──▶ idle
//! ```
//!
//! A repeating timer task samples frames and hands each one to a spawned job
//! (decode or capture). At most one job per session is outstanding; ticks that
//! find a job in flight are skipped. Stopping bumps the session generation,
//! aborts the timer and releases the camera before returning. Jobs that are
//! still running finish normally and drop their results once they see the
//! generation has moved on.

use crate::camera::{CameraHandle, CameraPlatform, CameraSession, StreamConstraints};
use crate::capture::{CapturePipeline, CapturedLabelData};
use crate::decode::{DecoderCascade, DecoderFactory, DecoderSource, QrDecoderFactory, Stabilizer};
use crate::error::{ErrorKind, ScanError, ScanResult};
use crate::frame::Frame;
use chrono::{DateTime, Utc};
use pantry_core::config::ConfigSchema;
use pantry_lookup::{LookupChain, ProductRecord};
use pantry_telemetry::{metrics, names};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Buffered events per subscriber before the oldest are dropped
const EVENT_CAPACITY: usize = 32;

// ============================================================================
// Public types
// ============================================================================

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// No session
    #[default]
    Idle,
    /// Barcode session sampling frames
    Scanning,
    /// Photo session capturing labels
    PhotoCapturing,
    /// A barcode was confirmed; camera released
    Resolved,
    /// A capture yielded a name; cycles keep running until accepted
    Captured,
}

impl ScanState {
    /// Stable name for logs and output
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::PhotoCapturing => "photo_capturing",
            Self::Resolved => "resolved",
            Self::Captured => "captured",
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a session feeds its frames to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Decoder cascade + stabilizer + lookup
    Barcode,
    /// OCR + extraction
    Photo,
}

/// Identity of a started session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier
    pub id: Uuid,
    /// Session mode
    pub mode: SessionMode,
    /// When the camera was granted
    pub started_at: DateTime<Utc>,
}

/// The accepted barcode of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedScan {
    /// Confirmed value
    pub barcode: String,
    /// Decoder that produced the confirming read
    pub source: DecoderSource,
    /// Confirmation time
    pub confirmed_at: DateTime<Utc>,
}

/// Events delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ScanEvent {
    /// A barcode was confirmed and resolved; `product` is a placeholder when
    /// no provider knew it
    Confirmed {
        /// The confirmed scan
        scan: ConfirmedScan,
        /// Resolved product
        product: ProductRecord,
    },
    /// A capture cycle recovered at least a product name
    Captured(CapturedLabelData),
    /// Starting a session failed
    Error(ErrorKind),
}

/// Timing and threshold settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerSettings {
    /// Barcode frame sampling period
    pub poll_interval: Duration,
    /// Consecutive reads needed to confirm a value
    pub confirm_threshold: u32,
    /// Photo capture period
    pub capture_interval: Duration,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self::from(&ConfigSchema::default())
    }
}

impl From<&ConfigSchema> for ScannerSettings {
    fn from(schema: &ConfigSchema) -> Self {
        Self {
            poll_interval: schema.barcode.poll_interval(),
            confirm_threshold: schema.barcode.confirm_threshold,
            capture_interval: schema.capture.interval(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// One camera-backed interaction; owns the camera and all per-session state
struct ScanSession {
    info: SessionInfo,
    generation: u64,
    camera: Option<CameraHandle>,
    ticker: Option<JoinHandle<()>>,
    cascade: Option<Arc<DecoderCascade>>,
    stabilizer: Stabilizer,
    in_flight: Arc<AtomicBool>,
}

impl ScanSession {
    /// Stop sampling: abort the timer and release the camera
    fn halt_sampling(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(mut camera) = self.camera.take() {
            camera.release();
        }
    }

    fn teardown(&mut self) {
        self.halt_sampling();
        self.cascade = None;
        self.stabilizer.reset();
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Marks a job as outstanding for as long as it lives
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct Shared {
    state: ScanState,
    session: Option<ScanSession>,
    pending_capture: Option<CapturedLabelData>,
    confirmed: Option<(ConfirmedScan, ProductRecord)>,
}

impl Shared {
    /// The session only if it is still the one a job was started for
    fn current(&mut self, generation: u64) -> Option<&mut ScanSession> {
        self.session.as_mut().filter(|s| s.generation == generation)
    }
}

struct Inner {
    camera: CameraSession,
    decoders: Vec<Arc<dyn DecoderFactory>>,
    lookup: LookupChain,
    capture: Option<Arc<CapturePipeline>>,
    settings: ScannerSettings,
    events: broadcast::Sender<ScanEvent>,
    shared: Mutex<Shared>,
    start_lock: tokio::sync::Mutex<()>,
    generation: AtomicU64,
}

impl Inner {
    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: ScanEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Return to idle. Returns `true` if a session was torn down.
    fn stop(&self) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let session = {
            let mut shared = self.shared();
            shared.state = ScanState::Idle;
            shared.pending_capture = None;
            shared.confirmed = None;
            shared.session.take()
        };

        match session {
            Some(mut session) => {
                session.teardown();
                info!(session = %session.info.id, "Session stopped");
                true
            }
            None => false,
        }
    }

    /// Timer callback; returns `false` when the timer should end
    fn on_tick(inner: &Arc<Self>, generation: u64) -> bool {
        let mut shared = inner.shared();
        let Some(session) = shared.current(generation) else {
            return false;
        };

        let Some(in_flight) = InFlight::claim(&session.in_flight) else {
            trace!("Previous job still running, skipping tick");
            metrics().increment(names::FRAMES_SKIPPED_BUSY);
            return true;
        };
        let Some(frame) = session.camera.as_mut().and_then(CameraHandle::grab_frame) else {
            return true;
        };
        metrics().increment(names::FRAMES_SAMPLED);

        match session.info.mode {
            SessionMode::Barcode => {
                let Some(cascade) = session.cascade.clone() else {
                    return false;
                };
                tokio::spawn(decode_job(Arc::clone(inner), generation, cascade, frame, in_flight));
            }
            SessionMode::Photo => {
                let Some(pipeline) = inner.capture.clone() else {
                    return false;
                };
                tokio::spawn(capture_job(Arc::clone(inner), generation, pipeline, frame, in_flight));
            }
        }
        true
    }
}

fn spawn_ticker(inner: Weak<Inner>, generation: u64, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticks.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            if !Inner::on_tick(&inner, generation) {
                break;
            }
        }
    })
}

async fn decode_job(
    inner: Arc<Inner>,
    generation: u64,
    cascade: Arc<DecoderCascade>,
    frame: Frame,
    _in_flight: InFlight,
) {
    let Some(candidate) = cascade.decode(&frame).await else {
        return;
    };

    let scan = {
        let mut shared = inner.shared();
        let Some(session) = shared.current(generation) else {
            debug!("Discarding read from a stopped session");
            return;
        };
        let Some(barcode) = session.stabilizer.observe(&candidate.raw_value) else {
            return;
        };
        session.halt_sampling();
        shared.state = ScanState::Resolved;
        ConfirmedScan {
            barcode,
            source: candidate.source,
            confirmed_at: Utc::now(),
        }
    };
    metrics().increment(names::CONFIRMATIONS);
    info!(barcode = %scan.barcode, source = %scan.source, "Barcode confirmed");

    let product = match inner.lookup.lookup(&scan.barcode).await {
        Some(product) => product,
        None => ProductRecord::placeholder(&scan.barcode),
    };

    let mut shared = inner.shared();
    if shared.current(generation).is_none() {
        debug!(barcode = %scan.barcode, "Discarding lookup for a stopped session");
        return;
    }
    shared.confirmed = Some((scan.clone(), product.clone()));
    inner.publish(ScanEvent::Confirmed { scan, product });
}

async fn capture_job(
    inner: Arc<Inner>,
    generation: u64,
    pipeline: Arc<CapturePipeline>,
    frame: Frame,
    _in_flight: InFlight,
) {
    let data = match pipeline.run_cycle(&frame).await {
        Ok(data) => data,
        Err(e) => {
            warn!(error = %e, "Capture cycle failed");
            return;
        }
    };
    if data.is_empty() {
        debug!("Capture cycle recovered no fields");
        return;
    }

    let mut shared = inner.shared();
    if shared.current(generation).is_none() {
        debug!("Discarding capture from a stopped session");
        return;
    }
    let has_name = data.has_name();
    shared.pending_capture = Some(data.clone());
    if has_name {
        shared.state = ScanState::Captured;
        inner.publish(ScanEvent::Captured(data));
    } else {
        shared.state = ScanState::PhotoCapturing;
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Caller-facing scan-and-resolve service
pub struct ScanCoordinator {
    inner: Arc<Inner>,
}

impl ScanCoordinator {
    /// Start building a coordinator for a camera platform
    pub fn builder(camera: Arc<dyn CameraPlatform>) -> ScanCoordinatorBuilder {
        ScanCoordinatorBuilder::new(camera)
    }

    /// Subscribe to confirmed, captured and error events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.inner.events.subscribe()
    }

    /// Acquire the camera and start the barcode resolver.
    ///
    /// Any running session is torn down first.
    pub async fn start_barcode_scan(&self) -> ScanResult<SessionInfo> {
        self.start(SessionMode::Barcode).await
    }

    /// Acquire the camera and start periodic label capture.
    ///
    /// Any running session is torn down first.
    pub async fn start_photo_capture(&self) -> ScanResult<SessionInfo> {
        self.start(SessionMode::Photo).await
    }

    /// Return to idle, releasing everything. Safe to call at any time.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Leave `resolved` or `captured` for `idle`
    pub fn reset(&self) -> ScanResult<()> {
        match self.state() {
            ScanState::Idle => Ok(()),
            ScanState::Resolved | ScanState::Captured => {
                self.inner.stop();
                Ok(())
            }
            state => Err(ScanError::InvalidState {
                operation: "reset",
                state: state.as_str(),
            }),
        }
    }

    /// Take the pending capture and end the photo session.
    ///
    /// Returns `None` and keeps capturing when nothing is pending.
    pub fn accept_capture(&self) -> Option<CapturedLabelData> {
        let pending = self.inner.shared().pending_capture.take();
        if pending.is_some() {
            self.inner.stop();
        }
        pending
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ScanState {
        self.inner.shared().state
    }

    /// Active session, if any
    #[must_use]
    pub fn session(&self) -> Option<SessionInfo> {
        self.inner.shared().session.as_ref().map(|s| s.info.clone())
    }

    /// Latest capture waiting for acceptance
    #[must_use]
    pub fn pending_capture(&self) -> Option<CapturedLabelData> {
        self.inner.shared().pending_capture.clone()
    }

    /// Confirmed scan and its product, once the lookup has finished
    #[must_use]
    pub fn confirmed(&self) -> Option<(ConfirmedScan, ProductRecord)> {
        self.inner.shared().confirmed.clone()
    }

    /// True while the session holds the camera
    #[must_use]
    pub fn holds_camera(&self) -> bool {
        self.inner
            .shared()
            .session
            .as_ref()
            .is_some_and(|s| s.camera.as_ref().is_some_and(CameraHandle::is_active))
    }

    /// True while the sampling timer is scheduled
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.inner
            .shared()
            .session
            .as_ref()
            .is_some_and(|s| s.ticker.as_ref().is_some_and(|t| !t.is_finished()))
    }

    /// Effective settings
    #[must_use]
    pub fn settings(&self) -> &ScannerSettings {
        &self.inner.settings
    }

    async fn start(&self, mode: SessionMode) -> ScanResult<SessionInfo> {
        // Serializes starts so two acquisitions never overlap
        let _starting = self.inner.start_lock.lock().await;

        self.inner.stop();
        let generation = self.inner.generation.load(Ordering::SeqCst);

        let result = self.open_session(mode, generation).await;
        if let Err(e) = &result {
            let kind = e.kind();
            if !matches!(kind, ErrorKind::Cancelled | ErrorKind::InvalidState) {
                self.inner.publish(ScanEvent::Error(kind));
            }
        }
        result
    }

    async fn open_session(&self, mode: SessionMode, generation: u64) -> ScanResult<SessionInfo> {
        let inner = &self.inner;

        let cascade = match mode {
            SessionMode::Barcode => Some(Arc::new(DecoderCascade::build(&inner.decoders)?)),
            SessionMode::Photo => {
                if inner.capture.is_none() {
                    return Err(ScanError::CaptureUnavailable);
                }
                None
            }
        };

        let mut camera = inner.camera.acquire().await?;

        let mut shared = inner.shared();
        if inner.generation.load(Ordering::SeqCst) != generation {
            camera.release();
            debug!("Stopped while acquiring the camera");
            return Err(ScanError::SessionCancelled);
        }

        let info = SessionInfo {
            id: Uuid::new_v4(),
            mode,
            started_at: Utc::now(),
        };
        let period = match mode {
            SessionMode::Barcode => inner.settings.poll_interval,
            SessionMode::Photo => inner.settings.capture_interval,
        };

        shared.session = Some(ScanSession {
            info: info.clone(),
            generation,
            camera: Some(camera),
            ticker: Some(spawn_ticker(Arc::downgrade(inner), generation, period)),
            cascade,
            stabilizer: Stabilizer::new(inner.settings.confirm_threshold),
            in_flight: Arc::new(AtomicBool::new(false)),
        });
        shared.state = match mode {
            SessionMode::Barcode => ScanState::Scanning,
            SessionMode::Photo => ScanState::PhotoCapturing,
        };

        info!(session = %info.id, ?mode, period_ms = period.as_millis(), "Session started");
        Ok(info)
    }
}

impl Drop for ScanCoordinator {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl fmt::Debug for ScanCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanCoordinator")
            .field("state", &self.state())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ScanCoordinator`]
pub struct ScanCoordinatorBuilder {
    camera: Arc<dyn CameraPlatform>,
    constraints: StreamConstraints,
    decoders: Vec<Arc<dyn DecoderFactory>>,
    lookup: LookupChain,
    capture: Option<CapturePipeline>,
    settings: ScannerSettings,
}

impl ScanCoordinatorBuilder {
    fn new(camera: Arc<dyn CameraPlatform>) -> Self {
        Self {
            camera,
            constraints: StreamConstraints::default(),
            decoders: Vec::new(),
            lookup: LookupChain::new(),
            capture: None,
            settings: ScannerSettings::default(),
        }
    }

    /// Take camera constraints and timings from configuration
    #[must_use]
    pub fn config(mut self, schema: &ConfigSchema) -> Self {
        self.constraints = StreamConstraints::from(&schema.camera);
        self.settings = ScannerSettings::from(schema);
        self
    }

    /// Override camera constraints
    #[must_use]
    pub fn constraints(mut self, constraints: StreamConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Override timings and threshold
    #[must_use]
    pub fn settings(mut self, settings: ScannerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Register a decoder back end; order of registration does not matter
    #[must_use]
    pub fn decoder(mut self, factory: impl DecoderFactory + 'static) -> Self {
        self.decoders.push(Arc::new(factory));
        self
    }

    /// Provider chain used for confirmed barcodes
    #[must_use]
    pub fn lookup(mut self, lookup: LookupChain) -> Self {
        self.lookup = lookup;
        self
    }

    /// Enable photo capture
    #[must_use]
    pub fn capture(mut self, pipeline: CapturePipeline) -> Self {
        self.capture = Some(pipeline);
        self
    }

    /// Build the coordinator; with no decoders registered the QR decoder is used
    #[must_use]
    pub fn build(self) -> ScanCoordinator {
        let mut decoders = self.decoders;
        if decoders.is_empty() {
            decoders.push(Arc::new(QrDecoderFactory));
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        ScanCoordinator {
            inner: Arc::new(Inner {
                camera: CameraSession::new(self.camera, self.constraints),
                decoders,
                lookup: self.lookup,
                capture: self.capture.map(Arc::new),
                settings: self.settings,
                events,
                shared: Mutex::new(Shared::default()),
                start_lock: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PlatformError;
    use crate::capture::PassthroughExtractor;
    use crate::testing::{MockCamera, MockOcr, ScriptedDecoder, StaticProvider};
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::sleep;

    const BARCODE: &str = "012345678905";

    fn barcode_coordinator(camera: &Arc<MockCamera>, decoder: ScriptedDecoder) -> ScanCoordinator {
        ScanCoordinator::builder(camera.clone())
            .decoder(decoder)
            .lookup(LookupChain::new().with_provider(StaticProvider::with(BARCODE, "Whole Milk")))
            .build()
    }

    fn photo_coordinator(camera: &Arc<MockCamera>, ocr: &Arc<MockOcr>) -> ScanCoordinator {
        ScanCoordinator::builder(camera.clone())
            .capture(CapturePipeline::new(ocr.clone(), Arc::new(PassthroughExtractor)))
            .build()
    }

    fn drain(events: &mut broadcast::Receiver<ScanEvent>) -> Vec<ScanEvent> {
        let mut out = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => out.push(event),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return out,
                Err(TryRecvError::Lagged(_)) => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_consecutive_reads_confirm_once() {
        let camera = Arc::new(MockCamera::new());
        let decoder = ScriptedDecoder::new(DecoderSource::QrOnly).repeat(Some(BARCODE));
        let calls = decoder.calls();
        let coordinator = barcode_coordinator(&camera, decoder);
        let mut events = coordinator.subscribe();

        coordinator.start_barcode_scan().await.unwrap();
        assert_eq!(coordinator.state(), ScanState::Scanning);
        sleep(Duration::from_secs(3)).await;

        let events = drain(&mut events);
        assert_eq!(events.len(), 1);
        let ScanEvent::Confirmed { scan, product } = &events[0] else {
            panic!("expected a confirmation, got {events:?}");
        };
        assert_eq!(scan.barcode, BARCODE);
        assert_eq!(scan.source, DecoderSource::QrOnly);
        assert_eq!(product.name, "Whole Milk");

        // Sampling stopped at the confirming frame
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(coordinator.state(), ScanState::Resolved);
        assert!(!coordinator.holds_camera());
        assert!(!coordinator.is_polling());
        assert_eq!(camera.active_streams(), 0);
        assert_eq!(coordinator.confirmed().unwrap().0.barcode, BARCODE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_misses_never_confirm() {
        let camera = Arc::new(MockCamera::new());
        let coordinator = barcode_coordinator(&camera, ScriptedDecoder::new(DecoderSource::MultiFormat));
        let mut events = coordinator.subscribe();

        coordinator.start_barcode_scan().await.unwrap();
        sleep(Duration::from_secs(2)).await;

        assert!(drain(&mut events).is_empty());
        assert_eq!(coordinator.state(), ScanState::Scanning);
        assert!(coordinator.holds_camera());
        assert!(camera.grabs() >= 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alternating_values_never_confirm() {
        let camera = Arc::new(MockCamera::new());
        let reads: Vec<Option<&str>> = (0..20).map(|i| Some(if i % 2 == 0 { "A" } else { "B" })).collect();
        let decoder = ScriptedDecoder::new(DecoderSource::MultiFormat).reads(&reads);
        let coordinator = barcode_coordinator(&camera, decoder);
        let mut events = coordinator.subscribe();

        coordinator.start_barcode_scan().await.unwrap();
        sleep(Duration::from_secs(5)).await;

        assert!(drain(&mut events).is_empty());
        assert_eq!(coordinator.state(), ScanState::Scanning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_separated_by_misses_still_confirm() {
        let camera = Arc::new(MockCamera::new());
        let decoder = ScriptedDecoder::new(DecoderSource::Native).reads(&[
            Some(BARCODE),
            None,
            Some(BARCODE),
            None,
            Some(BARCODE),
        ]);
        let coordinator = barcode_coordinator(&camera, decoder);
        let mut events = coordinator.subscribe();

        coordinator.start_barcode_scan().await.unwrap();
        sleep(Duration::from_secs(2)).await;

        assert_eq!(drain(&mut events).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_barcode_gets_placeholder() {
        let camera = Arc::new(MockCamera::new());
        let decoder = ScriptedDecoder::new(DecoderSource::QrOnly).repeat(Some("4006381333931"));
        let coordinator = barcode_coordinator(&camera, decoder);
        let mut events = coordinator.subscribe();

        coordinator.start_barcode_scan().await.unwrap();
        sleep(Duration::from_secs(1)).await;

        let events = drain(&mut events);
        let Some(ScanEvent::Confirmed { product, .. }) = events.first() else {
            panic!("expected a confirmation, got {events:?}");
        };
        assert_eq!(product.name, "Product 4006381333931");
        assert!(product.is_placeholder());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_in_flight_decode() {
        let camera = Arc::new(MockCamera::new());
        let decoder = ScriptedDecoder::new(DecoderSource::QrOnly)
            .repeat(Some(BARCODE))
            .with_delay(Duration::from_secs(1));
        let calls = decoder.calls();
        let coordinator = ScanCoordinator::builder(camera.clone())
            .decoder(decoder)
            .settings(ScannerSettings {
                confirm_threshold: 1,
                ..ScannerSettings::default()
            })
            .build();
        let mut events = coordinator.subscribe();

        coordinator.start_barcode_scan().await.unwrap();
        // First tick at 200 ms starts a decode that takes a second
        sleep(Duration::from_millis(300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        coordinator.stop();
        assert!(!coordinator.is_polling());
        assert!(!coordinator.holds_camera());
        assert_eq!(camera.active_streams(), 0);
        assert_eq!(coordinator.state(), ScanState::Idle);

        sleep(Duration::from_secs(3)).await;

        // The decode finished but its result was dropped
        assert!(drain(&mut events).is_empty());
        assert_eq!(coordinator.state(), ScanState::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(camera.grabs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_ticks_are_skipped() {
        let camera = Arc::new(MockCamera::new());
        let decoder = ScriptedDecoder::new(DecoderSource::QrOnly).with_delay(Duration::from_millis(500));
        let calls = decoder.calls();
        let coordinator = barcode_coordinator(&camera, decoder);

        coordinator.start_barcode_scan().await.unwrap();
        // Decodes start at 200 ms and 800 ms; ticks at 400, 600 and 1000 find one in flight
        sleep(Duration::from_millis(1100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(camera.grabs(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_error_is_returned_and_published() {
        let camera = Arc::new(MockCamera::new().fail_with(PlatformError::NotAllowed));
        let coordinator = barcode_coordinator(&camera, ScriptedDecoder::new(DecoderSource::QrOnly));
        let mut events = coordinator.subscribe();

        let err = coordinator.start_barcode_scan().await.unwrap_err();

        assert!(matches!(err, ScanError::PermissionDenied));
        assert_eq!(drain(&mut events), vec![ScanEvent::Error(ErrorKind::PermissionDenied)]);
        assert_eq!(coordinator.state(), ScanState::Idle);
        assert!(coordinator.session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_insecure_context_is_published() {
        let camera = Arc::new(MockCamera::new().insecure());
        let coordinator = barcode_coordinator(&camera, ScriptedDecoder::new(DecoderSource::QrOnly));
        let mut events = coordinator.subscribe();

        assert!(coordinator.start_barcode_scan().await.is_err());
        assert_eq!(drain(&mut events), vec![ScanEvent::Error(ErrorKind::InsecureContext)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_acquiring_cancels() {
        let camera = Arc::new(MockCamera::new().with_open_delay(Duration::from_secs(1)));
        let coordinator = barcode_coordinator(&camera, ScriptedDecoder::new(DecoderSource::QrOnly));
        let mut events = coordinator.subscribe();

        let (result, ()) = tokio::join!(coordinator.start_barcode_scan(), async {
            sleep(Duration::from_millis(100)).await;
            coordinator.stop();
        });

        assert!(matches!(result, Err(ScanError::SessionCancelled)));
        assert_eq!(camera.open_calls(), 1);
        assert_eq!(camera.active_streams(), 0);
        assert_eq!(coordinator.state(), ScanState::Idle);
        assert!(!coordinator.is_polling());
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_starts_never_overlap() {
        let camera = Arc::new(MockCamera::new().with_open_delay(Duration::from_millis(100)));
        let coordinator = barcode_coordinator(&camera, ScriptedDecoder::new(DecoderSource::QrOnly));

        let (first, second) = tokio::join!(coordinator.start_barcode_scan(), coordinator.start_barcode_scan());

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(camera.open_calls(), 2);
        assert_eq!(camera.max_concurrent_opens(), 1);
        assert_eq!(camera.active_streams(), 1);
        assert_eq!(coordinator.session().unwrap().id, second.unwrap().id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_switch_releases_previous_camera() {
        let camera = Arc::new(MockCamera::new());
        let ocr = Arc::new(MockOcr::new(""));
        let coordinator = photo_coordinator(&camera, &ocr);

        coordinator.start_barcode_scan().await.unwrap();
        coordinator.start_photo_capture().await.unwrap();

        assert_eq!(camera.stops(), 1);
        assert_eq!(camera.active_streams(), 1);
        assert_eq!(coordinator.state(), ScanState::PhotoCapturing);
        assert_eq!(coordinator.session().unwrap().mode, SessionMode::Photo);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_starts_fresh_session() {
        let camera = Arc::new(MockCamera::new());
        let decoder = ScriptedDecoder::new(DecoderSource::QrOnly).repeat(Some(BARCODE));
        let coordinator = barcode_coordinator(&camera, decoder);
        let mut events = coordinator.subscribe();

        coordinator.start_barcode_scan().await.unwrap();
        assert!(matches!(coordinator.reset(), Err(ScanError::InvalidState { .. })));
        sleep(Duration::from_secs(1)).await;
        assert_eq!(coordinator.state(), ScanState::Resolved);

        coordinator.reset().unwrap();
        assert_eq!(coordinator.state(), ScanState::Idle);
        assert!(coordinator.confirmed().is_none());

        // The latch and counters belong to the old session
        coordinator.start_barcode_scan().await.unwrap();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(drain(&mut events).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_photo_capture_cycle() {
        let camera = Arc::new(MockCamera::new());
        let ocr = Arc::new(MockOcr::new("name: Organic Milk\nexpiry: 2025-03-01"));
        let coordinator = photo_coordinator(&camera, &ocr);
        let mut events = coordinator.subscribe();

        coordinator.start_photo_capture().await.unwrap();
        sleep(Duration::from_millis(4900)).await;
        assert!(drain(&mut events).is_empty());

        sleep(Duration::from_millis(200)).await;
        let expected = CapturedLabelData {
            name: Some("Organic Milk".to_string()),
            expiry_date: Some("2025-03-01".to_string()),
            manufacturing_date: None,
            batch_number: None,
        };
        assert_eq!(drain(&mut events), vec![ScanEvent::Captured(expected.clone())]);
        assert_eq!(coordinator.state(), ScanState::Captured);

        // Cycles continue until the caller accepts
        assert!(coordinator.holds_camera());
        sleep(Duration::from_secs(5)).await;
        assert_eq!(ocr.created(), 2);

        assert_eq!(coordinator.accept_capture(), Some(expected));
        assert_eq!(coordinator.state(), ScanState::Idle);
        assert_eq!(camera.active_streams(), 0);
        assert_eq!(ocr.created(), ocr.terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_without_name_stays_capturing() {
        let camera = Arc::new(MockCamera::new());
        let ocr = Arc::new(MockOcr::new("Batch Number: L42"));
        let coordinator = photo_coordinator(&camera, &ocr);
        let mut events = coordinator.subscribe();

        coordinator.start_photo_capture().await.unwrap();
        sleep(Duration::from_millis(5100)).await;

        assert!(drain(&mut events).is_empty());
        assert_eq!(coordinator.state(), ScanState::PhotoCapturing);
        assert_eq!(coordinator.pending_capture().unwrap().batch_number.as_deref(), Some("L42"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_without_pending_keeps_capturing() {
        let camera = Arc::new(MockCamera::new());
        let ocr = Arc::new(MockOcr::new(""));
        let coordinator = photo_coordinator(&camera, &ocr);

        coordinator.start_photo_capture().await.unwrap();
        assert!(coordinator.accept_capture().is_none());
        assert_eq!(coordinator.state(), ScanState::PhotoCapturing);
        assert!(coordinator.holds_camera());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_ocr_cycles_terminate_workers() {
        let camera = Arc::new(MockCamera::new());
        let ocr = Arc::new(MockOcr::failing());
        let coordinator = photo_coordinator(&camera, &ocr);

        coordinator.start_photo_capture().await.unwrap();
        sleep(Duration::from_millis(15_100)).await;

        assert_eq!(ocr.created(), 3);
        assert_eq!(ocr.terminated(), 3);
        assert!(coordinator.pending_capture().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_photo_capture_requires_pipeline() {
        let camera = Arc::new(MockCamera::new());
        let coordinator = barcode_coordinator(&camera, ScriptedDecoder::new(DecoderSource::QrOnly));

        let err = coordinator.start_photo_capture().await.unwrap_err();
        assert!(matches!(err, ScanError::CaptureUnavailable));
        assert_eq!(camera.open_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let camera = Arc::new(MockCamera::new());
        let coordinator = barcode_coordinator(&camera, ScriptedDecoder::new(DecoderSource::QrOnly));

        coordinator.stop();
        coordinator.start_barcode_scan().await.unwrap();
        coordinator.stop();
        coordinator.stop();

        assert_eq!(camera.stops(), 1);
        assert_eq!(coordinator.state(), ScanState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_tears_down() {
        let camera = Arc::new(MockCamera::new());
        let coordinator = barcode_coordinator(&camera, ScriptedDecoder::new(DecoderSource::QrOnly));

        coordinator.start_barcode_scan().await.unwrap();
        sleep(Duration::from_millis(500)).await;
        let grabs = camera.grabs();
        drop(coordinator);

        assert_eq!(camera.active_streams(), 0);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(camera.grabs(), grabs);
    }

    #[test]
    fn test_settings_from_config() {
        let settings = ScannerSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_millis(200));
        assert_eq!(settings.confirm_threshold, 3);
        assert_eq!(settings.capture_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(ScanEvent::Error(ErrorKind::DeviceBusy)).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"], "device_busy");
    }
}
