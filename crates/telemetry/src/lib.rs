//! Logging and in-process metrics for the pantry scanner
//!
//! - Structured logging with `tracing`, compact text or JSON, optional log file
//! - A process-wide session id for correlating log lines
//! - Counters and duration histograms exported as JSON
//! - A [`Timer`] guard for measuring provider, OCR and extraction latency

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use pantry_core::config::TelemetrySection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};
use uuid::Uuid;

/// Global metrics registry
static METRICS: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::new);

/// Global session ID for correlating logs
static SESSION_ID: Lazy<String> = Lazy::new(|| Uuid::new_v4().to_string());

/// Environment variable consulted before `RUST_LOG`
pub const LOG_ENV: &str = "PANTRY_LOG";

/// Metric names recorded by the scanner crates
pub mod names {
    pub const FRAMES_SAMPLED: &str = "scanner.frames_sampled";
    pub const FRAMES_SKIPPED_BUSY: &str = "scanner.frames_skipped_busy";
    pub const DECODE_HITS: &str = "scanner.decode_hits";
    pub const DECODE_ERRORS: &str = "scanner.decode_errors";
    pub const CONFIRMATIONS: &str = "scanner.confirmations";
    pub const CAMERA_ACQUIRED: &str = "camera.acquired";
    pub const CAMERA_FAILURES: &str = "camera.failures";
    pub const LOOKUP_HITS: &str = "lookup.hits";
    pub const LOOKUP_MISSES: &str = "lookup.misses";
    pub const PROVIDER_FAILURES: &str = "lookup.provider_failures";
    pub const PROVIDER_LATENCY_MS: &str = "lookup.provider_latency_ms";
    pub const CAPTURE_CYCLES: &str = "capture.cycles";
    pub const CAPTURE_FAILURES: &str = "capture.failures";
    pub const OCR_LATENCY_MS: &str = "capture.ocr_latency_ms";
    pub const EXTRACTION_LATENCY_MS: &str = "capture.extraction_latency_ms";
}

/// Keeps the background log writer alive; drop it at shutdown to flush.
#[must_use = "dropping the guard stops the file writer"]
pub struct TelemetryGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the telemetry system with defaults
pub fn init() -> anyhow::Result<TelemetryGuard> {
    init_with_config(&TelemetryConfig::default())
}

/// Initialize with custom configuration
pub fn init_with_config(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(&config.log_level));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_file(config.show_file)
                .with_line_number(config.show_line_number)
                .compact()
                .boxed(),
        );
    }

    let mut file_guard = None;
    if let Some(path) = &config.log_file {
        let path = Path::new(path);
        let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("log_file has no file name: {}", path.display()))?;

        let appender = tracing_appender::rolling::never(directory, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
        file_guard = Some(guard);
    }

    let subscriber = tracing_subscriber::registry().with(layers).with(filter);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {e}"))?;

    tracing::info!(
        session_id = %session_id(),
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        _file_guard: file_guard,
    })
}

/// Get the current session ID
pub fn session_id() -> &'static str {
    &SESSION_ID
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub json: bool,
    pub log_file: Option<String>,
    pub show_target: bool,
    pub show_thread_ids: bool,
    pub show_file: bool,
    pub show_line_number: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            log_file: None,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

impl From<&TelemetrySection> for TelemetryConfig {
    fn from(section: &TelemetrySection) -> Self {
        Self {
            log_level: section.log_level.clone(),
            json: section.json,
            log_file: section.log_file.clone(),
            ..Self::default()
        }
    }
}

impl TelemetryConfig {
    /// Raise verbosity to debug for the pantry crates
    #[must_use]
    pub fn verbose(mut self) -> Self {
        self.log_level = "pantry_scanner=debug,pantry_lookup=debug,pantry_scan=debug,info".to_string();
        self.show_target = true;
        self
    }
}

/// Metrics registry for collecting and exporting metrics
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, AtomicU64>>,
    histograms: RwLock<HashMap<String, Vec<f64>>>,
    start_time: Instant,
    started_at: DateTime<Utc>,
}

impl MetricsRegistry {
    fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Increment a counter
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    /// Increment a counter by a specific amount
    pub fn increment_by(&self, name: &str, value: u64) {
        {
            let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(counter) = counters.get(name) {
                counter.fetch_add(value, Ordering::Relaxed);
                return;
            }
        }
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }

    /// Current value of a counter (zero when never incremented)
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Record a histogram value
    pub fn histogram(&self, name: &str, value: f64) {
        let mut histograms = self.histograms.write().unwrap_or_else(PoisonError::into_inner);
        histograms.entry(name.to_string()).or_default().push(value);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics as JSON
    pub fn export_json(&self) -> serde_json::Value {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        let histograms = self.histograms.read().unwrap_or_else(PoisonError::into_inner);

        let counter_values: HashMap<String, u64> = counters
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let histogram_stats: HashMap<String, HistogramStats> = histograms
            .iter()
            .map(|(k, v)| (k.clone(), HistogramStats::from_values(v)))
            .collect();

        serde_json::json!({
            "session_id": session_id(),
            "timestamp": Utc::now().to_rfc3339(),
            "started_at": self.started_at.to_rfc3339(),
            "uptime_secs": self.uptime_secs(),
            "counters": counter_values,
            "histograms": histogram_stats,
        })
    }
}

/// Histogram statistics
#[derive(Debug, Serialize)]
pub struct HistogramStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
}

impl HistogramStats {
    #[allow(clippy::cast_precision_loss)]
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                count: 0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                p50: 0.0,
                p95: 0.0,
            };
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();

        Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: sum / count as f64,
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
        }
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Get the global metrics registry
pub fn metrics() -> &'static MetricsRegistry {
    &METRICS
}

/// Timer for measuring operation duration.
///
/// Records into the named histogram exactly once, either on [`Timer::stop`]
/// or when dropped.
pub struct Timer {
    name: &'static str,
    start: Option<Instant>,
}

impl Timer {
    /// Start a new timer
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Some(Instant::now()),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let Some(start) = self.start.take() else {
            return Duration::ZERO;
        };
        let duration = start.elapsed();
        metrics().histogram(self.name, duration.as_secs_f64() * 1000.0);
        tracing::trace!(metric = self.name, duration_ms = duration.as_millis(), "Timer completed");
        duration
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.record();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counter() {
        let registry = MetricsRegistry::new();
        registry.increment("test_counter");
        registry.increment("test_counter");
        registry.increment_by("test_counter", 3);

        assert_eq!(registry.counter("test_counter"), 5);
        assert_eq!(registry.counter("missing"), 0);
    }

    #[test]
    fn test_histogram_stats() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let stats = HistogramStats::from_values(&values);

        assert_eq!(stats.count, 10);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 10.0);
        assert_eq!(stats.mean, 5.5);
    }

    #[test]
    fn test_export_json_shape() {
        let registry = MetricsRegistry::new();
        registry.increment(names::CONFIRMATIONS);
        registry.histogram(names::OCR_LATENCY_MS, 12.0);

        let json = registry.export_json();
        assert_eq!(json["counters"][names::CONFIRMATIONS], 1);
        assert_eq!(json["histograms"][names::OCR_LATENCY_MS]["count"], 1);
    }

    #[test]
    fn test_export_json_timestamps() {
        let registry = MetricsRegistry::new();
        let json = registry.export_json();

        let started = DateTime::parse_from_rfc3339(json["started_at"].as_str().unwrap()).unwrap();
        let exported = DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).unwrap();
        assert!(exported >= started);
    }

    #[test]
    fn test_timer_records_once() {
        let timer = Timer::start("telemetry.test_timer_records_once");
        std::thread::sleep(Duration::from_millis(5));
        let duration = timer.stop();
        assert!(duration.as_millis() >= 5);

        let histograms = metrics().histograms.read().unwrap();
        assert_eq!(histograms["telemetry.test_timer_records_once"].len(), 1);
    }

    #[test]
    fn test_config_from_section() {
        let section = TelemetrySection {
            log_level: "warn".to_string(),
            json: true,
            log_file: Some("scan.log".to_string()),
        };
        let config = TelemetryConfig::from(&section);
        assert_eq!(config.log_level, "warn");
        assert!(config.json);
        assert_eq!(config.log_file.as_deref(), Some("scan.log"));
    }

    #[test]
    fn test_session_id() {
        let id = session_id();
        assert!(Uuid::parse_str(id).is_ok());
    }
}
