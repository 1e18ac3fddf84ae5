//! Camera session management
//!
//! A [`CameraSession`] knows how to ask the platform for a video stream; a
//! [`CameraHandle`] owns one granted stream and releases it exactly once,
//! either explicitly or on drop.

use crate::error::{ScanError, ScanResult};
use crate::frame::Frame;
use async_trait::async_trait;
use pantry_core::config::CameraConfig;
use pantry_telemetry::{metrics, names};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Which camera to prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera
    User,
    /// Rear camera, pointed at the item
    #[default]
    Environment,
}

impl FacingMode {
    /// Parse the configuration spelling
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "environment" => Some(Self::Environment),
            _ => None,
        }
    }

    /// Configuration spelling
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Environment => "environment",
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video stream request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConstraints {
    /// Preferred camera
    pub facing_mode: FacingMode,
    /// Ideal width in pixels; `None` lets the platform choose
    pub width: Option<u32>,
    /// Ideal height in pixels; `None` lets the platform choose
    pub height: Option<u32>,
}

impl StreamConstraints {
    /// Request with an ideal resolution
    #[must_use]
    pub fn ideal(facing_mode: FacingMode, width: u32, height: u32) -> Self {
        Self {
            facing_mode,
            width: Some(width),
            height: Some(height),
        }
    }

    /// Same facing mode, no resolution requirement
    #[must_use]
    pub fn relaxed(&self) -> Self {
        Self {
            facing_mode: self.facing_mode,
            width: None,
            height: None,
        }
    }

    /// True when nothing beyond the facing mode is requested
    #[must_use]
    pub fn is_minimal(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }
}

impl From<&CameraConfig> for StreamConstraints {
    fn from(config: &CameraConfig) -> Self {
        let facing_mode = FacingMode::parse(&config.facing_mode).unwrap_or_default();
        Self::ideal(facing_mode, config.ideal_width, config.ideal_height)
    }
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self::from(&CameraConfig::default())
    }
}

/// Failure reported by the camera platform when opening a stream
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// User or policy refused access
    #[error("camera access not allowed")]
    NotAllowed,
    /// Device exists but cannot be read, usually because another process holds it
    #[error("camera not readable: {0}")]
    NotReadable(String),
    /// No device satisfies the constraints
    #[error("constraints not satisfiable: {0}")]
    Overconstrained(String),
    /// No camera device present
    #[error("no camera device found")]
    NotFound,
    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl From<PlatformError> for ScanError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotAllowed => Self::PermissionDenied,
            PlatformError::NotReadable(detail) => Self::DeviceBusy(detail),
            PlatformError::Overconstrained(detail) => Self::Overconstrained(detail),
            PlatformError::NotFound => Self::Camera("no camera device found".to_string()),
            PlatformError::Other(detail) => Self::Camera(detail),
        }
    }
}

/// Camera capability of the host platform
#[async_trait]
pub trait CameraPlatform: Send + Sync {
    /// Whether the app runs from a secure origin (HTTPS or localhost)
    fn is_secure_context(&self) -> bool;

    /// Whether the platform can capture video at all
    fn supports_capture(&self) -> bool;

    /// Request a live video stream
    async fn open_stream(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>, PlatformError>;
}

/// A granted, revocable video stream
pub trait VideoStream: Send {
    /// Sample the current frame; `None` when no frame is ready yet
    fn grab_frame(&mut self) -> Option<Frame>;

    /// Stop all tracks and give the device back
    fn stop(&mut self);
}

/// Acquires camera streams with the configured constraints
#[derive(Clone)]
pub struct CameraSession {
    platform: Arc<dyn CameraPlatform>,
    constraints: StreamConstraints,
}

impl CameraSession {
    /// Create a session manager for a platform
    pub fn new(platform: Arc<dyn CameraPlatform>, constraints: StreamConstraints) -> Self {
        Self { platform, constraints }
    }

    /// Constraints requested on the first attempt
    #[must_use]
    pub fn constraints(&self) -> &StreamConstraints {
        &self.constraints
    }

    /// Acquire the camera with the session's configured constraints
    pub async fn acquire(&self) -> ScanResult<CameraHandle> {
        self.acquire_with(&self.constraints).await
    }

    /// Acquire the camera with constraints chosen for this call.
    ///
    /// Checks the secure-context and capability preconditions first. An
    /// overconstrained request is retried once with only the facing mode.
    #[instrument(skip(self), fields(facing = %constraints.facing_mode))]
    pub async fn acquire_with(&self, constraints: &StreamConstraints) -> ScanResult<CameraHandle> {
        let result = self.try_acquire(constraints).await;
        match &result {
            Ok(handle) => {
                metrics().increment(names::CAMERA_ACQUIRED);
                info!(handle = %handle.id(), relaxed = handle.constraints().is_minimal(), "Camera acquired");
            }
            Err(e) => {
                metrics().increment(names::CAMERA_FAILURES);
                warn!(error = %e, "Camera acquisition failed");
            }
        }
        result
    }

    async fn try_acquire(&self, constraints: &StreamConstraints) -> ScanResult<CameraHandle> {
        if !self.platform.is_secure_context() {
            return Err(ScanError::InsecureContext);
        }
        if !self.platform.supports_capture() {
            return Err(ScanError::Unsupported);
        }

        match self.platform.open_stream(constraints).await {
            Ok(stream) => Ok(CameraHandle::new(stream, constraints.clone())),
            Err(PlatformError::Overconstrained(detail)) if !constraints.is_minimal() => {
                debug!(detail = %detail, "Retrying with minimal constraints");
                let relaxed = constraints.relaxed();
                let stream = self.platform.open_stream(&relaxed).await?;
                Ok(CameraHandle::new(stream, relaxed))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraSession")
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}

/// Exclusive ownership of one granted camera stream
pub struct CameraHandle {
    id: Uuid,
    stream: Option<Box<dyn VideoStream>>,
    constraints: StreamConstraints,
}

impl CameraHandle {
    fn new(stream: Box<dyn VideoStream>, constraints: StreamConstraints) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream: Some(stream),
            constraints,
        }
    }

    /// Handle identifier for logs
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Constraints the stream was granted with
    #[must_use]
    pub fn constraints(&self) -> &StreamConstraints {
        &self.constraints
    }

    /// True until the handle is released
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Sample the current frame; `None` once released
    pub fn grab_frame(&mut self) -> Option<Frame> {
        self.stream.as_mut()?.grab_frame()
    }

    /// Release the device.
    ///
    /// Returns `true` if this call stopped the stream, `false` if it was
    /// already released.
    pub fn release(&mut self) -> bool {
        match self.stream.take() {
            Some(mut stream) => {
                stream.stop();
                debug!(handle = %self.id, "Camera released");
                true
            }
            None => false,
        }
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CameraHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("constraints", &self.constraints)
            .finish()
    }
}
