//! Error types for scanning sessions

use pantry_core::{Error as CoreError, ErrorCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for scanner operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Failures that end a scanning or capture attempt.
///
/// Decode misses, decode errors and provider failures are absorbed inside the
/// session and never show up here.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Origin is not HTTPS or localhost
    #[error("Camera access requires a secure context")]
    InsecureContext,

    /// Platform has no camera capture capability
    #[error("Camera capture is not supported on this platform")]
    Unsupported,

    /// User declined the camera permission prompt
    #[error("Camera permission was denied")]
    PermissionDenied,

    /// Camera is held by another process
    #[error("Camera is in use by another application: {0}")]
    DeviceBusy(String),

    /// Constraints could not be satisfied, even after relaxing them
    #[error("No camera satisfies the requested constraints: {0}")]
    Overconstrained(String),

    /// Any other camera platform failure
    #[error("Camera failure: {0}")]
    Camera(String),

    /// A decoder back end could not be constructed
    #[error("Failed to initialize {source_name} decoder: {reason}")]
    DecoderInit {
        /// Decoder that failed
        source_name: &'static str,
        /// Failure detail
        reason: String,
    },

    /// Photo capture requested without an OCR engine
    #[error("Photo capture is not available: no OCR engine configured")]
    CaptureUnavailable,

    /// The session was stopped while it was starting
    #[error("Session was cancelled before it started")]
    SessionCancelled,

    /// Operation not valid in the current coordinator state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// Requested operation
        operation: &'static str,
        /// State the coordinator was in
        state: &'static str,
    },
}

/// Caller-facing error classification, published on the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`ScanError::InsecureContext`]
    InsecureContext,
    /// See [`ScanError::Unsupported`]
    Unsupported,
    /// See [`ScanError::PermissionDenied`]
    PermissionDenied,
    /// See [`ScanError::DeviceBusy`]
    DeviceBusy,
    /// See [`ScanError::Overconstrained`]
    Overconstrained,
    /// See [`ScanError::Camera`]
    CameraFailure,
    /// See [`ScanError::DecoderInit`]
    DecoderInit,
    /// See [`ScanError::SessionCancelled`]
    Cancelled,
    /// See [`ScanError::InvalidState`]
    InvalidState,
}

impl ErrorKind {
    /// Whether the user can reasonably retry the same action
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::DeviceBusy | Self::Overconstrained | Self::CameraFailure
        )
    }

    /// Remediation hint shown next to the error
    #[must_use]
    pub fn remediation(self) -> Option<&'static str> {
        match self {
            Self::InsecureContext => Some("Serve the app over HTTPS or open it on localhost"),
            Self::Unsupported => Some("Use a device or browser with camera support, or enter the item manually"),
            Self::PermissionDenied => Some("Allow camera access in the site settings and try again"),
            Self::DeviceBusy => Some("Close other applications using the camera and try again"),
            Self::Overconstrained => Some("Try a different camera"),
            Self::CameraFailure | Self::DecoderInit => Some("Restart scanning or enter the item manually"),
            Self::Cancelled | Self::InvalidState => None,
        }
    }
}

impl ScanError {
    /// Classify the error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsecureContext => ErrorKind::InsecureContext,
            Self::Unsupported => ErrorKind::Unsupported,
            Self::PermissionDenied => ErrorKind::PermissionDenied,
            Self::DeviceBusy(_) => ErrorKind::DeviceBusy,
            Self::Overconstrained(_) => ErrorKind::Overconstrained,
            Self::Camera(_) => ErrorKind::CameraFailure,
            Self::DecoderInit { .. } => ErrorKind::DecoderInit,
            Self::CaptureUnavailable => ErrorKind::Unsupported,
            Self::SessionCancelled => ErrorKind::Cancelled,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// Camera acquisition failures, as opposed to session bookkeeping errors
    #[must_use]
    pub fn is_camera_error(&self) -> bool {
        matches!(
            self,
            Self::InsecureContext
                | Self::Unsupported
                | Self::PermissionDenied
                | Self::DeviceBusy(_)
                | Self::Overconstrained(_)
                | Self::Camera(_)
        )
    }
}

impl From<ScanError> for CoreError {
    fn from(err: ScanError) -> Self {
        let code = match &err {
            ScanError::InsecureContext => ErrorCode::InsecureContext,
            ScanError::Unsupported => ErrorCode::CameraUnsupported,
            ScanError::PermissionDenied => ErrorCode::CameraPermissionDenied,
            ScanError::DeviceBusy(_) => ErrorCode::DeviceBusy,
            ScanError::Overconstrained(_) => ErrorCode::Overconstrained,
            ScanError::Camera(_) => ErrorCode::CameraError,
            ScanError::DecoderInit { .. } => ErrorCode::DecoderInit,
            ScanError::CaptureUnavailable => ErrorCode::OcrFailed,
            ScanError::SessionCancelled => ErrorCode::Cancelled,
            ScanError::InvalidState { .. } => ErrorCode::InvalidState,
        };
        let mut core = CoreError::new(code, err.to_string());
        if let Some(hint) = err.kind().remediation() {
            core = core.with_suggestion(hint);
        }
        core.with_source(err)
    }
}

/// Failures inside one photo-capture cycle.
///
/// These are logged and the cycle is dropped; the next cycle starts fresh.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// OCR worker could not start or recognize
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// Extraction model call failed
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Extraction endpoint returned an error status
    #[error("Extraction endpoint error ({status}): {message}")]
    ExtractionResponse {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// HTTP transport failure
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl From<CaptureError> for CoreError {
    fn from(err: CaptureError) -> Self {
        let code = match &err {
            CaptureError::Ocr(_) => ErrorCode::OcrFailed,
            CaptureError::Extraction(_) | CaptureError::ExtractionResponse { .. } | CaptureError::Request(_) => {
                ErrorCode::ModelFailed
            }
        };
        CoreError::new(code, err.to_string()).with_source(err)
    }
}
