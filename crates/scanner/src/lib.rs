//! Scan-and-resolve service for kitchen inventory
//!
//! Turns a live camera feed into product records:
//!
//! - **Camera**: secure-context and capability checks, constraint relaxation,
//!   guaranteed release of the stream
//! - **Barcode resolution**: a priority-ordered decoder cascade sampled on a
//!   timer, with multi-frame stabilization before a value is trusted
//! - **Photo capture**: OCR + extraction of name, dates and batch number from
//!   labels that carry no readable code
//! - **Coordination**: one session at a time, idempotent teardown, results
//!   delivered as [`ScanEvent`]s
//!
//! # Example
//!
//! ```rust,no_run
//! use pantry_lookup::LookupChain;
//! use pantry_scanner::prelude::*;
//! use std::sync::Arc;
//!
//! async fn scan(platform: Arc<dyn CameraPlatform>) -> Result<(), Box<dyn std::error::Error>> {
//!     let coordinator = ScanCoordinator::builder(platform)
//!         .lookup(LookupChain::new())
//!         .build();
//!     let mut events = coordinator.subscribe();
//!
//!     coordinator.start_barcode_scan().await?;
//!     if let ScanEvent::Confirmed { scan, product } = events.recv().await? {
//!         println!("{} -> {}", scan.barcode, product.name);
//!     }
//!     coordinator.reset()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod camera;
pub mod capture;
pub mod coordinator;
pub mod decode;
pub mod error;
pub mod frame;

#[cfg(test)]
mod testing;

pub use camera::{CameraHandle, CameraPlatform, CameraSession, FacingMode, PlatformError, StreamConstraints, VideoStream};
pub use capture::{CapturePipeline, CapturedLabelData, OcrEngine, OcrWorker, TextExtractor};
pub use coordinator::{
    ConfirmedScan, ScanCoordinator, ScanCoordinatorBuilder, ScanEvent, ScanState, ScannerSettings, SessionInfo,
    SessionMode,
};
pub use decode::{BarcodeDecoder, DecodeCandidate, DecoderFactory, DecoderSource, Stabilizer};
pub use error::{CaptureError, ErrorKind, ScanError, ScanResult};
pub use frame::Frame;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::camera::{CameraPlatform, StreamConstraints};
    pub use crate::capture::{CapturePipeline, CapturedLabelData};
    pub use crate::coordinator::{ScanCoordinator, ScanEvent, ScanState};
    pub use crate::error::{ScanError, ScanResult};
    pub use crate::frame::Frame;
}
