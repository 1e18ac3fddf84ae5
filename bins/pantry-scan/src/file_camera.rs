//! Camera platform backed by image files
//!
//! Every image in a directory becomes one frame. A stream replays the frames
//! in file name order and wraps around, so a single still is enough to reach
//! the confirmation threshold.

use anyhow::{Context, Result};
use async_trait::async_trait;
use pantry_scanner::{CameraPlatform, Frame, PlatformError, StreamConstraints, VideoStream};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

pub struct FileCamera {
    frames: Arc<Vec<Frame>>,
    secure: bool,
}

impl FileCamera {
    /// Load every readable image directly inside `dir`
    pub fn from_dir(dir: &Path, secure: bool) -> Result<Self> {
        if !dir.is_dir() {
            anyhow::bail!("not a directory: {}", dir.display());
        }

        let mut frames = Vec::new();
        for entry in WalkDir::new(dir).max_depth(1).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
            if !entry.file_type().is_file() || !is_image(entry.path()) {
                continue;
            }
            match Frame::open(entry.path()) {
                Ok(frame) => {
                    debug!(path = %entry.path().display(), width = frame.width(), height = frame.height(), "Frame loaded");
                    frames.push(frame);
                }
                Err(e) => warn!(path = %entry.path().display(), error = %e, "Skipping unreadable image"),
            }
        }

        Ok(Self {
            frames: Arc::new(frames),
            secure,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[async_trait]
impl CameraPlatform for FileCamera {
    fn is_secure_context(&self) -> bool {
        self.secure
    }

    /// A directory without images is a device that cannot capture
    fn supports_capture(&self) -> bool {
        !self.frames.is_empty()
    }

    async fn open_stream(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>, PlatformError> {
        debug!(facing_mode = %constraints.facing_mode, frames = self.frames.len(), "Opening file stream");
        Ok(Box::new(FileStream {
            frames: Arc::clone(&self.frames),
            next: 0,
            stopped: false,
        }))
    }
}

struct FileStream {
    frames: Arc<Vec<Frame>>,
    next: usize,
    stopped: bool,
}

impl VideoStream for FileStream {
    fn grab_frame(&mut self) -> Option<Frame> {
        if self.stopped || self.frames.is_empty() {
            return None;
        }
        let frame = self.frames[self.next % self.frames.len()].clone();
        self.next = self.next.wrapping_add(1);
        Some(Frame::new(frame.image().clone()))
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
