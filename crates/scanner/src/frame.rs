//! Still frames sampled from a video stream

use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage};
use std::path::Path;

/// One still image sampled from the camera
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap an image sampled now
    #[must_use]
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    /// Build a frame from tightly packed 8-bit greyscale pixels.
    ///
    /// Returns `None` when the buffer length does not match the dimensions.
    #[must_use]
    pub fn from_luma(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        GrayImage::from_raw(width, height, pixels).map(|img| Self::new(DynamicImage::ImageLuma8(img)))
    }

    /// Load a frame from an image file
    pub fn open(path: impl AsRef<Path>) -> image::ImageResult<Self> {
        image::open(path).map(Self::new)
    }

    /// Underlying image
    #[must_use]
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Greyscale copy, the input most decoders want
    #[must_use]
    pub fn to_luma(&self) -> GrayImage {
        self.image.to_luma8()
    }

    /// Frame width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// When the frame was sampled
    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_luma_checks_length() {
        let frame = Frame::from_luma(4, 2, vec![0; 8]).unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 2));
        assert!(Frame::from_luma(4, 2, vec![0; 7]).is_none());
    }

    #[test]
    fn test_to_luma_preserves_pixels() {
        let frame = Frame::from_luma(2, 1, vec![10, 200]).unwrap();
        let luma = frame.to_luma();
        assert_eq!(luma.get_pixel(1, 0).0[0], 200);
    }
}
