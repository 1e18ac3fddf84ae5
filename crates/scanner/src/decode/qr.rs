//! QR-only decoder backed by `rqrr`

use super::{BarcodeDecoder, DecodeError, DecoderFactory, DecoderSource};
use crate::frame::Frame;
use async_trait::async_trait;
use image::GrayImage;
use tracing::trace;

/// Pure-Rust QR decoder; always available, lowest priority
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl QrDecoder {
    /// Decode the first readable QR code in a greyscale image
    pub fn decode_luma(gray: &GrayImage) -> Result<Option<String>, DecodeError> {
        let (width, height) = (gray.width() as usize, gray.height() as usize);
        if width == 0 || height == 0 {
            return Ok(None);
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            gray.get_pixel(x as u32, y as u32).0[0]
        });
        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return Ok(None);
        }

        let mut last_error = None;
        for grid in &grids {
            match grid.decode() {
                Ok((_meta, content)) => return Ok(Some(content)),
                Err(e) => {
                    trace!(error = ?e, "QR grid failed to decode");
                    last_error = Some(e);
                }
            }
        }

        Err(DecodeError::new(format!(
            "found {} QR grid(s) but none decoded: {:?}",
            grids.len(),
            last_error
        )))
    }
}

#[async_trait]
impl BarcodeDecoder for QrDecoder {
    async fn decode(&self, frame: &Frame) -> Result<Option<String>, DecodeError> {
        let gray = frame.to_luma();
        tokio::task::spawn_blocking(move || Self::decode_luma(&gray))
            .await
            .map_err(|e| DecodeError::new(format!("QR decode task failed: {e}")))?
    }
}

/// Factory for [`QrDecoder`]
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoderFactory;

impl DecoderFactory for QrDecoderFactory {
    fn source(&self) -> DecoderSource {
        DecoderSource::QrOnly
    }

    fn create(&self) -> Result<Option<Box<dyn BarcodeDecoder>>, DecodeError> {
        Ok(Some(Box::new(QrDecoder)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_image_is_a_miss() {
        let gray = GrayImage::from_pixel(64, 64, image::Luma([255]));
        assert_eq!(QrDecoder::decode_luma(&gray).unwrap(), None);
    }

    #[test]
    fn test_empty_image_is_a_miss() {
        let gray = GrayImage::new(0, 0);
        assert_eq!(QrDecoder::decode_luma(&gray).unwrap(), None);
    }

    #[tokio::test]
    async fn test_async_decode_of_blank_frame() {
        let frame = Frame::from_luma(32, 32, vec![255; 32 * 32]).unwrap();
        assert_eq!(QrDecoder.decode(&frame).await.unwrap(), None);
    }

    #[test]
    fn test_factory_is_always_available() {
        let factory = QrDecoderFactory;
        assert_eq!(factory.source(), DecoderSource::QrOnly);
        assert!(factory.create().unwrap().is_some());
    }
}
