//! Frame sources feeding the capture loop.
//!
//! Face detection and recognition live outside this crate; a source only
//! hands over the image together with whatever identities were recognized
//! in it.

pub mod pattern;
pub mod v4l2;

pub use pattern::TestPattern;
pub use v4l2::Camera;

use crate::common::{WatchpostError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};

/// One captured image plus the names recognized in it.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: DynamicImage,
    pub identities: Vec<String>,
}

impl CapturedFrame {
    pub fn new(image: DynamicImage) -> Self {
        Self { image, identities: Vec::new() }
    }

    pub fn with_identities(image: DynamicImage, identities: Vec<String>) -> Self {
        Self { image, identities }
    }
}

pub trait FrameSource: Send {
    /// Blocks until the next frame is available.
    fn next_frame(&mut self) -> Result<CapturedFrame>;
}

impl FrameSource for Box<dyn FrameSource> {
    fn next_frame(&mut self) -> Result<CapturedFrame> {
        (**self).next_frame()
    }
}

pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut buf = Vec::with_capacity((rgb.width() * rgb.height()) as usize / 4);
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(|e| WatchpostError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn encode_jpeg_produces_jpeg_markers() {
        let img = ImageBuffer::from_fn(32, 24, |x, y| Rgb([x as u8 * 8, y as u8 * 8, 128]));
        let jpeg = encode_jpeg(&DynamicImage::ImageRgb8(img), 70).unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn lower_quality_is_smaller() {
        let img = ImageBuffer::from_fn(64, 64, |x, y| Rgb([(x * y) as u8, x as u8 * 4, y as u8 * 4]));
        let img = DynamicImage::ImageRgb8(img);
        let high = encode_jpeg(&img, 95).unwrap();
        let low = encode_jpeg(&img, 10).unwrap();
        assert!(low.len() < high.len());
    }
}
