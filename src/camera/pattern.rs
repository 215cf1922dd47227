use super::{CapturedFrame, FrameSource};
use crate::common::Result;
use image::{DynamicImage, ImageBuffer, Rgb};
use std::time::{Duration, Instant};

/// Synthetic source for dev mode and tests: a diagonal gradient that
/// scrolls by a few pixels per frame, delivered at a fixed rate.
pub struct TestPattern {
    width: u32,
    height: u32,
    frame_period: Duration,
    frame_index: u32,
    last_frame: Option<Instant>,
}

impl TestPattern {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            frame_period: Duration::from_secs(1) / fps.max(1),
            frame_index: 0,
            last_frame: None,
        }
    }

    fn render(&self) -> DynamicImage {
        let offset = self.frame_index.wrapping_mul(4);
        let img = ImageBuffer::from_fn(self.width, self.height, |x, y| {
            let v = (x + y).wrapping_add(offset) % 256;
            Rgb([v as u8, (255 - v) as u8, ((x ^ y) % 256) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }
}

impl FrameSource for TestPattern {
    fn next_frame(&mut self) -> Result<CapturedFrame> {
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            if elapsed < self.frame_period {
                std::thread::sleep(self.frame_period - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());

        let frame = CapturedFrame::new(self.render());
        self.frame_index = self.frame_index.wrapping_add(1);
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_change_and_keep_dimensions() {
        let mut pattern = TestPattern::new(40, 30, 120);
        let a = pattern.next_frame().unwrap();
        let b = pattern.next_frame().unwrap();

        assert_eq!((a.image.width(), a.image.height()), (40, 30));
        assert!(a.identities.is_empty());
        assert_ne!(a.image.to_rgb8().into_raw(), b.image.to_rgb8().into_raw());
    }

    #[test]
    fn delivery_is_paced() {
        let mut pattern = TestPattern::new(8, 8, 50);
        let start = Instant::now();
        for _ in 0..6 {
            pattern.next_frame().unwrap();
        }
        // first frame is immediate, the other five wait ~20 ms each
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
