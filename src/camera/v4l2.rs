use super::{CapturedFrame, FrameSource};
use crate::common::{WatchpostError, Result};
use crate::common::config::CameraConfig;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, FourCC};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};
use std::fs;

/// Special device index meaning "pick the first capture-capable device".
pub const AUTO_DETECT_INDEX: u32 = 999;

#[derive(Debug, Clone)]
pub struct CameraInfo {
    pub index: u32,
    pub card: String,
    pub formats: Vec<String>,
    pub can_capture: bool,
}

pub struct Camera {
    // keeps the device handle open for the lifetime of the stream
    _device: Device,
    stream: Stream<'static>,
    format: v4l::Format,
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Result<Self> {
        let device_index = if config.device_index == AUTO_DETECT_INDEX {
            Self::detect_camera()?
        } else {
            config.device_index
        };
        Self::new_with_device(device_index, config)
    }

    /// List all /dev/video* devices with their capabilities
    pub fn list_all_cameras() -> Result<Vec<CameraInfo>> {
        let mut cameras = Vec::new();

        for entry in fs::read_dir("/dev")? {
            let entry = entry?;
            let path = entry.path();
            let filename = path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("");

            let index = match filename.strip_prefix("video").and_then(|s| s.parse::<u32>().ok()) {
                Some(index) => index,
                None => continue,
            };

            let device = match Device::new(index as usize) {
                Ok(device) => device,
                Err(e) => {
                    tracing::debug!("Skipping /dev/video{}: {}", index, e);
                    continue;
                }
            };
            let caps = match device.query_caps() {
                Ok(caps) => caps,
                Err(_) => continue,
            };

            let formats = device.enum_formats()
                .unwrap_or_default()
                .iter()
                .map(|fmt| fmt.fourcc.str().unwrap_or("UNKNOWN").to_string())
                .collect();

            cameras.push(CameraInfo {
                index,
                card: caps.card.clone(),
                formats,
                can_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            });
        }

        cameras.sort_by_key(|c| c.index);
        Ok(cameras)
    }

    /// Lowest-numbered device that supports video capture, falling back to 0
    pub fn detect_camera() -> Result<u32> {
        let cameras = Self::list_all_cameras()?;
        match cameras.iter().find(|c| c.can_capture) {
            Some(camera) => {
                tracing::info!("Selected camera: /dev/video{} ({})", camera.index, camera.card);
                Ok(camera.index)
            }
            None => {
                tracing::warn!("No capture device detected, falling back to /dev/video0");
                Ok(0)
            }
        }
    }

    pub fn new_with_device(index: u32, config: &CameraConfig) -> Result<Self> {
        tracing::info!("Opening camera device {}...", index);

        let device = Device::new(index as usize)
            .map_err(|e| WatchpostError::Camera(format!("Failed to open camera {}: {}", index, e)))?;

        let caps = device.query_caps()
            .map_err(|e| WatchpostError::Camera(format!("Failed to query capabilities: {}", e)))?;

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            tracing::warn!("Device {} may not support standard video capture ({:?})",
                index, caps.capabilities);
        }

        let mut fmt = device.format()
            .map_err(|e| WatchpostError::Camera(format!("Failed to get format: {}", e)))?;

        fmt.width = config.width;
        fmt.height = config.height;

        // Keep GREY/YUYV if that is what the device already streams, otherwise ask for MJPG
        let current = fmt.fourcc.repr;
        if current != *b"GREY" && current != *b"YUYV" {
            fmt.fourcc = FourCC::new(b"MJPG");
        }

        if let Err(e) = device.set_format(&fmt) {
            tracing::warn!("Could not set exact format: {}. Using device defaults.", e);
        }

        if let Err(e) = device.set_params(&Parameters::with_fps(config.fps)) {
            tracing::warn!("Could not set frame rate to {} fps: {}", config.fps, e);
        }

        let format = device.format()
            .map_err(|e| WatchpostError::Camera(format!("Failed to get final format: {}", e)))?;

        tracing::info!("Actual format: {}x{} {}", format.width, format.height,
            format.fourcc.str().unwrap_or("????"));

        if format.width != config.width || format.height != config.height {
            tracing::warn!("Camera resolution {}x{} differs from requested {}x{}",
                format.width, format.height, config.width, config.height);
        }

        let stream = Stream::with_buffers(&device, Type::VideoCapture, 4)
            .map_err(|e| WatchpostError::Camera(format!("Failed to create stream: {}", e)))?;

        Ok(Self { _device: device, stream, format })
    }
}

impl FrameSource for Camera {
    fn next_frame(&mut self) -> Result<CapturedFrame> {
        let (buf, meta) = self.stream.next()
            .map_err(|e| WatchpostError::Camera(format!("Failed to capture: {}", e)))?;

        let used = (meta.bytesused as usize).min(buf.len());
        let data = if used > 0 { &buf[..used] } else { buf };

        let image = decode_buffer(&self.format.fourcc.repr, data, self.format.width, self.format.height)?;
        Ok(CapturedFrame::new(image))
    }
}

fn decode_buffer(fourcc: &[u8; 4], data: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    match fourcc {
        b"MJPG" => Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?),
        b"GREY" => grey_to_image(data, width, height),
        b"YUYV" => yuyv_to_image(data, width, height),
        other => Err(WatchpostError::Camera(format!(
            "Unsupported pixel format {}", String::from_utf8_lossy(other)
        ))),
    }
}

fn grey_to_image(data: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    let len = (width * height) as usize;
    let pixels = data.get(..len)
        .ok_or_else(|| WatchpostError::Camera("Short grayscale buffer".into()))?;
    let img_buffer = ImageBuffer::<Luma<u8>, _>::from_raw(width, height, pixels.to_vec())
        .ok_or_else(|| WatchpostError::Camera("Failed to create grayscale image buffer".into()))?;

    Ok(DynamicImage::ImageLuma8(img_buffer))
}

fn yuyv_to_image(data: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    let pixel_count = (width * height) as usize;
    if data.len() < pixel_count * 2 {
        return Err(WatchpostError::Camera("Short YUYV buffer".into()));
    }

    let mut rgb = Vec::with_capacity(pixel_count * 3);
    for chunk in data[..pixel_count * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }

    let img_buffer = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, rgb)
        .ok_or_else(|| WatchpostError::Camera("Failed to create RGB image buffer".into()))?;
    Ok(DynamicImage::ImageRgb8(img_buffer))
}

// BT.601, integer approximation
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| x.clamp(0, 255) as u8;
    [
        clamp((298 * c + 409 * e + 128) >> 8),
        clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp((298 * c + 516 * d + 128) >> 8),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grey_buffer_decodes() {
        let data: Vec<u8> = (0..12).collect();
        let img = decode_buffer(b"GREY", &data, 4, 3).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
        assert_eq!(img.to_luma8().get_pixel(3, 2)[0], 11);
    }

    #[test]
    fn yuyv_black_and_white() {
        // two pixels black (Y=16), two pixels white (Y=235), neutral chroma
        let data = [16, 128, 16, 128, 235, 128, 235, 128];
        let img = decode_buffer(b"YUYV", &data, 4, 1).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(3, 0).0, [255, 255, 255]);
    }

    #[test]
    fn short_buffers_and_unknown_formats_fail() {
        assert!(decode_buffer(b"GREY", &[0; 3], 4, 3).is_err());
        assert!(decode_buffer(b"YUYV", &[0; 4], 4, 1).is_err());
        assert!(matches!(
            decode_buffer(b"H264", &[0; 16], 2, 2),
            Err(WatchpostError::Camera(_))
        ));
    }
}
