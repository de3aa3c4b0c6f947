//! Frame type, video source seam and still-image loading.

use std::path::Path;
use std::time::Instant;

/// A single image handed to the detector: one live video frame or one
/// enrollment photo. Pixels are row-major, `channels` bytes per pixel.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub timestamp: Instant,
    pub sequence: u32,
}

impl Frame {
    /// Wrap raw pixels, checking that the buffer covers `width * height * channels`.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
        sequence: u32,
    ) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * channels as usize;
        if channels == 0 || data.len() < expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            timestamp: Instant::now(),
            sequence,
        })
    }

    /// Uniform mid-grey frame; for sources that only need to report geometry.
    pub fn blank(width: u32, height: u32, sequence: u32) -> Self {
        Self {
            data: vec![128u8; width as usize * height as usize],
            width,
            height,
            channels: 1,
            timestamp: Instant::now(),
            sequence,
        }
    }

    pub fn from_image(image: image::DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            data: rgb.into_raw(),
            width,
            height,
            channels: 3,
            timestamp: Instant::now(),
            sequence: 0,
        }
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Decode a still image (profile photo, enrollment capture) into an RGB frame.
pub fn load_still_image(path: &Path) -> Result<Frame, FrameError> {
    let image = image::open(path).map_err(|source| FrameError::Decode {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Frame::from_image(image))
}

/// Anything that can hand out the most recent camera frame.
///
/// The source is owned by the caller; the detection loop only reads it.
pub trait VideoSource: Send + Sync + 'static {
    /// `None` while no frame is available yet (camera warming up, stream
    /// paused). The loop skips that sample.
    fn current_frame(&self) -> Option<Frame>;
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        source: image::ImageError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(Frame::new(vec![0u8; 12], 2, 2, 3, 0).is_ok());
        let err = Frame::new(vec![0u8; 11], 2, 2, 3, 0).unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength { expected: 12, actual: 11 }));
    }

    #[test]
    fn test_new_rejects_zero_channels() {
        assert!(Frame::new(Vec::new(), 2, 2, 0, 0).is_err());
    }

    #[test]
    fn test_blank_geometry() {
        let f = Frame::blank(64, 48, 7);
        assert_eq!(f.data.len(), 64 * 48);
        assert_eq!(f.pixel_count(), 3072);
        assert_eq!(f.sequence, 7);
    }

    #[test]
    fn test_from_image_is_rgb() {
        let img = image::DynamicImage::new_luma8(5, 4);
        let f = Frame::from_image(img);
        assert_eq!((f.width, f.height, f.channels), (5, 4, 3));
        assert_eq!(f.data.len(), 5 * 4 * 3);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_still_image(Path::new("/nonexistent/photo.jpg")).unwrap_err();
        assert!(matches!(err, FrameError::Decode { .. }));
    }
}
