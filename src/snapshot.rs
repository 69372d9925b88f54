//! Snapshot sources and image encoding.

use crate::{Error, Result};
use image::{
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
    ColorType, ImageEncoder, RgbImage,
};
use std::fmt;

/// Encoding for captured snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Png,
    Jpeg { quality: u8 },
}

impl SnapshotFormat {
    /// MIME type of the encoded bytes
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg { .. } => "image/jpeg",
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg { quality } => write!(f, "jpeg (quality {quality})"),
        }
    }
}

/// Encode an RGB image
///
/// # Errors
///
/// Returns `CaptureFailure` for a zero-sized image and `Image` if the
/// encoder fails.
pub fn encode_rgb(image: &RgbImage, format: SnapshotFormat) -> Result<Vec<u8>> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::CaptureFailure(format!("Empty image ({width}x{height})")));
    }

    let mut buf = Vec::new();
    match format {
        SnapshotFormat::Png => {
            PngEncoder::new(&mut buf).write_image(image.as_raw(), width, height, ColorType::Rgb8)?;
        }
        SnapshotFormat::Jpeg { quality } => {
            JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(image)?;
        }
    }

    if buf.is_empty() {
        return Err(Error::CaptureFailure("Encoder produced no data".to_string()));
    }
    Ok(buf)
}

/// Supplier of the most recent camera image
pub trait FrameSource {
    /// Encode the most recent frame
    ///
    /// # Errors
    ///
    /// Returns `CaptureFailure` when no usable frame is available
    fn snapshot(&mut self, format: SnapshotFormat) -> Result<Vec<u8>>;
}

/// Frame source that keeps only the latest image
#[derive(Debug, Default)]
pub struct ImageFrameSource {
    latest: Option<RgbImage>,
}

impl ImageFrameSource {
    /// Source with no frame yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the retained frame
    pub fn push(&mut self, image: RgbImage) {
        self.latest = Some(image);
    }

    /// Forget the retained frame
    pub fn clear(&mut self) {
        self.latest = None;
    }

    /// Most recently pushed frame
    pub fn latest(&self) -> Option<&RgbImage> {
        self.latest.as_ref()
    }
}

impl FrameSource for ImageFrameSource {
    fn snapshot(&mut self, format: SnapshotFormat) -> Result<Vec<u8>> {
        let image = self
            .latest
            .as_ref()
            .ok_or_else(|| Error::CaptureFailure("No frame available".to_string()))?;
        encode_rgb(image, format)
    }
}
