use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::{FrameError, FRAME_HEIGHT, FRAME_WIDTH, MAX_FRAME_BYTES};

/// A JPEG still that fits in one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame(Bytes);

impl EncodedFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

/// Downsample to 320x240 and compress. `quality` is clamped to 1..=100.
pub fn encode(raw: &DynamicImage, quality: u8) -> Result<EncodedFrame, FrameError> {
    let (w, h) = (raw.width(), raw.height());
    if w == 0 || h == 0 {
        return Err(FrameError::EmptyFrame(w, h));
    }

    let rgb = if (w, h) == (FRAME_WIDTH, FRAME_HEIGHT) {
        raw.to_rgb8()
    } else {
        raw.resize_exact(FRAME_WIDTH, FRAME_HEIGHT, FilterType::Triangle).to_rgb8()
    };

    let mut buf = Vec::with_capacity(16 * 1024);
    let mut enc = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    enc.encode_image(&rgb).map_err(FrameError::Encode)?;

    if buf.len() > MAX_FRAME_BYTES {
        return Err(FrameError::Oversized(buf.len()));
    }
    Ok(EncodedFrame(Bytes::from(buf)))
}

/// Decode one received payload. Anything that is not a JPEG is a `Decode` error.
pub fn decode(payload: &[u8]) -> Result<DynamicImage, FrameError> {
    image::load_from_memory_with_format(payload, ImageFormat::Jpeg).map_err(FrameError::Decode)
}
