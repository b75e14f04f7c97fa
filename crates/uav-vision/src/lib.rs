pub mod camera;
pub mod codec;

use thiserror::Error;

/// Every frame is downsampled to this size before it is compressed.
pub const FRAME_WIDTH: u32 = 320;
pub const FRAME_HEIGHT: u32 = 240;

pub const DEFAULT_JPEG_QUALITY: u8 = 50;

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_FRAME_BYTES: usize = 65_507;

/// Receive buffer for one video datagram.
pub const VIDEO_MAX_DATAGRAM: usize = 65_536;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("source frame is empty ({0}x{1})")]
    EmptyFrame(u32, u32),
    #[error("jpeg encode failed: {0}")]
    Encode(#[source] image::ImageError),
    #[error("jpeg decode failed: {0}")]
    Decode(#[source] image::ImageError),
    #[error("encoded frame is {0} bytes, does not fit one datagram")]
    Oversized(usize),
}

pub use codec::{decode, encode, EncodedFrame};
