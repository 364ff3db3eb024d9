//! Frame payload types flowing between driver, relay, and consumers.

use std::sync::Arc;

use super::{PixelFormat, StreamKind};

/// A raw frame as delivered by a [`CameraDriver`](crate::driver::CameraDriver).
///
/// The driver owns the timestamp unit; the provided drivers stamp frames in
/// milliseconds since the device was opened.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub stream: StreamKind,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: u32,
}

/// A stable view of one published frame.
///
/// The payload is shared, not borrowed: a snapshot stays valid and unchanged
/// after the capture worker publishes newer frames, so consumers can hold it
/// across the writer's progress. Cloning is cheap (the payload is behind an
/// `Arc`).
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    /// Full frame payload; length is always `width * height * bytes_per_pixel`.
    pub data: Arc<[u8]>,

    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,

    /// Freshness counter for this stream's slot. Starts at 1 for the first
    /// published frame and increments by exactly 1 per publish.
    pub generation: u64,

    /// Driver timestamp of the write that produced this snapshot.
    pub timestamp: u32,
}

impl FrameSnapshot {
    /// Number of pixels in the frame.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Depth samples as `u16` millimeter values.
    ///
    /// Returns `None` when the snapshot is not `Depth16`.
    pub fn depth_millimeters(&self) -> Option<Vec<u16>> {
        if self.format != PixelFormat::Depth16 {
            return None;
        }
        Some(
            self.data
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        )
    }
}
