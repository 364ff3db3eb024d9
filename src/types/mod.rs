//! Core vocabulary types for streams, modes, and session lifecycle.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

mod frame;

pub use frame::{FrameSnapshot, RawFrame};

/// The two independent frame feeds a device produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// 16-bit depth samples in millimeters.
    Depth,
    /// 24-bit packed RGB samples.
    Color,
}

impl StreamKind {
    /// The other stream, used when pairing depth with color.
    pub fn counterpart(self) -> Self {
        match self {
            StreamKind::Depth => StreamKind::Color,
            StreamKind::Color => StreamKind::Depth,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Depth => f.write_str("depth"),
            StreamKind::Color => f.write_str("color"),
        }
    }
}

/// Sample layout of one frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Little-endian `u16` per pixel, millimeters.
    Depth16,
    /// Packed `[r, g, b]` per pixel.
    Rgb24,
}

impl PixelFormat {
    /// Bytes occupied by one pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Depth16 => 2,
            PixelFormat::Rgb24 => 3,
        }
    }

    /// The format a stream kind carries.
    pub fn for_stream(kind: StreamKind) -> Self {
        match kind {
            StreamKind::Depth => PixelFormat::Depth16,
            StreamKind::Color => PixelFormat::Rgb24,
        }
    }
}

/// A negotiated stream mode: geometry, sample layout, and nominal rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMode {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Nominal frames per second the source delivers.
    pub frame_rate: f64,
}

impl VideoMode {
    /// Payload size in bytes for one full frame in this mode.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Nominal interval between frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate)
    }
}

/// Stream modes negotiated when a device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceCaps {
    pub depth: VideoMode,
    pub color: VideoMode,
}

impl DeviceCaps {
    /// The mode negotiated for `kind`.
    pub fn mode(&self, kind: StreamKind) -> VideoMode {
        match kind {
            StreamKind::Depth => self.depth,
            StreamKind::Color => self.color,
        }
    }
}

/// LED states a device can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedState {
    Off,
    Green,
    Red,
    Yellow,
    BlinkGreen,
    BlinkRedYellow,
}

/// Capture session lifecycle.
///
/// `Stopped -> Capturing` is re-entrant; `ShutDown` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Constructed, device untouched.
    Uninitialized,
    /// Device open, modes negotiated, slots allocated.
    Initialized,
    /// Worker thread pumping frames.
    Capturing,
    /// Worker joined (or self-stopped on a fault); device still open.
    Stopped,
    /// Device released. Terminal.
    ShutDown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "Uninitialized",
            SessionState::Initialized => "Initialized",
            SessionState::Capturing => "Capturing",
            SessionState::Stopped => "Stopped",
            SessionState::ShutDown => "ShutDown",
        };
        f.write_str(name)
    }
}

/// Delivery rate for frame stream subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FrameRate {
    /// Full speed from the source (typically 30Hz).
    Native,
    /// Capped to at most this many frames per second.
    /// Caps at or above the source rate fall back to `Native`.
    AtMost(u32),
}

impl FrameRate {
    /// Normalize against the source frequency.
    pub fn normalize(self, source_hz: f64) -> Self {
        match self {
            FrameRate::Native => FrameRate::Native,
            FrameRate::AtMost(hz) if hz as f64 >= source_hz => FrameRate::Native,
            FrameRate::AtMost(hz) => FrameRate::AtMost(hz),
        }
    }

    /// Throttle interval for the normalized rate, if capping applies.
    pub fn throttle_interval(self, source_hz: f64) -> Option<Duration> {
        match self.normalize(source_hz) {
            FrameRate::Native => None,
            FrameRate::AtMost(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

/// Tilt motor range accepted by [`set_tilt_degrees`](crate::CaptureSession::set_tilt_degrees).
pub const TILT_RANGE_DEGREES: f64 = 30.0;

/// Session-level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// How close (in driver timestamp ticks) depth and color timestamps must
    /// be for the synchronized sink to fire. `0` disables pairing. Provided
    /// drivers stamp frames in milliseconds, so the default of 33 is one
    /// frame interval at 30fps.
    pub pairing_window: u32,

    /// Upper bound on one driver poll; also the worker's stop latency bound.
    pub poll_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { pairing_window: 33, poll_interval: Duration::from_millis(50) }
    }
}
