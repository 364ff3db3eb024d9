//! Synthetic camera source for development and testing.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::driver::CameraDriver;
use crate::error::{CaptureError, Result};
use crate::types::{DeviceCaps, LedState, PixelFormat, RawFrame, StreamKind, VideoMode};

/// Configuration for a [`SyntheticCamera`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub depth_mode: VideoMode,
    pub color_mode: VideoMode,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            depth_mode: VideoMode {
                width: 640,
                height: 480,
                format: PixelFormat::Depth16,
                frame_rate: 30.0,
            },
            color_mode: VideoMode {
                width: 640,
                height: 480,
                format: PixelFormat::Rgb24,
                frame_rate: 30.0,
            },
        }
    }
}

/// A hardware-free camera producing paced test patterns.
///
/// Each tick emits a depth frame and a color frame carrying the same
/// timestamp (logical milliseconds since open), so pairing behaves like a
/// camera whose streams are in lockstep. The depth image is a scrolling
/// horizontal ramp, the color image a gradient that shifts per frame.
pub struct SyntheticCamera {
    config: SyntheticConfig,
    opened: bool,
    tick_index: u64,
    next_due: Option<Instant>,
    pending_color: Option<RawFrame>,
    led: LedState,
    tilt_degrees: f64,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            opened: false,
            tick_index: 0,
            next_due: None,
            pending_color: None,
            led: LedState::Off,
            tilt_degrees: 0.0,
        }
    }

    /// The LED state last requested through [`CameraDriver::set_led`].
    pub fn led(&self) -> LedState {
        self.led
    }

    /// The tilt last requested through [`CameraDriver::set_tilt_degrees`].
    pub fn tilt_degrees(&self) -> f64 {
        self.tilt_degrees
    }

    fn interval(&self) -> Duration {
        self.config.depth_mode.frame_interval()
    }

    fn timestamp_for(&self, tick: u64) -> u32 {
        (tick as f64 * 1000.0 / self.config.depth_mode.frame_rate) as u32
    }

    fn depth_frame(&self, tick: u64, timestamp: u32) -> RawFrame {
        let mode = self.config.depth_mode;
        let mut data = Vec::with_capacity(mode.frame_len());
        for y in 0..mode.height {
            for x in 0..mode.width {
                // Scrolling ramp in millimeters, bounded to a plausible range.
                let ramp = (u64::from(x) + u64::from(y) / 4 + tick * 8) % 4000;
                let millimeters = 500 + ramp as u16;
                data.extend_from_slice(&millimeters.to_le_bytes());
            }
        }
        RawFrame {
            stream: StreamKind::Depth,
            data,
            width: mode.width,
            height: mode.height,
            timestamp,
        }
    }

    fn color_frame(&self, tick: u64, timestamp: u32) -> RawFrame {
        let mode = self.config.color_mode;
        let mut data = Vec::with_capacity(mode.frame_len());
        let phase = (tick % 256) as u8;
        for y in 0..mode.height {
            for x in 0..mode.width {
                let r = ((x * 255) / mode.width.max(1)) as u8;
                let g = ((y * 255) / mode.height.max(1)) as u8;
                data.extend_from_slice(&[r.wrapping_add(phase), g, phase]);
            }
        }
        RawFrame {
            stream: StreamKind::Color,
            data,
            width: mode.width,
            height: mode.height,
            timestamp,
        }
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

impl CameraDriver for SyntheticCamera {
    fn open(&mut self) -> Result<DeviceCaps> {
        if self.config.depth_mode.format != PixelFormat::Depth16 {
            return Err(CaptureError::unsupported_format(
                Some(StreamKind::Depth),
                "synthetic depth stream only serves Depth16",
            ));
        }
        if self.config.color_mode.format != PixelFormat::Rgb24 {
            return Err(CaptureError::unsupported_format(
                Some(StreamKind::Color),
                "synthetic color stream only serves Rgb24",
            ));
        }
        if !(self.config.depth_mode.frame_rate > 0.0) {
            return Err(CaptureError::unsupported_format(
                Some(StreamKind::Depth),
                "frame rate must be positive",
            ));
        }

        self.opened = true;
        self.tick_index = 0;
        self.pending_color = None;
        self.next_due = Some(Instant::now());
        info!(
            depth = ?self.config.depth_mode,
            color = ?self.config.color_mode,
            "synthetic camera opened"
        );
        Ok(DeviceCaps { depth: self.config.depth_mode, color: self.config.color_mode })
    }

    fn poll_frame(&mut self, timeout: Duration) -> Result<Option<RawFrame>> {
        if !self.opened {
            return Err(CaptureError::device_fault("synthetic camera polled before open"));
        }

        // The color half of the previous tick goes out first.
        if let Some(frame) = self.pending_color.take() {
            return Ok(Some(frame));
        }

        let due = self.next_due.unwrap_or_else(Instant::now);
        let now = Instant::now();
        if due > now {
            let wait = due - now;
            if wait > timeout {
                thread::sleep(timeout);
                return Ok(None);
            }
            thread::sleep(wait);
        }

        let tick = self.tick_index;
        self.tick_index += 1;
        self.next_due = Some(due + self.interval());

        let timestamp = self.timestamp_for(tick);
        self.pending_color = Some(self.color_frame(tick, timestamp));
        Ok(Some(self.depth_frame(tick, timestamp)))
    }

    fn set_led(&mut self, state: LedState) -> Result<()> {
        self.led = state;
        debug!(?state, "synthetic LED set");
        Ok(())
    }

    fn set_tilt_degrees(&mut self, degrees: f64) -> Result<()> {
        self.tilt_degrees = degrees;
        debug!(degrees, "synthetic tilt set");
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        debug!("synthetic camera closed");
    }
}
