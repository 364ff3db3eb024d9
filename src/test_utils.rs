//! Test utilities: scripted drivers, frame builders, tracing setup.
//!
//! Shared by unit tests, integration-style session tests, and the criterion
//! benches (which compile with the `benchmark` feature).

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::driver::CameraDriver;
use crate::error::{CaptureError, Result};
use crate::sync::lock_unpoisoned;
use crate::types::{DeviceCaps, LedState, PixelFormat, RawFrame, StreamKind, VideoMode};

/// Initialize tracing for a test binary. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// 320x240 capabilities used across the session tests.
pub fn qvga_caps() -> DeviceCaps {
    DeviceCaps {
        depth: VideoMode {
            width: 320,
            height: 240,
            format: PixelFormat::Depth16,
            frame_rate: 30.0,
        },
        color: VideoMode {
            width: 320,
            height: 240,
            format: PixelFormat::Rgb24,
            frame_rate: 30.0,
        },
    }
}

/// A depth frame filled with one little-endian millimeter value.
pub fn depth_frame(mode: VideoMode, millimeters: u16, timestamp: u32) -> RawFrame {
    let mut data = Vec::with_capacity(mode.frame_len());
    for _ in 0..(mode.width * mode.height) {
        data.extend_from_slice(&millimeters.to_le_bytes());
    }
    RawFrame {
        stream: StreamKind::Depth,
        data,
        width: mode.width,
        height: mode.height,
        timestamp,
    }
}

/// A color frame filled with one RGB triple.
pub fn color_frame(mode: VideoMode, rgb: [u8; 3], timestamp: u32) -> RawFrame {
    let mut data = Vec::with_capacity(mode.frame_len());
    for _ in 0..(mode.width * mode.height) {
        data.extend_from_slice(&rgb);
    }
    RawFrame {
        stream: StreamKind::Color,
        data,
        width: mode.width,
        height: mode.height,
        timestamp,
    }
}

/// One step of a [`ScriptedCamera`] run, consumed per `poll_frame` call.
pub enum ScriptStep {
    /// Deliver this frame.
    Frame(RawFrame),
    /// Report nothing available for one poll.
    Quiet,
    /// Fail one poll with a retryable error.
    TransientError(&'static str),
    /// Fail fatally; the worker records this and stops the session.
    Disconnect(&'static str),
}

/// What a scripted device observed from the controlling thread.
#[derive(Default)]
pub struct ControlLog {
    pub leds: Vec<LedState>,
    pub tilts: Vec<f64>,
    pub closed: bool,
}

/// Handle onto a [`ScriptedCamera`]'s control log, usable after the driver
/// moved into a session.
#[derive(Clone)]
pub struct ScriptedHandle {
    log: Arc<Mutex<ControlLog>>,
}

impl ScriptedHandle {
    pub fn leds(&self) -> Vec<LedState> {
        lock_unpoisoned(&self.log).leds.clone()
    }

    pub fn tilts(&self) -> Vec<f64> {
        lock_unpoisoned(&self.log).tilts.clone()
    }

    pub fn closed(&self) -> bool {
        lock_unpoisoned(&self.log).closed
    }
}

/// A driver that replays a programmed script, then stays quiet.
pub struct ScriptedCamera {
    caps: DeviceCaps,
    open_error: Option<CaptureError>,
    steps: VecDeque<ScriptStep>,
    log: Arc<Mutex<ControlLog>>,
}

impl ScriptedCamera {
    pub fn new(caps: DeviceCaps) -> Self {
        Self {
            caps,
            open_error: None,
            steps: VecDeque::new(),
            log: Arc::new(Mutex::new(ControlLog::default())),
        }
    }

    /// Make `open` fail with `error` instead of negotiating.
    pub fn failing_open(caps: DeviceCaps, error: CaptureError) -> Self {
        let mut camera = Self::new(caps);
        camera.open_error = Some(error);
        camera
    }

    pub fn push(mut self, step: ScriptStep) -> Self {
        self.steps.push_back(step);
        self
    }

    pub fn push_frames(mut self, frames: impl IntoIterator<Item = RawFrame>) -> Self {
        self.steps.extend(frames.into_iter().map(ScriptStep::Frame));
        self
    }

    pub fn handle(&self) -> ScriptedHandle {
        ScriptedHandle { log: Arc::clone(&self.log) }
    }
}

impl CameraDriver for ScriptedCamera {
    fn open(&mut self) -> Result<DeviceCaps> {
        match self.open_error.take() {
            Some(error) => Err(error),
            None => Ok(self.caps),
        }
    }

    fn poll_frame(&mut self, timeout: Duration) -> Result<Option<RawFrame>> {
        match self.steps.pop_front() {
            Some(ScriptStep::Frame(frame)) => Ok(Some(frame)),
            Some(ScriptStep::Quiet) | None => {
                // Exhausted scripts behave like a camera with nothing to say.
                thread::sleep(timeout.min(Duration::from_millis(1)));
                Ok(None)
            }
            Some(ScriptStep::TransientError(message)) => {
                Err(CaptureError::unsupported_format(None, message))
            }
            Some(ScriptStep::Disconnect(message)) => Err(CaptureError::device_fault(message)),
        }
    }

    fn set_led(&mut self, state: LedState) -> Result<()> {
        lock_unpoisoned(&self.log).leds.push(state);
        Ok(())
    }

    fn set_tilt_degrees(&mut self, degrees: f64) -> Result<()> {
        lock_unpoisoned(&self.log).tilts.push(degrees);
        Ok(())
    }

    fn close(&mut self) {
        lock_unpoisoned(&self.log).closed = true;
    }
}
