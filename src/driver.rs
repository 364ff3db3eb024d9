//! Driver trait for camera sources.

use std::time::Duration;

use crate::error::Result;
use crate::types::{DeviceCaps, LedState, RawFrame};

/// Trait for camera frame sources.
///
/// Drivers abstract over concrete devices (hardware backends, synthetic
/// sources, scripted test cameras) and own their own timing: `poll_frame`
/// blocks for at most `timeout` and the capture worker sizes that bound so a
/// stop request takes effect within one poll interval.
///
/// A driver is used from two threads, never concurrently: the capture worker
/// polls frames while the controlling thread issues LED/tilt calls, and the
/// session serializes both through one guard.
pub trait CameraDriver: Send + 'static {
    /// Open the device and negotiate stream modes.
    ///
    /// Called once, before any other method. Errors:
    /// - `DeviceNotFound` when no device answers
    /// - `UnsupportedFormat` when the device cannot serve a requested mode
    fn open(&mut self) -> Result<DeviceCaps>;

    /// Wait up to `timeout` for the next frame from either stream.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - a frame arrived
    /// - `Ok(None)` - nothing within the timeout; the caller polls again
    /// - `Err(e)` - device error; fatal ones (`is_session_fatal`) stop the
    ///   session, others are retried with backoff
    fn poll_frame(&mut self, timeout: Duration) -> Result<Option<RawFrame>>;

    /// Set the device LED. Pass-through; drivers without an LED accept and
    /// ignore it.
    fn set_led(&mut self, state: LedState) -> Result<()>;

    /// Tilt the device to `degrees`. The session validates the documented
    /// range before this is called, so drivers only see in-range values.
    fn set_tilt_degrees(&mut self, degrees: f64) -> Result<()>;

    /// Release the device. Called at most once, after which no other method
    /// is invoked.
    fn close(&mut self);
}
