//! Modern, type-safe Rust library for depth camera capture.
//!
//! Aperture pumps depth and color frames from an RGB-D camera into
//! latest-frame buffers and hands them to whichever consumer model fits the
//! application: polling snapshots, registered sinks, or async streams.
//!
//! # Features
//!
//! - **Latest-frame relay**: single-slot buffers per stream, no backlog, no
//!   torn frames
//! - **Three consumer models**: `fetch` polling, synchronous sinks, async
//!   `Stream` subscriptions
//! - **Driver-agnostic**: camera sources implement one small trait; a
//!   synthetic source ships for development without hardware
//! - **Bounded shutdown**: stopping capture joins the worker within one poll
//!   interval
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use aperture::{Aperture, FrameRate, StreamKind};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> aperture::Result<()> {
//!     let session = Aperture::synthetic()?;
//!     session.start_capture()?;
//!
//!     let mut frames = session.frames(StreamKind::Depth, FrameRate::AtMost(10))?;
//!     while let Some(frame) = frames.next().await {
//!         println!("depth frame {} ({}x{})", frame.generation, frame.width, frame.height);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Polling consumers skip the async runtime entirely:
//!
//! ```rust,no_run
//! use aperture::{Aperture, StreamKind};
//!
//! fn main() -> aperture::Result<()> {
//!     let session = Aperture::synthetic()?;
//!     session.start_capture()?;
//!
//!     let mut seen = 0u64;
//!     while seen < 100 {
//!         // One atomic read; copy only when something new arrived.
//!         if session.peek_generation(StreamKind::Depth) > seen {
//!             let frame = session.fetch(StreamKind::Depth)?;
//!             seen = frame.generation;
//!         }
//!     }
//!     session.shutdown()
//! }
//! ```

// Core types and error handling
mod error;
mod sync;
pub mod types;

// Frame relay and delivery
pub mod relay;
pub mod stream;

// Capture sessions and camera sources
pub mod driver;
pub mod drivers;
pub mod session;

#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

// Core exports
pub use error::{CaptureError, Result, SinkError};
pub use types::*;

// Relay exports
pub use relay::{FrameRelay, FrameSlot};

// Session and driver exports
pub use driver::CameraDriver;
pub use drivers::{SyntheticCamera, SyntheticConfig};
pub use session::CaptureSession;
pub use stream::ThrottleExt;

/// Unified entry point for capture sessions.
///
/// # Examples
///
/// ## Synthetic source (no hardware)
/// ```rust,no_run
/// use aperture::Aperture;
///
/// fn main() -> aperture::Result<()> {
///     let session = Aperture::synthetic()?;
///     // Use session...
///     Ok(())
/// }
/// ```
///
/// ## Custom driver
/// ```rust,no_run
/// use aperture::{Aperture, CaptureConfig, SyntheticCamera, SyntheticConfig};
///
/// fn main() -> aperture::Result<()> {
///     let driver = SyntheticCamera::new(SyntheticConfig::default());
///     let session = Aperture::open(driver, CaptureConfig::default())?;
///     Ok(())
/// }
/// ```
pub struct Aperture;

impl Aperture {
    /// Open a session over `driver`: wraps it and runs
    /// [`initialize`](CaptureSession::initialize), so the returned session
    /// has negotiated modes and is ready for
    /// [`start_capture`](CaptureSession::start_capture).
    ///
    /// # Errors
    ///
    /// Whatever the driver's negotiation reports, typically
    /// [`CaptureError::DeviceNotFound`] or [`CaptureError::UnsupportedFormat`].
    pub fn open(driver: impl CameraDriver, config: CaptureConfig) -> Result<CaptureSession> {
        let session = CaptureSession::new(driver, config);
        session.initialize()?;
        Ok(session)
    }

    /// Open a session over the bundled [`SyntheticCamera`] with default
    /// configuration. Useful for development and examples without hardware.
    pub fn synthetic() -> Result<CaptureSession> {
        Self::open(SyntheticCamera::default(), CaptureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_factory_yields_an_initialized_session() {
        let session = Aperture::synthetic().expect("synthetic session");
        assert_eq!(session.state(), SessionState::Initialized);
        let mode = session.video_mode(StreamKind::Depth).expect("mode");
        assert_eq!(mode.format, PixelFormat::Depth16);
    }
}
