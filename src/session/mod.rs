//! Capture session lifecycle and the public capture surface.

use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::driver::CameraDriver;
use crate::error::{CaptureError, Result, SinkError};
use crate::relay::FrameRelay;
use crate::stream::ThrottleExt;
use crate::sync::lock_unpoisoned;
use crate::types::{
    CaptureConfig, DeviceCaps, FrameRate, FrameSnapshot, LedState, SessionState, StreamKind,
    TILT_RANGE_DEGREES, VideoMode,
};

mod worker;


/// State shared between the session and its worker thread.
pub(crate) struct SessionShared {
    /// The device handle. One guard serializes the worker's polling against
    /// the controlling thread's LED/tilt calls.
    pub(crate) driver: Mutex<Box<dyn CameraDriver>>,
    pub(crate) state: Mutex<SessionState>,
    /// Fault recorded by the worker when it stops on its own; handed to the
    /// controlling thread by the next `stop_capture`.
    pub(crate) fault: Mutex<Option<CaptureError>>,
}

struct WorkerHandle {
    thread: thread::JoinHandle<()>,
    cancel: CancellationToken,
}

/// A capture session over one camera device.
///
/// Lifecycle: [`initialize`](Self::initialize) opens the device and
/// negotiates stream modes, [`start_capture`](Self::start_capture) spawns the
/// worker thread that pumps frames into the relay,
/// [`stop_capture`](Self::stop_capture) joins it (no frame is published after
/// it returns), and [`shutdown`](Self::shutdown) releases the device.
/// `Stopped -> Capturing` is re-entrant; `ShutDown` is terminal.
///
/// All methods take `&self`: the session is safe to share behind an `Arc`,
/// with readers fetching snapshots while the worker publishes.
pub struct CaptureSession {
    shared: Arc<SessionShared>,
    config: CaptureConfig,
    caps: OnceLock<DeviceCaps>,
    relay: OnceLock<Arc<FrameRelay>>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl CaptureSession {
    /// Wrap a driver without touching the device.
    pub fn new(driver: impl CameraDriver, config: CaptureConfig) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                driver: Mutex::new(Box::new(driver)),
                state: Mutex::new(SessionState::Uninitialized),
                fault: Mutex::new(None),
            }),
            config,
            caps: OnceLock::new(),
            relay: OnceLock::new(),
            worker: Mutex::new(None),
        }
    }

    /// Open the device, negotiate stream modes, and allocate the frame slots.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::DeviceNotFound`] / [`CaptureError::UnsupportedFormat`]
    ///   from the driver
    /// - [`CaptureError::InvalidState`] unless the session is `Uninitialized`
    pub fn initialize(&self) -> Result<()> {
        let mut state = lock_unpoisoned(&self.shared.state);
        if *state != SessionState::Uninitialized {
            return Err(CaptureError::invalid_state("initialize", *state));
        }

        let caps = {
            let mut driver = lock_unpoisoned(&self.shared.driver);
            driver.open()?
        };

        info!(depth = ?caps.depth, color = ?caps.color, "device opened");
        let relay = Arc::new(FrameRelay::new(caps, self.config.pairing_window));
        // First (and only) initialize: both cells are empty.
        let _ = self.caps.set(caps);
        let _ = self.relay.set(relay);

        *state = SessionState::Initialized;
        Ok(())
    }

    /// Spawn the worker thread and start pumping frames.
    ///
    /// Valid from `Initialized` or `Stopped` (re-entrant restart).
    pub fn start_capture(&self) -> Result<()> {
        // Lock order is worker, then state, matching halt_worker. The state
        // guard is dropped before joining so a worker finishing its own
        // fault hand-off can complete.
        let mut worker = lock_unpoisoned(&self.worker);
        {
            let state = lock_unpoisoned(&self.shared.state);
            match *state {
                SessionState::Initialized | SessionState::Stopped => {}
                other => return Err(CaptureError::invalid_state("start_capture", other)),
            }
        }

        // A worker that stopped itself on a fault may not have been joined.
        if let Some(old) = worker.take() {
            old.cancel.cancel();
            if old.thread.join().is_err() {
                warn!("previous capture worker panicked");
            }
        }

        let relay = Arc::clone(self.relay.get().expect("initialized session has a relay"));
        let cancel = CancellationToken::new();
        let thread = thread::Builder::new()
            .name("aperture-capture".to_string())
            .spawn({
                let shared = Arc::clone(&self.shared);
                let cancel = cancel.clone();
                let poll_interval = self.config.poll_interval;
                move || worker::run(shared, relay, cancel, poll_interval)
            })?;

        *worker = Some(WorkerHandle { thread, cancel });
        *lock_unpoisoned(&self.shared.state) = SessionState::Capturing;
        debug!("capture started");
        Ok(())
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// After this returns no further frame is published: joining the worker
    /// is the synchronization point. Blocks for at most roughly one poll
    /// interval. Idempotent when nothing is running.
    ///
    /// # Errors
    ///
    /// Surfaces a fault the worker recorded while running (device
    /// disconnected, repeated driver errors). The fault is reported once.
    pub fn stop_capture(&self) -> Result<()> {
        self.halt_worker();
        match lock_unpoisoned(&self.shared.fault).take() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Release the device. Forces a stop if capture is running. Terminal and
    /// idempotent: the second call is a no-op.
    pub fn shutdown(&self) -> Result<()> {
        {
            let state = lock_unpoisoned(&self.shared.state);
            if *state == SessionState::ShutDown {
                debug!("shutdown called twice; ignoring");
                return Ok(());
            }
        }

        self.halt_worker();
        if let Some(fault) = lock_unpoisoned(&self.shared.fault).take() {
            warn!("shutting down after fault: {fault}");
        }

        // The driver was only opened if negotiation ran.
        if self.caps.get().is_some() {
            let mut driver = lock_unpoisoned(&self.shared.driver);
            driver.close();
        }
        *lock_unpoisoned(&self.shared.state) = SessionState::ShutDown;
        info!("session shut down");
        Ok(())
    }

    /// Cancel and join the worker if one is running.
    fn halt_worker(&self) {
        let mut worker = lock_unpoisoned(&self.worker);
        if let Some(handle) = worker.take() {
            handle.cancel.cancel();
            if handle.thread.join().is_err() {
                warn!("capture worker panicked");
            }
        }
        let mut state = lock_unpoisoned(&self.shared.state);
        if *state == SessionState::Capturing {
            *state = SessionState::Stopped;
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *lock_unpoisoned(&self.shared.state)
    }

    /// Take the fault recorded by the worker, if any, without stopping.
    pub fn take_fault(&self) -> Option<CaptureError> {
        lock_unpoisoned(&self.shared.fault).take()
    }

    fn relay_ref(&self, operation: &'static str) -> Result<&Arc<FrameRelay>> {
        self.relay
            .get()
            .ok_or_else(|| CaptureError::invalid_state(operation, self.state()))
    }

    /// A stable snapshot of the most recent `kind` frame.
    ///
    /// # Errors
    ///
    /// [`CaptureError::NotYetAvailable`] until the first frame of that stream
    /// has been published (including before `initialize`).
    pub fn fetch(&self, kind: StreamKind) -> Result<FrameSnapshot> {
        match self.relay.get() {
            Some(relay) => relay.fetch(kind),
            None => Err(CaptureError::not_yet_available(kind)),
        }
    }

    /// Generation of the most recent `kind` frame; `0` before the first one.
    /// A single atomic read, suitable for change polling without copying.
    pub fn peek_generation(&self, kind: StreamKind) -> u64 {
        self.relay.get().map_or(0, |relay| relay.peek_generation(kind))
    }

    /// The mode negotiated for `kind`.
    ///
    /// # Errors
    ///
    /// [`CaptureError::InvalidState`] before `initialize`.
    pub fn video_mode(&self, kind: StreamKind) -> Result<VideoMode> {
        self.caps
            .get()
            .map(|caps| caps.mode(kind))
            .ok_or_else(|| CaptureError::invalid_state("video_mode", self.state()))
    }

    /// Install the sink for one stream; replaces any existing one.
    pub fn register_sink<F>(&self, kind: StreamKind, sink: F) -> Result<()>
    where
        F: Fn(&FrameSnapshot) -> Result<(), SinkError> + Send + Sync + 'static,
    {
        self.relay_ref("register_sink")?.register_sink(kind, sink);
        Ok(())
    }

    /// Install the synchronized depth+color sink; replaces any existing one.
    pub fn register_synchronized_sink<F>(&self, sink: F) -> Result<()>
    where
        F: Fn(&FrameSnapshot, &FrameSnapshot) -> Result<(), SinkError> + Send + Sync + 'static,
    {
        self.relay_ref("register_synchronized_sink")?.register_synchronized_sink(sink);
        Ok(())
    }

    /// Remove the sink for one stream.
    pub fn clear_sink(&self, kind: StreamKind) -> Result<()> {
        self.relay_ref("clear_sink")?.clear_sink(kind);
        Ok(())
    }

    /// Remove the synchronized sink.
    pub fn clear_synchronized_sink(&self) -> Result<()> {
        self.relay_ref("clear_synchronized_sink")?.clear_synchronized_sink();
        Ok(())
    }

    /// Subscribe to `kind` frames as an async stream.
    ///
    /// The stream yields every published snapshot at `FrameRate::Native`, or
    /// latest-wins capped delivery with `FrameRate::AtMost`. It ends when the
    /// session is dropped. Rate-capped subscriptions create a tokio timer, so
    /// they must be made from within a runtime.
    pub fn frames(
        &self,
        kind: StreamKind,
        rate: FrameRate,
    ) -> Result<BoxStream<'static, FrameSnapshot>> {
        let relay = self.relay_ref("frames")?;
        let source_hz = relay.mode(kind).frame_rate;

        let snapshots =
            WatchStream::new(relay.watch(kind)).filter_map(|opt| async move { opt });

        let stream = match rate.throttle_interval(source_hz) {
            None => snapshots.boxed(),
            Some(interval) => snapshots.throttle_latest(interval).boxed(),
        };
        Ok(stream)
    }

    /// Set the device LED.
    pub fn set_led(&self, led: LedState) -> Result<()> {
        self.ensure_device_usable("set_led")?;
        let mut driver = lock_unpoisoned(&self.shared.driver);
        driver.set_led(led)
    }

    /// Tilt the device.
    ///
    /// # Errors
    ///
    /// [`CaptureError::InvalidParameter`] when `degrees` is outside
    /// ±[`TILT_RANGE_DEGREES`]; the driver is not touched in that case.
    pub fn set_tilt_degrees(&self, degrees: f64) -> Result<()> {
        if !degrees.is_finite() || degrees.abs() > TILT_RANGE_DEGREES {
            return Err(CaptureError::invalid_parameter(
                "set_tilt_degrees",
                format!("{degrees} is outside [-{TILT_RANGE_DEGREES}, {TILT_RANGE_DEGREES}]"),
            ));
        }
        self.ensure_device_usable("set_tilt_degrees")?;
        let mut driver = lock_unpoisoned(&self.shared.driver);
        driver.set_tilt_degrees(degrees)
    }

    fn ensure_device_usable(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            SessionState::Uninitialized | SessionState::ShutDown => {
                Err(CaptureError::invalid_state(operation, self.state()))
            }
            _ => Ok(()),
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        debug!("dropping capture session");
        // Stop the worker and release the device on drop.
        if let Err(err) = self.shutdown() {
            warn!("shutdown during drop failed: {err}");
        }
    }
}
