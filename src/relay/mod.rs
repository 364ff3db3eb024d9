//! The frame relay: latest-frame slots, sink dispatch, and pairing.
//!
//! A [`FrameRelay`] decouples the capture worker (the single producer) from
//! any number of polling readers and at most one registered sink per stream.
//! Each stream has one [`FrameSlot`]; a publish replaces the slot contents,
//! feeds the stream's watch channel for async subscribers, and then invokes
//! the registered sinks on the publishing thread.
//!
//! Sink dispatch happens after the slot guard is released, so a sink may call
//! [`fetch`](FrameRelay::fetch) on any stream without deadlocking. A sink
//! that errors or panics is logged and isolated: it never blocks or corrupts
//! later publishes.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{trace, warn};

use crate::error::{CaptureError, Result, SinkError};
use crate::sync::lock_unpoisoned;
use crate::types::{DeviceCaps, FrameSnapshot, StreamKind, VideoMode};

mod slot;

pub use slot::FrameSlot;

type SinkFn = dyn Fn(&FrameSnapshot) -> Result<(), SinkError> + Send + Sync;
type SynchronizedSinkFn =
    dyn Fn(&FrameSnapshot, &FrameSnapshot) -> Result<(), SinkError> + Send + Sync;

/// Latest-frame relay between one producer and many consumers.
pub struct FrameRelay {
    depth: FrameSlot,
    color: FrameSlot,

    depth_sink: Mutex<Option<Arc<SinkFn>>>,
    color_sink: Mutex<Option<Arc<SinkFn>>>,
    synchronized_sink: Mutex<Option<Arc<SynchronizedSinkFn>>>,

    /// Last (depth, color) generation pair handed to the synchronized sink.
    delivered_pair: Mutex<Option<(u64, u64)>>,
    /// Maximum timestamp distance for pairing; `0` disables it.
    pairing_window: u32,

    depth_watch: watch::Sender<Option<FrameSnapshot>>,
    color_watch: watch::Sender<Option<FrameSnapshot>>,
}

impl FrameRelay {
    /// Allocate slots for the negotiated modes.
    ///
    /// `pairing_window` is the maximum driver-timestamp distance between the
    /// two streams' latest frames for the synchronized sink to fire.
    pub fn new(caps: DeviceCaps, pairing_window: u32) -> Self {
        let (depth_watch, _) = watch::channel(None);
        let (color_watch, _) = watch::channel(None);
        Self {
            depth: FrameSlot::new(StreamKind::Depth, caps.depth),
            color: FrameSlot::new(StreamKind::Color, caps.color),
            depth_sink: Mutex::new(None),
            color_sink: Mutex::new(None),
            synchronized_sink: Mutex::new(None),
            delivered_pair: Mutex::new(None),
            pairing_window,
            depth_watch,
            color_watch,
        }
    }

    fn slot(&self, kind: StreamKind) -> &FrameSlot {
        match kind {
            StreamKind::Depth => &self.depth,
            StreamKind::Color => &self.color,
        }
    }

    fn sink_cell(&self, kind: StreamKind) -> &Mutex<Option<Arc<SinkFn>>> {
        match kind {
            StreamKind::Depth => &self.depth_sink,
            StreamKind::Color => &self.color_sink,
        }
    }

    fn watch_sender(&self, kind: StreamKind) -> &watch::Sender<Option<FrameSnapshot>> {
        match kind {
            StreamKind::Depth => &self.depth_watch,
            StreamKind::Color => &self.color_watch,
        }
    }

    /// The mode the slot for `kind` was allocated with.
    pub fn mode(&self, kind: StreamKind) -> VideoMode {
        self.slot(kind).mode()
    }

    /// Install the sink for one stream, replacing any existing one.
    ///
    /// Replacement takes effect on the next publish; a publish already in
    /// flight keeps the sink it resolved.
    pub fn register_sink<F>(&self, kind: StreamKind, sink: F)
    where
        F: Fn(&FrameSnapshot) -> Result<(), SinkError> + Send + Sync + 'static,
    {
        *lock_unpoisoned(self.sink_cell(kind)) = Some(Arc::new(sink));
    }

    /// Remove the sink for one stream, if any.
    pub fn clear_sink(&self, kind: StreamKind) {
        *lock_unpoisoned(self.sink_cell(kind)) = None;
    }

    /// Install the synchronized depth+color sink, replacing any existing one.
    pub fn register_synchronized_sink<F>(&self, sink: F)
    where
        F: Fn(&FrameSnapshot, &FrameSnapshot) -> Result<(), SinkError> + Send + Sync + 'static,
    {
        *lock_unpoisoned(&self.synchronized_sink) = Some(Arc::new(sink));
    }

    /// Remove the synchronized sink, if any.
    pub fn clear_synchronized_sink(&self) {
        *lock_unpoisoned(&self.synchronized_sink) = None;
    }

    /// Publish one full frame into the stream's slot.
    ///
    /// On success the slot generation increments, async subscribers observe
    /// the new snapshot, and registered sinks run on the calling thread.
    /// Returns the new generation. Fails only on [`CaptureError::ShapeMismatch`];
    /// sink failures are logged and contained.
    pub fn publish(
        &self,
        kind: StreamKind,
        payload: &[u8],
        width: u32,
        height: u32,
        timestamp: u32,
    ) -> Result<u64> {
        let snapshot = self.slot(kind).write(payload, width, height, timestamp)?;
        trace!(stream = %kind, generation = snapshot.generation, timestamp, "frame published");

        self.watch_sender(kind).send_replace(Some(snapshot.clone()));

        let sink = lock_unpoisoned(self.sink_cell(kind)).clone();
        if let Some(sink) = sink {
            self.dispatch(&kind.to_string(), || sink(&snapshot));
        }

        self.deliver_pair_if_close(kind, &snapshot);

        Ok(snapshot.generation)
    }

    /// A stable snapshot of the most recent frame for `kind`.
    pub fn fetch(&self, kind: StreamKind) -> Result<FrameSnapshot> {
        self.slot(kind).snapshot()
    }

    /// Current generation for `kind` without locking; `0` before the first
    /// publish.
    pub fn peek_generation(&self, kind: StreamKind) -> u64 {
        self.slot(kind).peek_generation()
    }

    /// Latest-frame channel for async subscriptions to `kind`.
    pub fn watch(&self, kind: StreamKind) -> watch::Receiver<Option<FrameSnapshot>> {
        self.watch_sender(kind).subscribe()
    }

    /// Fire the synchronized sink when both streams hold frames whose
    /// timestamps lie within the pairing window and the pair is new.
    ///
    /// Pairing is best-effort: there is no cross-stream reconciliation beyond
    /// "most recent available on each side".
    fn deliver_pair_if_close(&self, just_published: StreamKind, snapshot: &FrameSnapshot) {
        if self.pairing_window == 0 {
            return;
        }
        let sink = lock_unpoisoned(&self.synchronized_sink).clone();
        let Some(sink) = sink else { return };

        let Ok(counterpart) = self.slot(just_published.counterpart()).snapshot() else {
            return;
        };
        if snapshot.timestamp.abs_diff(counterpart.timestamp) > self.pairing_window {
            return;
        }

        let pair = match just_published {
            StreamKind::Depth => (snapshot.generation, counterpart.generation),
            StreamKind::Color => (counterpart.generation, snapshot.generation),
        };
        {
            let mut delivered = lock_unpoisoned(&self.delivered_pair);
            if *delivered == Some(pair) {
                return;
            }
            *delivered = Some(pair);
        }

        let (depth, color) = match just_published {
            StreamKind::Depth => (snapshot, &counterpart),
            StreamKind::Color => (&counterpart, snapshot),
        };
        self.dispatch("synchronized", || sink(depth, color));
    }

    /// Run a sink, containing errors and panics.
    fn dispatch(&self, context: &str, call: impl FnOnce() -> Result<(), SinkError>) {
        match catch_unwind(AssertUnwindSafe(call)) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let failure = CaptureError::sink_failure(context, err.to_string());
                warn!("{failure}");
            }
            Err(_) => {
                let failure = CaptureError::sink_failure(context, "sink panicked");
                warn!("{failure}");
            }
        }
    }
}
