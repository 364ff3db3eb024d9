//! The single-slot latest-frame buffer backing one stream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{CaptureError, Result};
use crate::sync::lock_unpoisoned;
use crate::types::{FrameSnapshot, StreamKind, VideoMode};

/// One mutex-guarded storage location for the most recent frame of a stream.
///
/// The slot's shape is fixed at allocation: every write must carry exactly
/// `mode.frame_len()` bytes for the declared geometry, so the payload is
/// replaced whole and a reader can never observe a partially written frame.
/// The payload lives behind an `Arc`, which makes a snapshot a cheap clone
/// that stays stable while the writer moves on.
pub struct FrameSlot {
    stream: StreamKind,
    mode: VideoMode,
    state: Mutex<SlotState>,
    /// Mirrors the write count for lock-free freshness polling.
    generation: AtomicU64,
}

struct SlotState {
    payload: Option<Arc<[u8]>>,
    timestamp: u32,
}

impl FrameSlot {
    /// Allocate a slot for one stream in its negotiated mode.
    pub fn new(stream: StreamKind, mode: VideoMode) -> Self {
        Self {
            stream,
            mode,
            state: Mutex::new(SlotState { payload: None, timestamp: 0 }),
            generation: AtomicU64::new(0),
        }
    }

    /// The stream this slot stores frames for.
    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// The fixed mode this slot was allocated with.
    pub fn mode(&self) -> VideoMode {
        self.mode
    }

    /// Replace the slot contents with a full frame payload.
    ///
    /// Fails with [`CaptureError::ShapeMismatch`] when the payload does not
    /// match the slot's declared geometry; the slot is left untouched in that
    /// case. On success the generation increments by exactly 1 and the
    /// returned snapshot reflects the bytes just written.
    pub fn write(
        &self,
        payload: &[u8],
        width: u32,
        height: u32,
        timestamp: u32,
    ) -> Result<FrameSnapshot> {
        let expected_len = self.mode.frame_len();
        if width != self.mode.width || height != self.mode.height || payload.len() != expected_len
        {
            return Err(CaptureError::shape_mismatch(
                self.stream,
                width,
                height,
                expected_len,
                payload.len(),
            ));
        }

        let data: Arc<[u8]> = Arc::from(payload);
        let mut state = lock_unpoisoned(&self.state);
        state.payload = Some(Arc::clone(&data));
        state.timestamp = timestamp;
        // Bump under the guard so a snapshot never pairs a new generation
        // with an old payload. Release publishes the payload to peekers.
        let generation = self.generation.fetch_add(1, Ordering::Release) + 1;
        drop(state);

        Ok(FrameSnapshot {
            data,
            width: self.mode.width,
            height: self.mode.height,
            format: self.mode.format,
            generation,
            timestamp,
        })
    }

    /// A stable view of the current contents.
    ///
    /// Fails with [`CaptureError::NotYetAvailable`] until the first write.
    pub fn snapshot(&self) -> Result<FrameSnapshot> {
        let state = lock_unpoisoned(&self.state);
        let data = state
            .payload
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| CaptureError::not_yet_available(self.stream))?;
        let snapshot = FrameSnapshot {
            data,
            width: self.mode.width,
            height: self.mode.height,
            format: self.mode.format,
            generation: self.generation.load(Ordering::Acquire),
            timestamp: state.timestamp,
        };
        Ok(snapshot)
    }

    /// Current generation without locking or copying. `0` until the first
    /// write, letting a poller skip the snapshot when nothing changed.
    pub fn peek_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
