//! The capture worker: pumps driver frames into the relay.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::relay::FrameRelay;
use crate::session::SessionShared;
use crate::sync::lock_unpoisoned;
use crate::types::SessionState;

/// Consecutive driver errors tolerated before the worker gives up.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Worker loop. Runs on its own thread until cancelled or the driver fails
/// fatally.
///
/// Per-frame errors (a malformed payload the relay rejects) are logged and
/// skipped. Transient driver errors are retried with capped exponential
/// backoff; a fatal fault (or too many consecutive errors) is recorded on the
/// session and flips it to `Stopped` before the thread exits.
pub(crate) fn run(
    shared: Arc<SessionShared>,
    relay: Arc<FrameRelay>,
    cancel: CancellationToken,
    poll_interval: Duration,
) {
    info!("capture worker started");
    let mut frame_count = 0u64;
    let mut error_count = 0u32;

    loop {
        // Checked once per iteration; the poll below bounds stop latency.
        if cancel.is_cancelled() {
            info!("capture worker cancelled");
            break;
        }

        let polled = {
            let mut driver = lock_unpoisoned(&shared.driver);
            driver.poll_frame(poll_interval)
        };

        match polled {
            Ok(Some(frame)) => {
                frame_count += 1;
                error_count = 0;

                match relay.publish(
                    frame.stream,
                    &frame.data,
                    frame.width,
                    frame.height,
                    frame.timestamp,
                ) {
                    Ok(generation) => {
                        trace!(stream = %frame.stream, generation, "frame relayed");
                    }
                    Err(err) => {
                        // Contained: the slot kept its previous frame.
                        warn!("dropping malformed frame: {err}");
                    }
                }
            }
            Ok(None) => {
                trace!("no frame within poll interval");
            }
            Err(err) => {
                error_count += 1;

                if err.is_session_fatal() || error_count >= MAX_CONSECUTIVE_ERRORS {
                    error!("capture worker stopping: {err}");
                    let mut fault = lock_unpoisoned(&shared.fault);
                    *fault = Some(err);
                    drop(fault);

                    let mut state = lock_unpoisoned(&shared.state);
                    if *state == SessionState::Capturing {
                        *state = SessionState::Stopped;
                    }
                    break;
                }

                warn!("driver error ({error_count}/{MAX_CONSECUTIVE_ERRORS}): {err}");
                let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                thread::sleep(backoff);
            }
        }
    }

    info!(frames = frame_count, "capture worker exited");
}
