//! Latest-wins rate capping for frame streams.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Extension trait adding latest-wins rate capping to any `Stream`.
pub trait ThrottleExt: Stream {
    /// Emit at most once per `period`, always the most recent item.
    ///
    /// Frames that arrive between emissions are dropped, not queued: a slow
    /// consumer sees fresh frames at its own pace instead of a growing
    /// backlog of stale ones.
    fn throttle_latest(self, period: Duration) -> ThrottleLatest<Self>
    where
        Self: Sized,
    {
        ThrottleLatest::new(self, period)
    }
}

impl<S: Stream> ThrottleExt for S {}

pin_project! {
    /// Stream combinator produced by [`ThrottleExt::throttle_latest`].
    pub struct ThrottleLatest<S: Stream> {
        #[pin]
        inner: S,
        ticks: Interval,
        held: Option<S::Item>,
    }
}

impl<S: Stream> ThrottleLatest<S> {
    fn new(inner: S, period: Duration) -> Self {
        let mut ticks = interval(period);
        // A stalled consumer resumes on the next period, without a burst of
        // catch-up emissions.
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { inner, ticks, held: None }
    }
}

impl<S: Stream> Stream for ThrottleLatest<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        ready!(this.ticks.poll_tick(cx));

        // Drain whatever accumulated since the last tick; keep the newest.
        loop {
            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.held = Some(item),
                Poll::Ready(None) => return Poll::Ready(this.held.take()),
                Poll::Pending => {
                    return match this.held.take() {
                        Some(item) => Poll::Ready(Some(item)),
                        // Nothing new this period; wait for the source, not
                        // the next tick, to avoid emitting stale ticks.
                        None => Poll::Pending,
                    };
                }
            }
        }
    }
}
