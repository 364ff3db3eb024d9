//! Async delivery of published frames.

mod throttle;

pub use throttle::{ThrottleExt, ThrottleLatest};
