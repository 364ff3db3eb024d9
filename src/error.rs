//! Error types for capture operations.
//!
//! All fallible operations in this crate return [`CaptureError`] through the
//! crate-wide [`Result`] alias. Errors carry structured context and are split
//! along the propagation boundaries the library guarantees:
//!
//! - **Negotiation errors** (`DeviceNotFound`, `UnsupportedFormat`,
//!   `InvalidParameter`, `InvalidState`) surface synchronously to the caller
//!   that triggered them.
//! - **Per-frame errors** (`ShapeMismatch`, `SinkFailure`) are contained
//!   inside the relay: the capture worker logs them and moves on to the next
//!   frame. They appear in caller-facing results only when the caller invokes
//!   the relay directly.
//! - **Session-fatal faults** (`DeviceFault`) are recorded by the worker and
//!   surfaced on the next [`stop_capture`](crate::CaptureSession::stop_capture).
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use aperture::CaptureError;
//!
//! let error = CaptureError::device_not_found("no camera on the bus");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use thiserror::Error;

use crate::types::{SessionState, StreamKind};

/// Result type alias for capture operations.
pub type Result<T, E = CaptureError> = std::result::Result<T, E>;

/// Error signaled by a registered sink.
///
/// Sinks report failure with any boxed error; the relay logs it and keeps
/// publishing.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for capture operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CaptureError {
    #[error("no capture device found: {reason}")]
    DeviceNotFound {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("unsupported stream format: {details}")]
    UnsupportedFormat { stream: Option<StreamKind>, details: String },

    #[error(
        "frame shape mismatch on {stream}: got {actual_len} bytes, slot expects {expected_len} ({width}x{height})"
    )]
    ShapeMismatch {
        stream: StreamKind,
        width: u32,
        height: u32,
        expected_len: usize,
        actual_len: usize,
    },

    #[error("no {stream} frame has been published yet")]
    NotYetAvailable { stream: StreamKind },

    #[error("invalid parameter for {operation}: {details}")]
    InvalidParameter { operation: &'static str, details: String },

    #[error("{operation} is not valid while the session is {state}")]
    InvalidState { operation: &'static str, state: SessionState },

    #[error("sink failed on {context}: {reason}")]
    SinkFailure { context: String, reason: String },

    #[error("capture device fault: {reason}")]
    DeviceFault {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl CaptureError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            CaptureError::DeviceNotFound { .. } => true,
            CaptureError::NotYetAvailable { .. } => true,
            CaptureError::DeviceFault { .. } => true,
            CaptureError::SinkFailure { .. } => true,
            CaptureError::UnsupportedFormat { .. } => false,
            CaptureError::ShapeMismatch { .. } => false,
            CaptureError::InvalidParameter { .. } => false,
            CaptureError::InvalidState { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            CaptureError::DeviceNotFound { .. } => vec![
                "Check the camera is plugged in and powered",
                "Verify USB permissions for the current user",
                "Try reconnecting the device",
            ],
            CaptureError::UnsupportedFormat { .. } => vec![
                "Request a video mode the device advertises",
                "Check the driver's supported formats",
            ],
            CaptureError::ShapeMismatch { .. } => vec![
                "Match the payload to the negotiated width and height",
                "Re-initialize the session if the device changed modes",
            ],
            CaptureError::NotYetAvailable { .. } => vec![
                "Start capture before fetching frames",
                "Wait for the first frame to arrive, or poll peek_generation",
            ],
            CaptureError::InvalidParameter { .. } => vec![
                "Check the documented parameter range",
                "Validate input before passing it to the session",
            ],
            CaptureError::InvalidState { .. } => vec![
                "Check the session lifecycle: initialize, start, stop, shutdown",
                "Query state() before issuing lifecycle calls",
            ],
            CaptureError::SinkFailure { .. } => vec![
                "Inspect the sink's own error output",
                "Re-register a fixed sink; publishing was not interrupted",
            ],
            CaptureError::DeviceFault { .. } => vec![
                "Reconnect the device and re-initialize the session",
                "Check cabling and power before restarting capture",
            ],
        }
    }

    /// Helper constructor for device-not-found errors.
    pub fn device_not_found(reason: impl Into<String>) -> Self {
        CaptureError::DeviceNotFound { reason: reason.into(), source: None }
    }

    /// Helper constructor for device-not-found errors with a source.
    pub fn device_not_found_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        CaptureError::DeviceNotFound { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for unsupported-format errors.
    pub fn unsupported_format(stream: Option<StreamKind>, details: impl Into<String>) -> Self {
        CaptureError::UnsupportedFormat { stream, details: details.into() }
    }

    /// Helper constructor for shape mismatches against a slot's declared mode.
    pub fn shape_mismatch(
        stream: StreamKind,
        width: u32,
        height: u32,
        expected_len: usize,
        actual_len: usize,
    ) -> Self {
        CaptureError::ShapeMismatch { stream, width, height, expected_len, actual_len }
    }

    /// Helper constructor for reads before the first publish.
    pub fn not_yet_available(stream: StreamKind) -> Self {
        CaptureError::NotYetAvailable { stream }
    }

    /// Helper constructor for parameter-range violations.
    pub fn invalid_parameter(operation: &'static str, details: impl Into<String>) -> Self {
        CaptureError::InvalidParameter { operation, details: details.into() }
    }

    /// Helper constructor for lifecycle misuse.
    pub fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        CaptureError::InvalidState { operation, state }
    }

    /// Helper constructor for sink failures.
    pub fn sink_failure(context: impl Into<String>, reason: impl Into<String>) -> Self {
        CaptureError::SinkFailure { context: context.into(), reason: reason.into() }
    }

    /// Helper constructor for session-fatal device faults.
    pub fn device_fault(reason: impl Into<String>) -> Self {
        CaptureError::DeviceFault { reason: reason.into(), source: None }
    }

    /// Helper constructor for device faults with a source.
    pub fn device_fault_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        CaptureError::DeviceFault { reason: reason.into(), source: Some(source) }
    }

    /// Whether this error ends the capture worker when the driver reports it.
    ///
    /// Transient errors are retried with backoff; fatal ones stop the session
    /// with the cause recorded.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, CaptureError::DeviceFault { .. } | CaptureError::DeviceNotFound { .. })
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::DeviceFault { reason: "I/O error".to_string(), source: Some(Box::new(err)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_contain_their_context(
                reason in ".*",
                details in ".*",
                width in 1u32..4096u32,
                height in 1u32..4096u32,
                actual in 0usize..0x100000usize,
            ) {
                let not_found = CaptureError::device_not_found(reason.clone());
                prop_assert!(not_found.to_string().contains(&reason));

                let param = CaptureError::invalid_parameter("set_tilt_degrees", details.clone());
                prop_assert!(param.to_string().contains(&details));
                prop_assert!(param.to_string().contains("set_tilt_degrees"));

                let expected = (width as usize) * (height as usize) * 2;
                let shape = CaptureError::shape_mismatch(
                    StreamKind::Depth, width, height, expected, actual,
                );
                let msg = shape.to_string();
                prop_assert!(msg.contains(&expected.to_string()));
                prop_assert!(msg.contains(&actual.to_string()));

                // No variant renders an empty message.
                prop_assert!(!not_found.to_string().is_empty());
                prop_assert!(!shape.to_string().is_empty());
            }

            #[test]
            fn source_chaining_preserves_the_base_error(base_message in "[a-zA-Z0-9 ]+") {
                let io_err = std::io::Error::other(base_message.clone());
                let wrapped = CaptureError::device_fault_with_source(
                    "device dropped off the bus",
                    Box::new(io_err),
                );

                let source = std::error::Error::source(&wrapped)
                    .expect("fault with source must expose it");
                prop_assert!(source.to_string().contains(&base_message));
            }
        }
    }

    #[test]
    fn retryability_matches_propagation_policy() {
        assert!(CaptureError::device_not_found("unplugged").is_retryable());
        assert!(CaptureError::not_yet_available(StreamKind::Color).is_retryable());
        assert!(!CaptureError::invalid_parameter("set_tilt_degrees", "42").is_retryable());
        assert!(
            !CaptureError::invalid_state("start_capture", SessionState::ShutDown).is_retryable()
        );
        assert!(!CaptureError::shape_mismatch(StreamKind::Depth, 1, 1, 2, 3).is_retryable());
    }

    #[test]
    fn session_fatal_classification() {
        assert!(CaptureError::device_fault("usb stall").is_session_fatal());
        assert!(!CaptureError::not_yet_available(StreamKind::Depth).is_session_fatal());
        assert!(!CaptureError::sink_failure("depth", "boom").is_session_fatal());
    }

    #[test]
    fn every_variant_offers_recovery_suggestions() {
        let errors = [
            CaptureError::device_not_found("x"),
            CaptureError::unsupported_format(Some(StreamKind::Color), "x"),
            CaptureError::shape_mismatch(StreamKind::Depth, 2, 2, 8, 7),
            CaptureError::not_yet_available(StreamKind::Depth),
            CaptureError::invalid_parameter("set_tilt_degrees", "x"),
            CaptureError::invalid_state("initialize", SessionState::Capturing),
            CaptureError::sink_failure("color", "x"),
            CaptureError::device_fault("x"),
        ];
        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            for suggestion in suggestions {
                assert!(suggestion.len() > 5);
            }
        }
    }

    #[test]
    fn error_is_send_sync_static() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<CaptureError>();
    }

    #[test]
    fn io_errors_convert_to_device_faults() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "usb gone");
        let err: CaptureError = io_err.into();
        match err {
            CaptureError::DeviceFault { source, .. } => {
                assert_eq!(source.expect("source kept").to_string(), "usb gone");
            }
            other => panic!("expected DeviceFault, got {other:?}"),
        }
    }
}
