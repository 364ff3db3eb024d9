//! End-to-end tests over the public API with the synthetic camera.

use std::time::{Duration, Instant};

use aperture::{
    Aperture, CaptureConfig, CaptureError, LedState, PixelFormat, SessionState, StreamKind,
    SyntheticCamera, SyntheticConfig, VideoMode,
};

/// A small, fast synthetic mode so tests spend milliseconds, not seconds.
fn tiny_synthetic() -> SyntheticConfig {
    SyntheticConfig {
        depth_mode: VideoMode {
            width: 16,
            height: 8,
            format: PixelFormat::Depth16,
            frame_rate: 250.0,
        },
        color_mode: VideoMode {
            width: 16,
            height: 8,
            format: PixelFormat::Rgb24,
            frame_rate: 250.0,
        },
    }
}

fn fast_config() -> CaptureConfig {
    CaptureConfig { pairing_window: 10, poll_interval: Duration::from_millis(5) }
}

fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[test]
fn synthetic_capture_end_to_end() {
    let camera = SyntheticCamera::new(tiny_synthetic());
    let session = Aperture::open(camera, fast_config()).expect("open");
    assert_eq!(session.state(), SessionState::Initialized);

    session.start_capture().expect("start");
    assert!(wait_for(|| {
        session.peek_generation(StreamKind::Depth) >= 3
            && session.peek_generation(StreamKind::Color) >= 3
    }));
    session.stop_capture().expect("stop");

    let depth = session.fetch(StreamKind::Depth).expect("depth frame");
    assert_eq!(depth.format, PixelFormat::Depth16);
    assert_eq!(depth.data.len(), 16 * 8 * 2);
    assert!(depth.depth_millimeters().expect("samples").iter().all(|&mm| mm >= 500));

    let color = session.fetch(StreamKind::Color).expect("color frame");
    assert_eq!(color.format, PixelFormat::Rgb24);
    assert_eq!(color.data.len(), 16 * 8 * 3);

    // Stopped is re-entrant; shutdown is terminal and idempotent.
    session.start_capture().expect("restart");
    session.shutdown().expect("shutdown");
    session.shutdown().expect("second shutdown is a no-op");
    assert_eq!(session.state(), SessionState::ShutDown);
}

#[test]
fn open_rejects_impossible_modes() {
    let mut config = tiny_synthetic();
    config.color_mode.format = PixelFormat::Depth16;
    let result = Aperture::open(SyntheticCamera::new(config), CaptureConfig::default());
    assert!(matches!(result, Err(CaptureError::UnsupportedFormat { .. })));
}

#[test]
fn device_controls_validate_before_the_driver() {
    let session =
        Aperture::open(SyntheticCamera::new(tiny_synthetic()), fast_config()).expect("open");

    assert!(matches!(
        session.set_tilt_degrees(45.0),
        Err(CaptureError::InvalidParameter { .. })
    ));
    session.set_tilt_degrees(15.0).expect("in range");
    session.set_led(LedState::Green).expect("led");
}

#[test]
fn generation_polling_detects_freshness_without_copies() {
    let session =
        Aperture::open(SyntheticCamera::new(tiny_synthetic()), fast_config()).expect("open");
    assert_eq!(session.peek_generation(StreamKind::Depth), 0);
    assert!(matches!(
        session.fetch(StreamKind::Depth),
        Err(CaptureError::NotYetAvailable { .. })
    ));

    session.start_capture().expect("start");
    assert!(wait_for(|| session.peek_generation(StreamKind::Depth) > 0));
    session.stop_capture().expect("stop");

    let generation = session.peek_generation(StreamKind::Depth);
    let snap = session.fetch(StreamKind::Depth).expect("frame");
    assert_eq!(snap.generation, generation);
    // Nothing published since the worker joined.
    assert_eq!(session.peek_generation(StreamKind::Depth), generation);
}
