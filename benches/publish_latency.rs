//! Benchmarks for relay publish latency.
//!
//! Measures the producer-side cost of one `publish`: the slot write, the
//! watch-channel update, and (in the sink variants) sink dispatch. Run with:
//! `cargo bench --features benchmark --bench publish_latency`

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{Criterion, criterion_group, criterion_main};

use aperture::test_utils::qvga_caps;
use aperture::{FrameRelay, StreamKind};

fn bench_publish(c: &mut Criterion) {
    let caps = qvga_caps();
    let payload = vec![0x2au8; caps.depth.frame_len()];

    c.bench_function("publish_qvga_depth_no_sink", |b| {
        let relay = FrameRelay::new(caps, 0);
        let mut timestamp = 0u32;
        b.iter(|| {
            timestamp = timestamp.wrapping_add(33);
            relay
                .publish(StreamKind::Depth, black_box(&payload), 320, 240, timestamp)
                .expect("publish");
        });
    });

    c.bench_function("publish_qvga_depth_with_sink", |b| {
        let relay = FrameRelay::new(caps, 0);
        let observed = std::sync::Arc::new(AtomicU64::new(0));
        let observed_in_sink = std::sync::Arc::clone(&observed);
        relay.register_sink(StreamKind::Depth, move |snapshot| {
            observed_in_sink.fetch_add(snapshot.generation, Ordering::Relaxed);
            Ok(())
        });

        let mut timestamp = 0u32;
        b.iter(|| {
            timestamp = timestamp.wrapping_add(33);
            relay
                .publish(StreamKind::Depth, black_box(&payload), 320, 240, timestamp)
                .expect("publish");
        });
        black_box(observed.load(Ordering::Relaxed));
    });
}

criterion_group!(benches, bench_publish);
criterion_main!(benches);
