//! Bus and session throughput benchmarks.
//!
//! - Publish fan-out: 1, 10, 100 listeners, sync and deferred
//! - Queue release on channel confirmation: 10, 100, 1000 frames
//!
//! Run with: cargo bench --bench publish
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pubsub_cable::{
    Client, Connector, EventLoop, Headers, Result, SubscribeOptions, TopicBus, Transport,
    TransportEvent, TransportSink,
};
use serde_json::{Value, json};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const LISTENER_COUNTS: &[usize] = &[1, 10, 100];
const QUEUED_FRAMES: &[usize] = &[10, 100, 1000];

// ============================================================================
// Fixtures
// ============================================================================

/// Transport that discards frames.
struct Discard;

impl Transport for Discard {
    fn send(&self, frame: String) -> Result<()> {
        black_box(frame);
        Ok(())
    }

    fn close(&self) {}
}

/// Hands out [`Discard`] transports and keeps the last sink.
#[derive(Default)]
struct DiscardConnector {
    sink: parking_lot::Mutex<Option<TransportSink>>,
}

impl Connector for DiscardConnector {
    fn open(&self, _: &str, _: &Headers, sink: TransportSink) -> Result<Box<dyn Transport>> {
        *self.sink.lock() = Some(sink);
        Ok(Box::new(Discard))
    }
}

// ============================================================================
// Benchmark: Publish Fan-out
// ============================================================================

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");

    for &count in LISTENER_COUNTS {
        for sync in [true, false] {
            let mut event_loop = EventLoop::new();
            let bus = TopicBus::new(&event_loop.scheduler());
            let options = SubscribeOptions { once: false, sync };

            for _ in 0..count {
                bus.subscribe("bench.topic", |_, data| { black_box(data); }, options)
                    .expect("subscribe");
            }

            let name = if sync { "sync" } else { "deferred" };
            group.bench_with_input(BenchmarkId::new(name, count), &count, |b, _| {
                b.iter(|| {
                    bus.publish("bench", json!({"n": 1}));
                    event_loop.run_until_idle()
                });
            });
        }
    }

    group.finish();
}

// ============================================================================
// Benchmark: Confirmation Release
// ============================================================================

fn bench_confirm_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("confirm_release");

    for &frames in QUEUED_FRAMES {
        group.bench_with_input(BenchmarkId::new("frames", frames), &frames, |b, &frames| {
            b.iter(|| {
                let connector = Arc::new(DiscardConnector::default());
                let client = Client::builder()
                    .socket_url("ws://bench.invalid/cable")
                    .connector(connector.clone())
                    .build()
                    .expect("client");

                client.connect().expect("connect");
                let sink = connector.sink.lock().clone().expect("sink");
                sink.emit(TransportEvent::Open);
                client.subscribe_channel("rooms", Value::Null).expect("subscribe");

                for n in 0..frames {
                    client.message("rooms", json!({"n": n})).expect("queue");
                }

                sink.emit(TransportEvent::Message(
                    r#"{"identifier":"{\"channel\":\"rooms\"}","type":"confirm_subscription"}"#
                        .into(),
                ));
                client.run_until_idle()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_publish, bench_confirm_release);
criterion_main!(benches);
