//! Benchmarks for request window operations.
//!
//! Run with: cargo bench --bench window

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use smpp_session::session::Window;
use smpp_session::Pdu;

fn bench_offer_complete(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("window/offer_complete");
    group.throughput(Throughput::Elements(1));

    for synchronous in [false, true] {
        let window = Window::new(64);
        let window = &window;
        let mut key = 0u32;
        group.bench_with_input(
            BenchmarkId::from_parameter(if synchronous { "sync" } else { "async" }),
            &synchronous,
            |b, &synchronous| {
                b.to_async(&rt).iter(|| {
                    key = key.wrapping_add(1);
                    let key = key;
                    async move {
                        let request = Pdu::enquire_link().with_sequence(key);
                        let response = request.create_response();
                        window
                            .offer(key, request, Duration::ZERO, None, synchronous)
                            .await
                            .unwrap();
                        black_box(window.complete(key, response.unwrap()))
                    }
                })
            },
        );
    }

    group.finish();
}

fn bench_expiry_sweep(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("window/cancel_all_expired");

    for size in [16usize, 256] {
        let window = Window::new(size);
        rt.block_on(async {
            for key in 0..size as u32 {
                window
                    .offer(
                        key,
                        Pdu::enquire_link().with_sequence(key),
                        Duration::ZERO,
                        Some(Duration::from_secs(3600)),
                        false,
                    )
                    .await
                    .unwrap();
            }
        });

        // Nothing is due, so this measures the scan over a full window.
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(window.cancel_all_expired()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_offer_complete, bench_expiry_sweep);
criterion_main!(benches);
