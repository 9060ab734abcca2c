//! RingLog Benchmarks
//!
//! Producer-side cost of a decision log entry. The producer path is what the
//! decision thread pays; the drainer runs elsewhere.

use chrono::Local;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::io;
use tachyon_core::config::LoggerConfig;
use tachyon_core::ring_log;
use tachyon_core::ringlog::{bounded, timestamp, RingLog};

fn config() -> LoggerConfig {
    LoggerConfig {
        lower_priority: false,
        pin_to_last_core: false,
        ..LoggerConfig::default()
    }
}

/// Benchmark: push + drain on a bare ring, no drainer thread
fn bench_ring_push_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_push_drain");

    for &capacity in &[256usize, 0x2000] {
        let (producer, mut consumer) = bounded(capacity).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, _| {
            b.iter(|| {
                producer.push(
                    black_box("2026-01-01 00:00:00.000000000"),
                    format_args!("signal={:.4} size={}", black_box(0.42), black_box(17)),
                );
                consumer.drain_batch(32, |line| {
                    black_box(line);
                });
            });
        });
    }

    group.finish();
}

/// Benchmark: full log call (timestamp + format + publish) with a live drainer
fn bench_log_entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("ringlog_entry");

    let log = RingLog::with_sink(io::sink(), &config()).unwrap();
    group.bench_function("log_with_drainer", |b| {
        b.iter(|| {
            black_box(ring_log!(
                log,
                "[EXEC] {} {} @ {:.4}",
                'B',
                black_box(37),
                black_box(101.0)
            ));
        });
    });

    group.finish();
}

/// Benchmark: cached vs uncached timestamp formatting
fn bench_timestamp(c: &mut Criterion) {
    let mut group = c.benchmark_group("timestamp");
    let now = Local::now();

    group.bench_function("cached_prefix", |b| {
        b.iter(|| timestamp::with_formatted(black_box(&now), |s| s.len()));
    });

    group.bench_function("chrono_format", |b| {
        b.iter(|| {
            black_box(now.format("%Y-%m-%d %H:%M:%S%.9f").to_string());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_ring_push_drain, bench_log_entry, bench_timestamp);
criterion_main!(benches);
