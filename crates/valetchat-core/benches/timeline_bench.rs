//! Benchmarks for timeline and roster reductions
//!
//! Run with: cargo bench -p valetchat-core

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::Value;
use valetchat_core::{Message, MessageBody, MessageId, Roster, Timeline, TimelineEntry, UserId};

fn message(i: usize, millis: i64) -> Message {
    let (from, to) = if i % 2 == 0 { ("111", "222") } else { ("222", "111") };
    Message::compose(
        MessageId::new(format!("m{:06}", i)),
        UserId::new(from),
        "Ada Lovelace",
        UserId::new(to),
        MessageBody::text(format!("message {}", i)),
        Utc.timestamp_millis_opt(millis).unwrap(),
    )
}

/// Timeline with `n` messages delivered newest-first (worst case for re-sorting).
fn timeline_with(n: usize) -> Timeline {
    let mut timeline = Timeline::new(UserId::new("222"), UserId::new("111"));
    for i in 0..n {
        timeline.insert(TimelineEntry::new(message(i, (n - i) as i64), None, i as u64));
    }
    timeline
}

// ============================================================================
// Timeline Benchmarks
// ============================================================================

fn bench_timeline_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline_insert");

    for size in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("into", size), &size, |b, &size| {
            b.iter_batched(
                || timeline_with(size),
                |mut timeline| {
                    let entry = TimelineEntry::new(message(size, 0), None, size as u64);
                    black_box(timeline.insert(entry))
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_timeline_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline_build");
    for size in [100usize, 500] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| black_box(timeline_with(size)))
        });
    }
    group.finish();
}

// ============================================================================
// Record Codec Benchmarks
// ============================================================================

fn bench_record_decode(c: &mut Criterion) {
    let record: Value = message(1, 1_549_000_000_000).to_record();
    c.bench_function("message_from_record", |b| {
        b.iter(|| black_box(Message::from_record(MessageId::new("m1"), &record).unwrap()))
    });
}

// ============================================================================
// Roster Benchmarks
// ============================================================================

fn bench_roster_apply(c: &mut Criterion) {
    let messages: Vec<Message> = (0..1000)
        .map(|i| {
            let peer = format!("2{:03}", i % 50);
            Message::compose(
                MessageId::new(format!("r{:06}", i)),
                UserId::new(peer),
                "",
                UserId::new("111"),
                MessageBody::text("hi"),
                Utc.timestamp_millis_opt(i as i64).unwrap(),
            )
        })
        .collect();

    let mut group = c.benchmark_group("roster");
    group.throughput(Throughput::Elements(messages.len() as u64));
    group.bench_function("apply_1000_over_50_peers", |b| {
        b.iter(|| {
            let mut roster = Roster::new(UserId::new("111"));
            for m in &messages {
                roster.apply(m.clone());
            }
            black_box(roster.sorted())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_timeline_insert,
    bench_timeline_build,
    bench_record_decode,
    bench_roster_apply,
);
criterion_main!(benches);
