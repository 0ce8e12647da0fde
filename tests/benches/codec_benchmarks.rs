//! # Herald Hot Path Benchmarks
//!
//! Every message crosses the codec twice and the topic matcher once per
//! binding:
//!
//! | Path | Operation | Target |
//! |------|-----------|--------|
//! | shared-types codec | Envelope encode + decode | < 20µs |
//! | shared-bus topic | Pattern match per binding | < 1µs |
//! | shared-bus broker | Publish + consume through a topic exchange | < 50µs |

#![allow(clippy::excessive_nesting)]

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use shared_bus::{BrokerConfig, ExchangeKind, InMemoryBroker, QueueArgs, TopicPattern};
use shared_types::{
    CorrelationId, Event, EventEnvelope, InboxItem, NotificationList, NotificationView, Priority,
    RecipientRef, RecipientStatus,
};

fn inbox_item(i: usize) -> InboxItem {
    InboxItem {
        notification: NotificationView {
            id: format!("n-{i}"),
            title: "Scheduled maintenance".into(),
            body: "The platform restarts at 22:00 UTC".into(),
            priority: Priority::Medium,
            sender_id: Some("admin-1".into()),
            broadcast: false,
            created_at: Utc::now(),
        },
        status: RecipientStatus::Delivered,
        delivered_at: Some(Utc::now()),
        read_at: None,
        acknowledged_at: None,
    }
}

// ============================================================================
// Envelope codec
// ============================================================================

fn bench_envelope_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope-codec");

    let small = EventEnvelope::new(
        "api-gateway",
        CorrelationId::new(),
        Event::NotificationMarkReadRequested(RecipientRef::new("n-1", "u-1")),
    );
    let small_bytes = small.encode().unwrap();

    group.bench_function("encode_small", |b| {
        b.iter(|| black_box(small.encode().unwrap()))
    });
    group.bench_function("decode_small", |b| {
        b.iter(|| black_box(EventEnvelope::decode(&small_bytes).unwrap()))
    });

    for size in [20, 100] {
        let page = EventEnvelope::new(
            "notification-service",
            CorrelationId::new(),
            Event::NotificationListSucceeded(NotificationList {
                user_id: "u-1".into(),
                notifications: (0..size).map(inbox_item).collect(),
                total: size as u64,
                page: 1,
                limit: size as u32,
            }),
        );
        let bytes = page.encode().unwrap();

        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("roundtrip_inbox_page", size), &page, |b, page| {
            b.iter(|| {
                let bytes = page.encode().unwrap();
                black_box(EventEnvelope::decode(&bytes).unwrap())
            })
        });
    }

    group.finish();
}

// ============================================================================
// Topic matching
// ============================================================================

fn bench_topic_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("topic-matching");

    let patterns: Vec<TopicPattern> = [
        "notification.*.requested",
        "notification.delivered",
        "user.list.succeeded",
        "user.list.failed",
        "user.#.requested",
        "notification.created",
        "notification.read",
        "notification.acknowledged",
    ]
    .iter()
    .map(|p| TopicPattern::parse(p).unwrap())
    .collect();

    let keys = [
        "notification.create.requested",
        "user.auth.register.requested",
        "notification.acknowledge.failed",
        "user.list.succeeded",
    ];

    group.throughput(Throughput::Elements(patterns.len() as u64));
    for key in keys {
        group.bench_with_input(BenchmarkId::new("all_bindings", key), &key, |b, key| {
            b.iter(|| black_box(patterns.iter().filter(|p| p.matches(key)).count()))
        });
    }

    // Deep keys stress the `#` backtracking
    let mut rng = rand::thread_rng();
    let deep: Vec<String> = (0..64)
        .map(|_| {
            let depth = rng.gen_range(3..12);
            let mut words: Vec<String> = (0..depth).map(|i| format!("w{i}")).collect();
            words.push("requested".into());
            words.join(".")
        })
        .collect();
    let hash = TopicPattern::parse("#.w2.#.requested").unwrap();
    group.throughput(Throughput::Elements(deep.len() as u64));
    group.bench_function("hash_backtracking", |b| {
        b.iter(|| black_box(deep.iter().filter(|k| hash.matches(k)).count()))
    });

    group.finish();
}

// ============================================================================
// Broker round trip
// ============================================================================

fn bench_broker_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("broker");

    let broker = InMemoryBroker::new(BrokerConfig::default());
    broker.declare_exchange("events", ExchangeKind::Topic).unwrap();
    broker.declare_queue("svc", QueueArgs::new()).unwrap();
    broker
        .bind_queue("svc", "events", "notification.*.requested")
        .unwrap();
    let body = EventEnvelope::new(
        "api-gateway",
        CorrelationId::new(),
        Event::NotificationMarkReadRequested(RecipientRef::new("n-1", "u-1")),
    )
    .encode()
    .unwrap();

    group.bench_function("publish_get_ack", |b| {
        b.iter(|| {
            broker
                .publish("events", "notification.markread.requested", body.clone())
                .unwrap();
            let delivery = broker.try_get("svc").unwrap().unwrap();
            black_box(delivery.body().len());
            delivery.ack();
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_envelope_codec,
    bench_topic_matching,
    bench_broker_roundtrip,
);

criterion_main!(benches);
