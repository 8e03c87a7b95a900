//! Benchmarks for record parsing and the flood engine hot path

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vouch_core::{MessageRecord, NodeId, Peer};
use vouch_runtime::{EngineConfig, FloodEngine};
use vouch_time::ManualClock;

fn bench_parse(c: &mut Criterion) {
    let full = b"4294967295|65535|65535|18446744073709551615";
    let short = b"17|fe80::212:7401:1:101";

    c.bench_function("parse_full", |b| b.iter(|| vouch_wire::parse(black_box(full))));
    c.bench_function("parse_ipv6_origin", |b| {
        b.iter(|| vouch_wire::parse(black_box(short)))
    });
}

fn bench_encode(c: &mut Criterion) {
    let record = MessageRecord::attestation(123_456, NodeId::new(42), NodeId::new(7), 99_000);
    c.bench_function("encode", |b| b.iter(|| vouch_wire::encode(black_box(&record))));
}

fn bench_on_receive(c: &mut Criterion) {
    let datagrams: Vec<Bytes> = (0..64u32)
        .map(|n| vouch_wire::encode(&MessageRecord::origin(n, NodeId::new(9), 0)))
        .collect();

    c.bench_function("on_receive_fresh_origin", |b| {
        b.iter(|| {
            let mut engine =
                FloodEngine::new(NodeId::new(3), EngineConfig::default(), ManualClock::new())
                    .unwrap();
            for datagram in &datagrams {
                black_box(engine.on_receive(datagram.clone(), Peer::Unknown));
            }
        })
    });
}

criterion_group!(benches, bench_parse, bench_encode, bench_on_receive);
criterion_main!(benches);
