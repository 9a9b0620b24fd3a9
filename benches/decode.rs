//! Decode throughput and latency benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use orderbook_feed::{schema::MAX_DEPTH, BookEncoder, Decoder, PriceLevel};

fn full_depth_book(id: i32) -> Vec<u8> {
    let bids: Vec<PriceLevel> = (0..MAX_DEPTH)
        .map(|i| PriceLevel::new(10_000.0 - i as f32 * 0.5, 1.0 + i as f32))
        .collect();
    let asks: Vec<PriceLevel> = (0..MAX_DEPTH)
        .map(|i| PriceLevel::new(10_000.5 + i as f32 * 0.5, 1.0 + i as f32))
        .collect();

    BookEncoder::new()
        .id(id)
        .pair("BTC:USD")
        .bid(bids[0].price)
        .ask(asks[0].price)
        .ticker(9_500.0, 10_250.0, 10_000.25, 1_234.5)
        .bids(&bids)
        .asks(&asks)
        .finish()
}

fn bench_decode_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_throughput");
    let decoder = Decoder::new();

    for msg_count in [1000, 10000, 100000].iter() {
        let buffers: Vec<Vec<u8>> = (0..*msg_count).map(|i| full_depth_book(i as i32)).collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(msg_count),
            msg_count,
            |b, _| {
                b.iter(|| {
                    let mut volume = 0.0f32;
                    for buf in &buffers {
                        if let Ok(msg) = decoder.decode(black_box(buf)) {
                            volume += msg.bids().iter().map(|l| l.qty).sum::<f32>();
                        }
                    }
                    volume
                });
            },
        );
    }
    group.finish();
}

fn bench_decode_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_latency");
    let decoder = Decoder::new();

    let full = full_depth_book(42);
    let top_only = BookEncoder::new()
        .id(42)
        .pair("BTC:USD")
        .bid(10_000.5)
        .ask(10_001.0)
        .bids(&[PriceLevel::new(10_000.5, 2.0)])
        .asks(&[PriceLevel::new(10_001.0, 1.5)])
        .finish();
    let truncated = vec![0u8; 2];

    group.bench_function("full_depth", |b| {
        b.iter(|| decoder.decode(black_box(&full)).map(|m| m.id()))
    });

    group.bench_function("top_of_book", |b| {
        b.iter(|| decoder.decode(black_box(&top_only)).map(|m| m.id()))
    });

    group.bench_function("truncated", |b| {
        b.iter(|| decoder.decode(black_box(&truncated)).is_err())
    });

    group.bench_function("to_snapshot", |b| {
        b.iter(|| decoder.decode(black_box(&full)).map(|m| m.to_snapshot()))
    });

    group.finish();
}

criterion_group!(benches, bench_decode_throughput, bench_decode_latency);
criterion_main!(benches);
