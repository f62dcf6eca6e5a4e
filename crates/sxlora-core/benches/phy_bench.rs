//! Benchmarks for the LoRa PHY hot paths
//!
//! Run with: cargo bench -p sxlora-core --bench phy_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sxlora_core::chirp::gen_chirp;
use sxlora_core::detector::SymbolDetector;
use sxlora_core::prelude::*;
use sxlora_core::types::IQSample;

fn bench_chirp_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("chirp_generation");

    for sf in [7u8, 10, 12] {
        let n = 1usize << sf;
        let mut samps = vec![IQSample::new(0.0, 0.0); n];

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("upchirp", sf), &sf, |b, _| {
            let mut phase = 0.0f32;
            b.iter(|| {
                gen_chirp(
                    black_box(&mut samps),
                    n,
                    1,
                    n,
                    0.1,
                    false,
                    1.0,
                    &mut phase,
                )
            })
        });
    }

    group.finish();
}

fn bench_detector(c: &mut Criterion) {
    let mut group = c.benchmark_group("detector");

    for sf in [7u8, 10, 12] {
        let n = 1usize << sf;
        let mut det = SymbolDetector::new(n);
        let mut chirp = vec![IQSample::new(0.0, 0.0); n];
        let mut phase = 0.0f32;
        gen_chirp(&mut chirp, n, 1, n, 0.25, false, 1.0, &mut phase);
        for (i, &s) in chirp.iter().enumerate() {
            det.feed(i, s);
        }

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("detect", sf), &sf, |b, _| {
            b.iter(|| black_box(det.detect()))
        });
    }

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let params = PhyParams::builder()
        .spreading_factor(10)
        .coding_rate("4/8")
        .build()
        .unwrap();
    let encoder = Encoder::new(params.clone());
    let mut decoder = Decoder::new(params);

    let payload: Vec<u8> = (0..128u8).collect();
    let symbols = encoder.encode(&payload);

    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("encode_128B", |b| {
        b.iter(|| black_box(encoder.encode(black_box(&payload))))
    });
    group.bench_function("decode_128B", |b| {
        b.iter(|| black_box(decoder.decode(black_box(&symbols))))
    });

    group.finish();
}

criterion_group!(benches, bench_chirp_generation, bench_detector, bench_codec);
criterion_main!(benches);
