//! Benchmarks for label parsing and read stabilization.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pantry_scanner::capture::parse_label_fields;
use pantry_scanner::decode::Stabilizer;

fn bench_label_parse(c: &mut Criterion) {
    let reply = "**Name:** Organic Whole Milk\n\
                 - Manufacturing Date: 2024-11-02\n\
                 - Expiry Date: 2025-03-01\n\
                 - Batch Number: L4471-B\n\
                 Notes: keep refrigerated";

    c.bench_function("parse_label_fields", |b| {
        b.iter(|| parse_label_fields(black_box(reply)))
    });

    let noisy: String = (0..200).map(|i| format!("line {i}: nothing useful\n")).collect();
    c.bench_function("parse_label_fields_noisy", |b| {
        b.iter(|| parse_label_fields(black_box(&noisy)))
    });
}

fn bench_stabilizer(c: &mut Criterion) {
    c.bench_function("stabilizer_alternating", |b| {
        b.iter(|| {
            let mut stabilizer = Stabilizer::new(3);
            for i in 0..64 {
                let value = if i % 2 == 0 { "4006381333931" } else { "012345678905" };
                black_box(stabilizer.observe(black_box(value)));
            }
        })
    });
}

criterion_group!(benches, bench_label_parse, bench_stabilizer);
criterion_main!(benches);
