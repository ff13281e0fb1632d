//! Benchmarks for container encoding and header decoding.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vecpack::container::header;
use vecpack::{ContainerWriter, IndexBuilder, VectorRecord};

fn synthetic_records(rows: usize, dim: usize) -> Vec<VectorRecord> {
    let mut state = 42u64;
    (0..rows)
        .map(|i| {
            let vector = (0..dim)
                .map(|_| {
                    state = state.wrapping_mul(1103515245).wrapping_add(12345);
                    (state >> 40) as f32 / (1u64 << 24) as f32
                })
                .collect();
            VectorRecord::new(format!("doc{}", i % 97), vector)
        })
        .collect()
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("container_write");

    for &rows in &[1_000usize, 10_000] {
        let output = IndexBuilder::build(synthetic_records(rows, 128).into_iter().map(Ok)).unwrap();
        group.throughput(Throughput::Bytes((rows * 128 * 4) as u64));

        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| {
                ContainerWriter::new()
                    .add_tensor("vectors", output.vectors_tensor())
                    .add_tensor("docids", output.docids_tensor())
                    .to_bytes()
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_header_decode(c: &mut Criterion) {
    let output = IndexBuilder::build(synthetic_records(256, 64).into_iter().map(Ok)).unwrap();
    let header = ContainerWriter::new()
        .with_metadata("source", "bench")
        .add_tensor("vectors", output.vectors_tensor())
        .add_tensor("docids", output.docids_tensor())
        .layout()
        .unwrap();
    let bytes = header::encode(&header).unwrap();

    c.bench_function("header_decode", |b| {
        b.iter(|| header::decode(black_box(&bytes)).unwrap());
    });
}

criterion_group!(benches, bench_write, bench_header_decode);
criterion_main!(benches);
