use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ndarray::{Array2, Axis};
use picsearch::encoder::l2_normalize_rows;
use picsearch::faiss::FlatIndex;
use rand::prelude::*;

fn random_vectors(rng: &mut impl Rng, n: usize, d: usize) -> Array2<f32> {
    let mut m = Array2::from_shape_fn((n, d), |_| rng.random_range(-1f32..1.));
    l2_normalize_rows(&mut m);
    m
}

fn bench_flat_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("FlatSearch");
    let mut rng = rand::rng();

    for (d, n) in [(512, 10_000), (768, 10_000), (512, 100_000)] {
        let mut index = FlatIndex::new(d).unwrap();
        index.add(random_vectors(&mut rng, n, d).view()).unwrap();
        let query = random_vectors(&mut rng, 1, d);

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new(format!("d{}", d), n), &query, |b, query| {
            b.iter(|| index.search(black_box(query.view()), 5).unwrap());
        });
    }
    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let mut rng = rand::rng();
    let batch = random_vectors(&mut rng, 32, 768);

    c.bench_function("l2_normalize_rows_32x768", |b| {
        b.iter(|| {
            let mut batch = batch.clone();
            l2_normalize_rows(black_box(&mut batch));
            batch.sum_axis(Axis(1))
        });
    });
}

criterion_group!(benches, bench_flat_search, bench_normalize);
criterion_main!(benches);
