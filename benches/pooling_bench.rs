use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use splade::encoder::ndarray::{Array2, Array3};
use splade::encoder::{similarity, splade_max_pool, SimilarityFunction};

const VOCAB: usize = 30522;

/// Deterministic logits in roughly [-4, 4), a quarter of them positive.
fn logits(batch: usize, seq_len: usize) -> Array3<f32> {
    Array3::from_shape_fn((batch, seq_len, VOCAB), |(b, t, v)| {
        ((b * 31 + t * 17 + v * 7) % 64) as f32 / 8.0 - 4.0
    })
}

/// Every row padded after `len` real tokens.
fn mask(batch: usize, seq_len: usize, len: usize) -> Array2<i64> {
    Array2::from_shape_fn((batch, seq_len), |(_, t)| i64::from(t < len))
}

/// Host-side max-pool over raw logits at typical query/document lengths.
fn bench_max_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("splade_max_pool");
    group.sample_size(20);

    for &(batch, seq_len) in &[(1usize, 8usize), (3, 96)] {
        let logits = logits(batch, seq_len);
        let mask = mask(batch, seq_len, seq_len * 3 / 4);
        group.throughput(Throughput::Elements((batch * seq_len * VOCAB) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{batch}x{seq_len}")),
            &(logits, mask),
            |b, (logits, mask)| {
                b.iter(|| splade_max_pool(black_box(logits.view()), black_box(mask.view())));
            },
        );
    }

    group.finish();
}

/// Query x document scoring over full-width embeddings.
fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");
    let queries = Array2::from_shape_fn((1, VOCAB), |(_, v)| (v % 97) as f32 / 97.0);

    for &docs in &[3usize, 64] {
        let documents = Array2::from_shape_fn((docs, VOCAB), |(d, v)| ((d + v) % 89) as f32 / 89.0);
        for function in [SimilarityFunction::Dot, SimilarityFunction::Cosine] {
            group.bench_function(format!("{function:?}/{docs}"), |b| {
                b.iter(|| similarity(function, black_box(queries.view()), black_box(documents.view())));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_max_pool, bench_similarity);
criterion_main!(benches);
