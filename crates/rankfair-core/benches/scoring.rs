//! Per-user scoring throughput.
//!
//! Run with: `cargo bench -p rankfair-core --bench scoring`
//!
//! Measures how long each metric takes to score a synthetic population of
//! users against a shared context, and how long the context itself takes to
//! build (popularity ranking plus the first strata partition).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rankfair_core::config::EvalConfig;
use rankfair_core::evaluation::{
    EvaluationContext, Evaluator, Recommendations, Relevance, TrainingInteractions,
};
use rankfair_core::types::{ItemId, UserId};

// =============================================================================
// Configuration
// =============================================================================

/// Catalogue size.
const NUM_ITEMS: u64 = 5_000;

/// Training items per user.
const TRAIN_PER_USER: u64 = 40;

/// Relevant test items per user.
const TEST_PER_USER: u64 = 10;

/// Length of each recommendation list.
const LIST_LEN: u64 = 50;

/// Population sizes to benchmark.
const USER_COUNTS: &[u64] = &[1_000, 10_000];

// =============================================================================
// Synthetic Data
// =============================================================================

/// Deterministic hash used to scatter items across users.
fn mix(a: u64, b: u64) -> u64 {
    let mut z = a.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ b;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z ^ (z >> 27)
}

/// Skewed item draw: low ids are much more popular.
fn skewed_item(seed: u64) -> ItemId {
    let uniform = (seed % 10_000) as f64 / 10_000.0;
    ItemId::from_u64((uniform * uniform * NUM_ITEMS as f64) as u64)
}

fn build_data(num_users: u64) -> (Relevance, TrainingInteractions, Recommendations) {
    let train = TrainingInteractions::from_pairs((0..num_users).flat_map(|u| {
        (0..TRAIN_PER_USER).map(move |j| (UserId::from_u64(u), skewed_item(mix(u, j))))
    }));

    let relevance = Relevance::from_triples((0..num_users).flat_map(|u| {
        (0..TEST_PER_USER).map(move |j| {
            let gain = 1.0 + (mix(u, j + 1_000) % 5) as f64;
            (UserId::from_u64(u), skewed_item(mix(u, j + 1_000)), gain)
        })
    }))
    .expect("synthetic gains are positive");

    let mut recs = Recommendations::default();
    for u in 0..num_users {
        for rank in 0..LIST_LEN {
            let item = ItemId::from_u64(mix(u, rank + 2_000) % NUM_ITEMS);
            recs.push(UserId::from_u64(u), item, 1.0 - rank as f32 / LIST_LEN as f32);
        }
    }

    (relevance, train, recs)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_context_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("context_build");

    for &users in USER_COUNTS {
        let (relevance, train, _) = build_data(users);
        group.throughput(Throughput::Elements(users));
        group.bench_with_input(BenchmarkId::from_parameter(users), &users, |b, _| {
            b.iter(|| {
                let ctx = EvaluationContext::new(
                    EvalConfig::default(),
                    relevance.clone(),
                    train.clone(),
                )
                .expect("default config is valid");
                black_box(ctx.strata(None).expect("default ratio is valid"))
            })
        });
    }
    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let evaluator = Evaluator::default();
    let metric_names = evaluator.registry().names();

    for &users in USER_COUNTS {
        let (relevance, train, recs) = build_data(users);
        let ctx = EvaluationContext::new(EvalConfig::default(), relevance, train)
            .expect("default config is valid");

        let mut group = c.benchmark_group(format!("metrics_{}_users", users));
        group.throughput(Throughput::Elements(users));
        for &name in &metric_names {
            group.bench_function(name, |b| {
                b.iter(|| black_box(evaluator.evaluate(&[name], &recs, &ctx)))
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_context_build, bench_metrics);
criterion_main!(benches);
