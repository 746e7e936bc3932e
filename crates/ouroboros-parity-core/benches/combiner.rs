//! Benchmarks the Combiner's join/diff path over a range of row counts.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ouroboros_parity_core::combiner;
use ouroboros_parity_core::config::{ValidationStatus, ValidationType};
use ouroboros_parity_core::engine::{Row, TabularResult};
use ouroboros_parity_core::expr::{AggregateKind, Scalar};
use ouroboros_parity_core::metadata::{MetricDescriptor, RunMetadata};
use ouroboros_parity_core::registry::MetricRegistry;
use std::collections::HashSet;

fn build_result(rows: usize, offset: i64) -> TabularResult {
    let data = (0..rows)
        .map(|i| {
            let mut row = Row::new();
            row.insert("id".to_string(), Scalar::Int(i as i64));
            row.insert("cnt".to_string(), Scalar::Int(i as i64 + offset));
            row
        })
        .collect();
    TabularResult::new(vec!["id".to_string(), "cnt".to_string()], data)
}

fn bench_combine(c: &mut Criterion) {
    let registry = MetricRegistry::new();
    let run_meta = RunMetadata::new("bench-run".to_string(), Default::default(), ValidationType::Row);
    let descriptors = vec![MetricDescriptor {
        alias: "cnt".to_string(),
        aggregate_kind: AggregateKind::Count,
        source_column: Some("cnt".to_string()),
        target_column: Some("cnt".to_string()),
    }];

    let mut group = c.benchmark_group("combiner_combine");
    for size in [10usize, 1_000, 50_000] {
        let source = build_result(size, 0);
        let target = build_result(size, 1);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let report = combiner::combine(
                    &run_meta,
                    &registry,
                    &descriptors,
                    Some(("public".to_string(), "accounts".to_string())),
                    Some(("public".to_string(), "accounts".to_string())),
                    &["id".to_string()],
                    black_box(&source),
                    black_box(&target),
                    false,
                    0.0,
                    &HashSet::<ValidationStatus>::new(),
                    Utc::now(),
                    Utc::now(),
                );
                black_box(report);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_combine);
criterion_main!(benches);
