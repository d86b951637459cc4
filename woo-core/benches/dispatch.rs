//! Benchmark: write and dispatch throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use woo_core::reactive::{Runtime, ScopeInit};

/// One scope, `n` bindings each reading its own field, every field written
/// once per tick.
fn benchmark_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_then_flush");

    for n in [1usize, 16, 256] {
        let runtime = Runtime::new();
        let scope = runtime.create_scope("cid-1", ScopeInit::empty()).unwrap();
        for i in 0..n {
            let field = format!("f{i}");
            let key = field.clone();
            scope.root().set(&field, 0);
            scope
                .trace_call(&key, move |s| s.root().get(&field), |v| {
                    black_box(v);
                })
                .unwrap();
        }

        let mut tick = 0;
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                tick += 1;
                for i in 0..n {
                    scope.root().set(&format!("f{i}"), tick);
                }
                black_box(runtime.flush())
            });
        });
    }

    group.finish();
}

/// Many writes to one field coalesce into a single recomputation.
fn benchmark_coalescing(c: &mut Criterion) {
    let runtime = Runtime::new();
    let scope = runtime.create_scope("cid-1", json!({"a": 0})).unwrap();
    scope
        .trace_call("k", |s| s.root().get("a"), |v| {
            black_box(v);
        })
        .unwrap();

    let mut tick = 0;
    c.bench_function("coalesce_100_writes", |b| {
        b.iter(|| {
            for _ in 0..100 {
                tick += 1;
                scope.root().set("a", tick);
            }
            black_box(runtime.flush())
        });
    });
}

/// Replacing a sub-object invalidates the whole old subtree.
fn benchmark_subtree_replacement(c: &mut Criterion) {
    let runtime = Runtime::new();
    let scope = runtime
        .create_scope("cid-1", json!({"obj": {"d": {"e": {"e1": 0}}}}))
        .unwrap();
    scope
        .trace_call(
            "leaf",
            |s| s.root().get("obj").get("d").get("e").get("e1"),
            |v| {
                black_box(v);
            },
        )
        .unwrap();

    let mut tick = 0;
    c.bench_function("replace_subtree", |b| {
        b.iter(|| {
            tick += 1;
            scope
                .root()
                .set("obj", runtime.wrap(json!({"d": {"e": {"e1": tick}}})));
            black_box(runtime.flush())
        });
    });
}

criterion_group!(
    benches,
    benchmark_fan_out,
    benchmark_coalescing,
    benchmark_subtree_replacement
);
criterion_main!(benches);
