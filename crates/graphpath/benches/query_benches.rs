use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use graphpath::parser::parse_path;
use graphpath::{CacheConfig, ContextBuilder, ExpressionCache, Value, compile};

fn sample_queries() -> Vec<&'static str> {
    vec![
        "1 + 2 * 3",
        "string-length('Lorem ipsum dolor sit amet, consectetur adipiscing elit.')",
        "orders[total > 50]/lines[position() < 3]/sku",
        "count(//sku[starts-with(., 'A')])",
        "sum(orders/total) div count(orders)",
    ]
}

fn sample_graph() -> Value {
    let orders: Vec<serde_json::Value> = (1..=50)
        .map(|id| {
            serde_json::json!({
                "id": id,
                "total": id * 3,
                "lines": [
                    { "sku": format!("A-{id}"), "qty": 1 },
                    { "sku": format!("B-{id}"), "qty": 2 },
                    { "sku": format!("C-{id}"), "qty": 3 }
                ]
            })
        })
        .collect();
    Value::from_json(&serde_json::json!({ "name": "shop", "orders": orders }))
}

fn benchmark_parser(c: &mut Criterion) {
    let queries = sample_queries();
    c.bench_function("parser/parse_path", |b| {
        b.iter(|| {
            for q in &queries {
                let ast = parse_path(black_box(q)).expect("parse failure");
                black_box(ast);
            }
        })
    });
}

fn benchmark_cache(c: &mut Criterion) {
    let queries = sample_queries();
    let cache = ExpressionCache::with_config(CacheConfig::default());
    let mut group = c.benchmark_group("cache");
    group.bench_function("compile_uncached", |b| {
        b.iter(|| {
            for q in &queries {
                black_box(compile(black_box(q)).expect("compile failure"));
            }
        })
    });
    group.bench_function("compile_cached", |b| {
        b.iter(|| {
            for q in &queries {
                black_box(cache.compile(black_box(q)).expect("compile failure"));
            }
        })
    });
    group.finish();
}

fn benchmark_executor(c: &mut Criterion) {
    let context = ContextBuilder::new(sample_graph()).lenient(true).build();
    let mut group = c.benchmark_group("executor/read");
    for query in sample_queries() {
        group.bench_with_input(BenchmarkId::from_parameter(query), query, |b, q| {
            b.iter(|| black_box(context.read(black_box(q)).expect("read failure")));
        });
    }
    group.bench_function("iterate_pointers", |b| {
        b.iter(|| black_box(context.iterate_pointers("//sku").expect("iterate failure").len()));
    });
    group.finish();
}

criterion_group!(benches, benchmark_parser, benchmark_cache, benchmark_executor);
criterion_main!(benches);
