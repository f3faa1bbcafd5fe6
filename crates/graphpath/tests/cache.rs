use std::sync::Arc;

use graphpath::{CacheConfig, ContextBuilder, ExpressionCache, Value};
use rstest::{fixture, rstest};

#[fixture]
fn weak_only() -> ExpressionCache {
    ExpressionCache::with_config(CacheConfig { capacity: 0, cleanup_threshold: 500 })
}

#[rstest]
fn same_text_compiles_once_while_held(weak_only: ExpressionCache) {
    let first = weak_only.compile("orders[total > 10]/id").unwrap();
    let second = weak_only.compile("orders[total > 10]/id").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(weak_only.misses(), 1);
}

#[rstest]
fn dropped_expressions_are_recompiled(weak_only: ExpressionCache) {
    drop(weak_only.compile("a/b").unwrap());
    assert_eq!(weak_only.live_len(), 0);
    let again = weak_only.compile("a/b").unwrap();
    assert_eq!(weak_only.misses(), 2);
    assert_eq!(again.source(), "a/b");
}

#[rstest]
fn dead_keys_are_swept_every_threshold_misses(weak_only: ExpressionCache) {
    let live = weak_only.compile("live").unwrap();
    for i in 0..498 {
        drop(weak_only.compile(&format!("dropped{i}")).unwrap());
    }
    assert_eq!(weak_only.len(), 499);
    assert_eq!(weak_only.misses(), 499);

    let last = weak_only.compile("last").unwrap();
    assert_eq!(weak_only.misses(), 0);
    assert_eq!(weak_only.len(), 2);
    assert_eq!(weak_only.live_len(), 2);
    drop((live, last));
}

#[rstest]
fn retained_capacity_keeps_recent_expressions_alive() {
    let cache = ExpressionCache::with_config(CacheConfig { capacity: 2, cleanup_threshold: 500 });
    drop(cache.compile("one").unwrap());
    drop(cache.compile("two").unwrap());
    assert_eq!(cache.live_len(), 2);
    drop(cache.compile("three").unwrap());
    assert_eq!(cache.live_len(), 2);
}

#[rstest]
fn concurrent_compiles_agree_on_the_result() {
    let cache = ExpressionCache::new();
    let queries = ["a/b", "count(items)", "//name", "a/b"];
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for query in queries {
                    let compiled = cache.compile(query).unwrap();
                    assert_eq!(compiled.source(), query);
                }
            });
        }
    });
    assert_eq!(cache.len(), 3);
}

#[rstest]
fn contexts_share_an_injected_cache() {
    let cache = Arc::new(ExpressionCache::new());
    let context = ContextBuilder::new(Value::from_json(&serde_json::json!({ "a": 1 })))
        .with_cache(Arc::clone(&cache))
        .build();
    assert_eq!(context.read("a").unwrap(), Value::from(1));
    let child = context.child(Value::empty_map());
    assert!(Arc::ptr_eq(child.cache(), &cache));
    assert_eq!(cache.len(), 1);
}
