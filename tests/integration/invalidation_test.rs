//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 缓存失效集成测试：前缀删除、命名空间清空与异常键处理

#[path = "../common/mod.rs"]
mod common;

use cache_manager::error::CacheError;
use cache_manager::sync::{InvalidationEngine, InvalidationMode};
use common::{fixture, setup_logging, Fixture, StaticSource};
use rand::Rng;
use std::sync::atomic::Ordering;

fn engine(fx: &Fixture) -> InvalidationEngine {
    InvalidationEngine::new(fx.registry.clone(), fx.backends.clone(), 1000, 500)
}

#[tokio::test]
async fn test_invalidate_domain_removes_only_its_prefix() {
    setup_logging();
    let fx = fixture(StaticSource::default());
    for key in [
        "oi:1:Alpha:1",
        "oi:1:Alpha:2",
        "oi:1:Alpha:3",
        "oi:1:Alphabet:1",
        "oi:1:Gamma:1",
    ] {
        fx.default_store.put(key).await;
    }

    let report = engine(&fx).invalidate_domain("alpha").await.unwrap();

    assert_eq!(report.domain, "alpha");
    assert_eq!(report.mode, InvalidationMode::PrefixScan);
    assert_eq!(report.deleted, Some(3));
    assert_eq!(fx.default_store.keys(), vec!["oi:1:Alphabet:1", "oi:1:Gamma:1"]);
}

#[tokio::test]
async fn test_invalidate_empty_domain_is_noop() {
    let fx = fixture(StaticSource::default());
    fx.default_store.put("oi:1:Gamma:9").await;

    let report = engine(&fx).invalidate_domain("alpha").await.unwrap();

    assert_eq!(report.deleted, Some(0));
    assert_eq!(fx.default_store.deletes.load(Ordering::SeqCst), 0);
    assert_eq!(fx.default_store.keys(), vec!["oi:1:Gamma:9"]);
}

#[tokio::test]
async fn test_clear_namespace_leaves_other_namespaces_untouched() {
    let fx = fixture(StaticSource::default());
    fx.default_store.put("oi:1:Alpha:1").await;
    fx.default_store.put("oi:1:Alpha:2").await;
    fx.beta_store.put("beta_1").await;
    fx.beta_store.put("beta_2").await;
    fx.beta_store.put("unrelated_key").await;

    let report = engine(&fx).clear_namespace("beta").await.unwrap();

    assert_eq!(report.mode, InvalidationMode::NamespaceClear);
    assert_eq!(report.deleted, None);
    assert!(fx.beta_store.keys().is_empty());
    assert_eq!(fx.default_store.keys(), vec!["oi:1:Alpha:1", "oi:1:Alpha:2"]);
}

#[tokio::test]
async fn test_clear_namespace_rejects_simple_domain() {
    let fx = fixture(StaticSource::default());
    fx.default_store.put("oi:1:Alpha:1").await;

    let result = engine(&fx).clear_namespace("alpha").await;

    assert!(matches!(result, Err(CacheError::NotAComposite(name)) if name == "alpha"));
    assert_eq!(fx.default_store.clears.load(Ordering::SeqCst), 0);
    assert_eq!(fx.default_store.keys().len(), 1);
}

#[tokio::test]
async fn test_invalidate_dispatches_on_composite_flag() {
    let fx = fixture(StaticSource::default());
    fx.default_store.put("oi:1:Alpha:1").await;
    fx.beta_store.put("beta_1").await;

    let engine = engine(&fx);
    let alpha = engine.invalidate("alpha").await.unwrap();
    let beta = engine.invalidate("beta").await.unwrap();

    assert_eq!(alpha.mode, InvalidationMode::PrefixScan);
    assert_eq!(beta.mode, InvalidationMode::NamespaceClear);
    assert_eq!(fx.beta_store.clears.load(Ordering::SeqCst), 1);
    assert_eq!(fx.default_store.clears.load(Ordering::SeqCst), 0);
    assert!(fx.default_store.keys().is_empty());
    assert!(fx.beta_store.keys().is_empty());
}

#[tokio::test]
async fn test_malformed_key_is_deleted_and_reported() {
    let fx = fixture(StaticSource::default());
    fx.default_store.put("oi:1:Alpha:1").await;
    fx.default_store.put("oi:1:Alpha:2").await;
    fx.default_store.put("oi:1:Alpha:orphan:").await;

    let result = engine(&fx).invalidate_domain("alpha").await;

    match result {
        Err(CacheError::MalformedKey { key, .. }) => assert_eq!(key, "oi:1:Alpha:orphan:"),
        other => panic!("expected MalformedKey, got {:?}", other),
    }
    assert!(fx.default_store.keys().is_empty());
    assert_eq!(fx.default_store.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_domain_touches_nothing() {
    let fx = fixture(StaticSource::with_ids(&["1"]));

    let result = engine(&fx).invalidate("nonexistent").await;

    assert!(matches!(result, Err(CacheError::UnknownDomain(_))));
    assert_eq!(fx.total_calls(), 0);
}

#[tokio::test]
async fn test_deletes_in_bounded_batches() {
    let fx = fixture(StaticSource::default());
    for id in 1..=7 {
        fx.default_store.put(&format!("oi:1:Alpha:{}", id)).await;
    }
    let engine = InvalidationEngine::new(fx.registry.clone(), fx.backends.clone(), 3, 2);

    let report = engine.invalidate_domain("alpha").await.unwrap();

    assert_eq!(report.deleted, Some(7));
    assert_eq!(fx.default_store.deletes.load(Ordering::SeqCst), 4);
    assert!(fx.default_store.keys().is_empty());
}

#[tokio::test]
async fn test_random_populations_are_fully_invalidated() {
    let mut rng = rand::thread_rng();

    for _ in 0..10 {
        let fx = fixture(StaticSource::default());
        let alpha_count = rng.gen_range(0..300);
        let gamma_count = rng.gen_range(0..50);
        for _ in 0..alpha_count {
            let id: u32 = rng.gen();
            fx.default_store.put(&format!("oi:1:Alpha:{}", id)).await;
        }
        for i in 0..gamma_count {
            fx.default_store.put(&format!("oi:1:Gamma:{}", i)).await;
        }
        let batch = rng.gen_range(1..64);
        let engine = InvalidationEngine::new(fx.registry.clone(), fx.backends.clone(), 100, batch);

        engine.invalidate_domain("alpha").await.unwrap();

        let remaining = fx.default_store.keys();
        assert!(remaining.iter().all(|k| !k.starts_with("oi:1:Alpha:")));
        assert_eq!(remaining.len(), gamma_count);
    }
}
