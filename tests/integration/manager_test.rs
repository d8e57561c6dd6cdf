//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 缓存管理器集成测试：域名解析、批量失效与配置装配

#[path = "../common/mod.rs"]
mod common;

use cache_manager::backend::BackendId;
use cache_manager::config::{Config, GlobalConfig};
use cache_manager::error::CacheError;
use cache_manager::introspection::Pagination;
use cache_manager::manager::{registry_from_config, CacheManager};
use cache_manager::source::ActorId;
use cache_manager::sync::InvalidationMode;
use common::{fixture, setup_logging, Fixture, StaticSource};
use std::sync::Arc;

fn manager(fx: &Fixture) -> CacheManager {
    CacheManager::new(
        (*fx.registry).clone(),
        (*fx.backends).clone(),
        &GlobalConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_resolve_nonexistent_makes_no_calls() {
    setup_logging();
    let fx = fixture(StaticSource::with_ids(&["1"]));
    let manager = manager(&fx);

    let result = manager.resolve_domain("nonexistent");

    assert!(matches!(result, Err(CacheError::UnknownDomain(name)) if name == "nonexistent"));
    assert_eq!(fx.total_calls(), 0);
}

#[tokio::test]
async fn test_domain_names_are_case_insensitive() {
    let fx = fixture(StaticSource::with_ids(&["1", "2"]));
    let manager = manager(&fx);

    assert_eq!(manager.resolve_domain("  ALPHA ").unwrap().name, "alpha");

    let report = manager.preheat("Alpha", &ActorId::new("1")).await.unwrap();
    assert_eq!(report.written, 2);

    let page = manager
        .list_info(Some("ALPHA"), &Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.edges[0].node.cached_count, 2);
}

#[tokio::test]
async fn test_invalidate_set_mixes_prefix_and_namespace() {
    let fx = fixture(StaticSource::default());
    fx.default_store.put("oi:1:Alpha:1").await;
    fx.default_store.put("oi:1:Gamma:1").await;
    fx.beta_store.put("beta_1").await;
    let manager = manager(&fx);

    let reports = manager.invalidate(["alpha", "BETA", "alpha "]).await.unwrap();

    assert_eq!(reports.len(), 2);
    let alpha = reports.iter().find(|r| r.domain == "alpha").unwrap();
    let beta = reports.iter().find(|r| r.domain == "beta").unwrap();
    assert_eq!(alpha.mode, InvalidationMode::PrefixScan);
    assert_eq!(beta.mode, InvalidationMode::NamespaceClear);
    assert_eq!(fx.default_store.keys(), vec!["oi:1:Gamma:1"]);
    assert!(fx.beta_store.keys().is_empty());
}

#[tokio::test]
async fn test_invalidate_set_reports_failures_without_stopping() {
    let fx = fixture(StaticSource::default());
    fx.default_store.put("oi:1:Alpha:1").await;
    let manager = manager(&fx);

    let failures = manager
        .invalidate(vec!["alpha".to_string(), "nonexistent".to_string()])
        .await
        .unwrap_err();

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "nonexistent");
    assert!(matches!(failures[0].1, CacheError::UnknownDomain(_)));
    assert!(fx.default_store.keys().is_empty());
}

#[tokio::test]
async fn test_concurrent_preheat_and_invalidate_are_serialized() {
    let fx = fixture(StaticSource::with_range(0..200));
    let manager = Arc::new(manager(&fx));
    let actor = ActorId::new("1");

    let (preheat, invalidate) = tokio::join!(
        manager.preheat("alpha", &actor),
        manager.invalidate_domain("alpha")
    );
    preheat.unwrap();
    let deleted = invalidate.unwrap().deleted.unwrap();

    // 两个操作不会交错，缓存状态只能是其中一种顺序的结果
    let remaining = fx.default_store.keys().len();
    assert!(
        (deleted == 0 && remaining == 200) || (deleted == 200 && remaining == 0),
        "deleted={}, remaining={}",
        deleted,
        remaining
    );
}

#[tokio::test]
async fn test_missing_backend_is_rejected_at_construction() {
    let fx = fixture(StaticSource::default());
    let backends = cache_manager::backend::Backends::new()
        .with(BackendId::Default, fx.default_store.clone());

    let result = CacheManager::new((*fx.registry).clone(), backends, &GlobalConfig::default());

    assert!(matches!(result, Err(CacheError::ConfigError(_))));
}

#[tokio::test]
async fn test_connect_from_memory_config() {
    let config = Config::from_toml_str(
        r#"
        [global]
        use_builtin_catalog = true

        [backends.default]
        kind = "memory"

        [backends.location]
        kind = "memory"

        [[domains]]
        name = "location"
        backend = "location"
        composite = true

        [[domains]]
        name = "widget"
        entity_type = "Widget"
        "#,
    )
    .unwrap();

    let manager = CacheManager::connect(config).await.unwrap();

    let location = manager.resolve_domain("location").unwrap();
    assert_eq!(location.backend, BackendId::Dedicated("location".to_string()));
    assert_eq!(location.key_prefix, "location_");
    assert!(location.composite);
    assert_eq!(manager.resolve_domain("widget").unwrap().key_prefix, "oi:1:Widget:");
    assert_eq!(
        manager.resolve_domain("insuree").unwrap().key_prefix,
        "oi:1:Insuree:"
    );

    let result = manager.preheat("widget", &ActorId::new("1")).await;
    assert!(matches!(result, Err(CacheError::UnsupportedDomain(_))));
}

#[tokio::test]
async fn test_table_source_requires_connection() {
    let config = Config::from_toml_str(
        r#"
        [backends.default]
        kind = "memory"

        [source]
        database_url = "sqlite::memory:"

        [[domains]]
        name = "widget"
        source = { table = "widgets" }
        "#,
    )
    .unwrap();

    let result = registry_from_config(&config, None);

    assert!(matches!(result, Err(CacheError::ConfigError(_))));
}

#[tokio::test]
async fn test_overlapping_prefixes_fail_at_connect() {
    let config = Config::from_toml_str(
        r#"
        [backends.default]
        kind = "memory"

        [backends.shared]
        kind = "memory"

        [[domains]]
        name = "beta"
        backend = "shared"

        [[domains]]
        name = "beta_x"
        backend = "shared"
        "#,
    )
    .unwrap();

    let result = CacheManager::connect(config).await;

    assert!(matches!(
        result,
        Err(CacheError::ConfigError(msg)) if msg.contains("beta_x")
    ));
}

#[tokio::test]
async fn test_same_entity_type_twice_fails_at_connect() {
    let config = Config::from_toml_str(
        r#"
        [backends.default]
        kind = "memory"

        [[domains]]
        name = "claim"
        entity_type = "Claim"

        [[domains]]
        name = "claim_copy"
        entity_type = "Claim"
        "#,
    )
    .unwrap();

    let result = CacheManager::connect(config).await;

    assert!(matches!(result, Err(CacheError::ConfigError(_))));
}
