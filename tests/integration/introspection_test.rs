//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 缓存内省集成测试：计数、分页与异常键

#[path = "../common/mod.rs"]
mod common;

use cache_manager::error::CacheError;
use cache_manager::introspection::{IntrospectionService, Pagination};
use cache_manager::source::ActorId;
use cache_manager::sync::PreheatEngine;
use common::{fixture, setup_logging, Fixture, StaticSource};
use std::sync::atomic::Ordering;

fn service(fx: &Fixture) -> IntrospectionService {
    IntrospectionService::new(fx.registry.clone(), fx.backends.clone(), 2)
}

#[tokio::test]
async fn test_cached_count_after_preheat() {
    setup_logging();
    let fx = fixture(StaticSource::with_ids(&["1", "2", "3"]));
    PreheatEngine::new(fx.registry.clone(), fx.backends.clone(), 2000)
        .preheat("alpha", &ActorId::new("1"))
        .await
        .unwrap();

    let page = service(&fx)
        .list_cache_info(Some("alpha"), &Pagination::default())
        .await
        .unwrap();

    assert_eq!(page.total_count, 1);
    assert_eq!(page.edges.len(), 1);
    let node = &page.edges[0].node;
    assert_eq!(node.domain, "alpha");
    assert_eq!(node.backend, "default");
    assert_eq!(node.cached_count, 3);
    assert_eq!(node.source_count, 3);
    assert!(!page.page_info.has_next_page);
}

#[tokio::test]
async fn test_cached_and_source_counts_are_independent() {
    let fx = fixture(StaticSource::with_ids(&["1", "2", "3", "4"]));
    fx.default_store.put("oi:1:Alpha:1").await;

    let service = service(&fx);
    assert_eq!(service.cached_count("alpha").await.unwrap(), 1);

    let page = service
        .list_cache_info(Some("alpha"), &Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.edges[0].node.source_count, 4);
}

#[tokio::test]
async fn test_domain_without_source_reports_zero() {
    let fx = fixture(StaticSource::default());
    fx.default_store.put("oi:1:Gamma:1").await;

    let page = service(&fx)
        .list_cache_info(Some("gamma"), &Pagination::default())
        .await
        .unwrap();

    assert_eq!(page.edges[0].node.cached_count, 1);
    assert_eq!(page.edges[0].node.source_count, 0);
}

#[tokio::test]
async fn test_first_limits_page_and_sets_has_next() {
    let fx = fixture(StaticSource::default());

    let page = service(&fx)
        .list_cache_info(None, &Pagination::first(2))
        .await
        .unwrap();

    assert_eq!(page.total_count, 3);
    let names: Vec<_> = page.edges.iter().map(|e| e.cursor.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert!(page.page_info.has_next_page);
    assert!(!page.page_info.has_previous_page);
    assert_eq!(page.page_info.start_cursor.as_deref(), Some("alpha"));
    assert_eq!(page.page_info.end_cursor.as_deref(), Some("beta"));

    let next = service(&fx)
        .list_cache_info(None, &Pagination::first(2).after("beta"))
        .await
        .unwrap();
    let names: Vec<_> = next.edges.iter().map(|e| e.cursor.as_str()).collect();
    assert_eq!(names, vec!["gamma"]);
    assert!(!next.page_info.has_next_page);
    assert!(next.page_info.has_previous_page);
}

#[tokio::test]
async fn test_only_domains_in_window_are_counted() {
    let fx = fixture(StaticSource::with_ids(&["1"]));

    service(&fx)
        .list_cache_info(None, &Pagination::first(1).after("alpha"))
        .await
        .unwrap();

    assert_eq!(fx.alpha_source.count_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fx.beta_source.count_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.beta_store.scans.load(Ordering::SeqCst), 1);
    assert_eq!(fx.default_store.scans.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_cursor_falls_back_to_start() {
    let fx = fixture(StaticSource::default());

    let page = service(&fx)
        .list_cache_info(None, &Pagination::first(1).after("no_such_domain"))
        .await
        .unwrap();

    assert_eq!(page.edges[0].cursor, "alpha");
    assert!(!page.page_info.has_previous_page);
}

#[tokio::test]
async fn test_unknown_filter_domain_fails() {
    let fx = fixture(StaticSource::default());

    let result = service(&fx)
        .list_cache_info(Some("nonexistent"), &Pagination::default())
        .await;

    assert!(matches!(result, Err(CacheError::UnknownDomain(_))));
    assert_eq!(fx.total_calls(), 0);
}

#[tokio::test]
async fn test_malformed_keys_are_skipped() {
    let fx = fixture(StaticSource::default());
    fx.default_store.put("oi:1:Alpha:1").await;
    fx.default_store.put("oi:1:Alpha:2").await;
    fx.default_store.put("oi:1:Alpha:").await;
    fx.default_store.put("oi:1:Alpha:graph:").await;

    let service = service(&fx);
    assert_eq!(service.cached_count("alpha").await.unwrap(), 2);

    let entries = service.list_entries("alpha", None).await.unwrap();
    let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[tokio::test]
async fn test_list_entries_respects_limit() {
    let fx = fixture(StaticSource::default());
    for id in 0..10 {
        fx.beta_store.put(&format!("beta_{}", id)).await;
    }

    let entries = service(&fx).list_entries("beta", Some(4)).await.unwrap();

    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].key, "beta_0");
    assert_eq!(entries[0].id, "0");
}
