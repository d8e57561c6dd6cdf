//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! SQL 数据源集成测试（SQLite 内存数据库）

#[path = "../common/mod.rs"]
mod common;

use cache_manager::backend::memory::MemoryStore;
use cache_manager::backend::{BackendId, Backends};
use cache_manager::config::{Config, SourceConfig, TableSourceConfig};
use cache_manager::error::CacheError;
use cache_manager::manager::{registry_from_config, CacheManager};
use cache_manager::source::sql::{self, SqlEntitySource};
use cache_manager::source::{ActorId, EntitySource};
use common::setup_logging;
use futures::TryStreamExt;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use secrecy::SecretString;
use std::sync::Arc;

/// 10 条记录，其中 id 为 3 和 8 的已失效；family 1 拥有 1、2、3、4
async fn setup_db() -> DatabaseConnection {
    setup_logging();
    let config = SourceConfig {
        database_url: SecretString::new("sqlite::memory:".to_string().into()),
        max_connections: 1,
        fetch_size: 3,
    };
    let db = sql::connect(&config).await.expect("connect sqlite");

    db.execute_unprepared(
        "CREATE TABLE insuree (
            id INTEGER PRIMARY KEY,
            family_id INTEGER NOT NULL,
            validity_to TEXT NULL
        )",
    )
    .await
    .unwrap();

    for id in 1..=10 {
        let family = if id <= 4 { 1 } else { 2 };
        let validity = if id == 3 || id == 8 {
            "'2024-01-01'"
        } else {
            "NULL"
        };
        db.execute_unprepared(&format!(
            "INSERT INTO insuree (id, family_id, validity_to) VALUES ({}, {}, {})",
            id, family, validity
        ))
        .await
        .unwrap();
    }
    db
}

fn table() -> TableSourceConfig {
    TableSourceConfig {
        table: "insuree".to_string(),
        id_column: "id".to_string(),
        live_condition: Some("validity_to IS NULL".to_string()),
        actor_condition: Some("family_id = {actor}".to_string()),
    }
}

#[tokio::test]
async fn test_count_only_includes_live_rows() {
    let db = setup_db().await;
    let source = SqlEntitySource::new(db, &table(), 3).unwrap();

    assert_eq!(source.count().await.unwrap(), 8);
}

#[tokio::test]
async fn test_list_live_pages_through_keyset() {
    let db = setup_db().await;
    let source = SqlEntitySource::new(db, &table(), 3).unwrap();

    let ids: Vec<String> = source
        .list_live()
        .map_ok(|record| record.id)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(ids, vec!["1", "2", "4", "5", "6", "7", "9", "10"]);
}

#[tokio::test]
async fn test_list_live_for_actor_applies_condition() {
    let db = setup_db().await;
    let source = SqlEntitySource::new(db, &table(), 2).unwrap();
    let actor = ActorId::from(1);

    let ids: Vec<String> = source
        .list_live_for_actor(&actor)
        .map_ok(|record| record.id)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(ids, vec!["1", "2", "4"]);
}

#[tokio::test]
async fn test_exact_multiple_of_fetch_size_terminates() {
    let db = setup_db().await;
    let mut config = table();
    config.live_condition = None;
    let source = SqlEntitySource::new(db, &config, 5).unwrap();

    let ids: Vec<String> = source
        .list_live()
        .map_ok(|record| record.id)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn test_invalid_identifiers_are_rejected() {
    let db = setup_db().await;
    let mut config = table();
    config.table = "insuree; DROP TABLE insuree".to_string();

    let result = SqlEntitySource::new(db, &config, 3);

    assert!(matches!(result, Err(CacheError::ConfigError(_))));
}

#[tokio::test]
async fn test_query_failure_is_source_read() {
    let db = setup_db().await;
    let mut config = table();
    config.table = "missing_table".to_string();
    let source = SqlEntitySource::new(db, &config, 3).unwrap();

    assert!(matches!(source.count().await, Err(CacheError::SourceRead(_))));
    let result: Result<Vec<_>, _> = source.list_live().try_collect().await;
    assert!(matches!(result, Err(CacheError::SourceRead(_))));
}

#[tokio::test]
async fn test_preheat_from_configured_table() {
    let db = setup_db().await;
    let config = Config::from_toml_str(
        r#"
        [global]
        preheat_batch_size = 2

        [backends.default]
        kind = "memory"

        [source]
        database_url = "sqlite::memory:"
        fetch_size = 4

        [[domains]]
        name = "insuree"
        scoped = true

        [domains.source]
        table = "insuree"
        live_condition = "validity_to IS NULL"
        actor_condition = "family_id = {actor}"
        "#,
    )
    .unwrap();

    let registry = registry_from_config(&config, Some(&db)).unwrap();
    let store = Arc::new(MemoryStore::new());
    let backends = Backends::new().with(BackendId::Default, store.clone());
    let manager = CacheManager::new(registry, backends, &config.global).unwrap();

    let report = manager.preheat("insuree", &ActorId::from(2)).await.unwrap();

    assert_eq!(report.written, 5);
    assert_eq!(report.batches, 3);
    assert_eq!(
        store.keys(),
        vec![
            "oi:1:Insuree:10",
            "oi:1:Insuree:5",
            "oi:1:Insuree:6",
            "oi:1:Insuree:7",
            "oi:1:Insuree:9"
        ]
    );

    let page = manager
        .list_info(Some("insuree"), &Default::default())
        .await
        .unwrap();
    assert_eq!(page.edges[0].node.cached_count, 5);
    assert_eq!(page.edges[0].node.source_count, 8);
}
