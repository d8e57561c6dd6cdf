//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 基于 Sea-ORM 的数据表访问器
//!
//! 使用键集分页（`WHERE id > ? ORDER BY id LIMIT n`）流式读取有效实体的 id，
//! 内存占用只与 `fetch_size` 有关。

use crate::config::{identifier_pattern, SourceConfig, TableSourceConfig};
use crate::error::{CacheError, Result};
use crate::source::{ActorId, EntityRecord, EntitySource};
use crate::utils::redaction::RedactedUrl;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, QueryResult,
    Statement, Value,
};
use secrecy::ExposeSecret;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument};

const ACTOR_PLACEHOLDER: &str = "{actor}";

/// 连接数据源数据库
#[instrument(skip(config), level = "info")]
pub async fn connect(config: &SourceConfig) -> Result<DatabaseConnection> {
    let url = config.database_url.expose_secret();
    info!("Connecting to source database {}", RedactedUrl(url));
    let mut opt = ConnectOptions::new(url.to_string());
    opt.max_connections(config.max_connections)
        .min_connections(0)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Ok(Database::connect(opt).await?)
}

/// 键集分页游标
#[derive(Debug, Clone, PartialEq)]
enum KeysetCursor {
    Int(i64),
    Text(String),
}

impl KeysetCursor {
    fn decode(row: &QueryResult) -> Result<Self> {
        if let Ok(id) = row.try_get::<i64>("", "entity_id") {
            return Ok(KeysetCursor::Int(id));
        }
        if let Ok(id) = row.try_get::<i32>("", "entity_id") {
            return Ok(KeysetCursor::Int(i64::from(id)));
        }
        row.try_get::<String>("", "entity_id")
            .map(KeysetCursor::Text)
            .map_err(|e| CacheError::SourceRead(format!("cannot decode entity id: {}", e)))
    }

    fn to_value(&self) -> Value {
        match self {
            KeysetCursor::Int(id) => Value::from(*id),
            KeysetCursor::Text(id) => Value::from(id.clone()),
        }
    }
}

impl fmt::Display for KeysetCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeysetCursor::Int(id) => write!(f, "{}", id),
            KeysetCursor::Text(id) => f.write_str(id),
        }
    }
}

/// 单表数据源访问器
#[derive(Clone)]
pub struct SqlEntitySource {
    db: DatabaseConnection,
    table: String,
    id_column: String,
    live_condition: Option<String>,
    actor_condition: Option<String>,
    fetch_size: usize,
}

impl fmt::Debug for SqlEntitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlEntitySource")
            .field("table", &self.table)
            .field("id_column", &self.id_column)
            .field("live_condition", &self.live_condition)
            .field("actor_condition", &self.actor_condition)
            .field("fetch_size", &self.fetch_size)
            .finish()
    }
}

impl SqlEntitySource {
    /// 根据表配置创建访问器
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    /// * `config` - 表、id 列以及过滤条件
    /// * `fetch_size` - 每次查询读取的行数
    pub fn new(
        db: DatabaseConnection,
        config: &TableSourceConfig,
        fetch_size: usize,
    ) -> Result<Self> {
        for ident in [&config.table, &config.id_column] {
            if !identifier_pattern().is_match(ident) {
                return Err(CacheError::ConfigError(format!(
                    "invalid SQL identifier '{}'",
                    ident
                )));
            }
        }
        if fetch_size == 0 {
            return Err(CacheError::ConfigError(
                "fetch_size cannot be zero".to_string(),
            ));
        }
        Ok(Self {
            db,
            table: config.table.clone(),
            id_column: config.id_column.clone(),
            live_condition: config.live_condition.clone(),
            actor_condition: config.actor_condition.clone(),
            fetch_size,
        })
    }

    fn backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    fn page_statement(
        &self,
        actor: Option<&ActorId>,
        after: Option<&KeysetCursor>,
    ) -> Result<Statement> {
        let backend = self.backend();
        let mut binder = Binder::new(backend);
        let mut conditions = Vec::new();

        if let Some(live) = &self.live_condition {
            conditions.push(format!("({})", live));
        }
        if let Some(actor) = actor {
            let template = self.actor_condition.as_deref().ok_or_else(|| {
                CacheError::ConfigError(format!(
                    "table '{}' has no actor condition",
                    self.table
                ))
            })?;
            conditions.push(format!("({})", binder.bind_template(template, actor_value(actor))));
        }
        if let Some(after) = after {
            let placeholder = binder.bind(after.to_value());
            conditions.push(format!("{} > {}", self.id_column, placeholder));
        }

        let sql = format!(
            "SELECT {id} AS entity_id FROM {table}{filter} ORDER BY {id} LIMIT {limit}",
            id = self.id_column,
            table = self.table,
            filter = where_clause(&conditions),
            limit = self.fetch_size,
        );
        Ok(Statement::from_sql_and_values(backend, sql, binder.values))
    }

    async fn fetch_page(
        &self,
        actor: Option<&ActorId>,
        after: Option<&KeysetCursor>,
    ) -> Result<Vec<KeysetCursor>> {
        let stmt = self.page_statement(actor, after)?;
        let rows = self
            .db
            .query_all(stmt)
            .await
            .map_err(|e| CacheError::SourceRead(e.to_string()))?;
        rows.iter().map(KeysetCursor::decode).collect()
    }

    fn stream_ids<'a>(&'a self, actor: Option<&'a ActorId>) -> BoxStream<'a, Result<EntityRecord>> {
        // None: 已读完；Some(None): 第一页；Some(Some(c)): c 之后的一页
        stream::try_unfold(Some(None), move |state: Option<Option<KeysetCursor>>| async move {
            let Some(after) = state else {
                return Ok(None);
            };
            let ids = self.fetch_page(actor, after.as_ref()).await?;
            debug!(
                "Fetched {} ids from {} after {:?}",
                ids.len(),
                self.table,
                after
            );
            if ids.is_empty() {
                return Ok(None);
            }
            let next = if ids.len() < self.fetch_size {
                None
            } else {
                ids.last().cloned().map(Some)
            };
            let records: Vec<EntityRecord> = ids
                .iter()
                .map(|id| EntityRecord::new(id.to_string()))
                .collect();
            Ok::<_, CacheError>(Some((records, next)))
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, CacheError>)))
        .try_flatten()
        .boxed()
    }
}

#[async_trait]
impl EntitySource for SqlEntitySource {
    #[instrument(skip(self), level = "debug", fields(table = %self.table))]
    async fn count(&self) -> Result<u64> {
        let conditions: Vec<String> = self
            .live_condition
            .iter()
            .map(|c| format!("({})", c))
            .collect();
        let sql = format!(
            "SELECT COUNT(*) AS entity_count FROM {}{}",
            self.table,
            where_clause(&conditions)
        );
        let row = self
            .db
            .query_one(Statement::from_string(self.backend(), sql))
            .await
            .map_err(|e| CacheError::SourceRead(e.to_string()))?
            .ok_or_else(|| CacheError::SourceRead("COUNT returned no row".to_string()))?;
        let count: i64 = row
            .try_get("", "entity_count")
            .map_err(|e| CacheError::SourceRead(e.to_string()))?;
        Ok(count.max(0) as u64)
    }

    fn list_live(&self) -> BoxStream<'_, Result<EntityRecord>> {
        self.stream_ids(None)
    }

    fn list_live_for_actor<'a>(
        &'a self,
        actor: &'a ActorId,
    ) -> BoxStream<'a, Result<EntityRecord>> {
        self.stream_ids(Some(actor))
    }
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn actor_value(actor: &ActorId) -> Value {
    match actor.as_str().parse::<i64>() {
        Ok(id) => Value::from(id),
        Err(_) => Value::from(actor.as_str().to_string()),
    }
}

/// 按数据库方言生成占位符并收集参数
struct Binder {
    backend: DbBackend,
    values: Vec<Value>,
}

impl Binder {
    fn new(backend: DbBackend) -> Self {
        Self {
            backend,
            values: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.values.push(value);
        match self.backend {
            DbBackend::Postgres => format!("${}", self.values.len()),
            _ => "?".to_string(),
        }
    }

    /// 把模板中的每个 `{actor}` 替换为占位符
    fn bind_template(&mut self, template: &str, value: Value) -> String {
        let mut parts = template.split(ACTOR_PLACEHOLDER);
        let mut rendered = parts.next().unwrap_or_default().to_string();
        let mut shared: Option<String> = None;
        for part in parts {
            let placeholder = match (&self.backend, &shared) {
                (DbBackend::Postgres, Some(existing)) => existing.clone(),
                _ => self.bind(value.clone()),
            };
            shared = Some(placeholder.clone());
            rendered.push_str(&placeholder);
            rendered.push_str(part);
        }
        rendered
    }
}
