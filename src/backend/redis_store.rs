//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Redis逻辑库的键值存储实现。

use crate::backend::KvStore;
use crate::config::RedisConfig;
use crate::error::{CacheError, Result};
use crate::utils::redaction::RedactedUrl;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use redis::{aio::ConnectionManager, Client, IntoConnectionInfo, RedisResult};
use secrecy::ExposeSecret;
use std::future::Future;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, instrument};

/// Redis 存储
///
/// 一个实例绑定一个逻辑库（`SELECT n`），`clear` 即 `FLUSHDB`
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    manager: ConnectionManager,
    command_timeout_ms: u64,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("db", &self.client.get_connection_info().redis.db)
            .field("command_timeout_ms", &self.command_timeout_ms)
            .finish()
    }
}

/// 转义 Redis glob 模式中的特殊字符
pub fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\' | '^') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl RedisStore {
    /// 根据配置建立连接
    ///
    /// # 参数
    ///
    /// * `config` - Redis 后端配置
    ///
    /// # 返回值
    ///
    /// 返回已连接的存储，连接超时返回 `Timeout`
    #[instrument(skip(config), level = "info", name = "connect_redis_store")]
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let raw = config.connection_string.expose_secret();
        let url = if config.enable_tls && !raw.starts_with("rediss://") {
            raw.replace("redis://", "rediss://")
        } else {
            raw.to_string()
        };

        info!("Connecting to Redis at {}", RedactedUrl(&url));
        let mut info = url.as_str().into_connection_info()?;
        if let Some(db) = config.database {
            info.redis.db = db;
        }
        let client = Client::open(info)?;

        let manager = match timeout(
            Duration::from_millis(config.connection_timeout_ms),
            client.get_connection_manager(),
        )
        .await
        {
            Ok(res) => res?,
            Err(_) => {
                return Err(CacheError::Timeout(format!(
                    "Redis connection timed out after {}ms",
                    config.connection_timeout_ms
                )))
            }
        };

        debug!(
            "Redis store connected, db={}",
            client.get_connection_info().redis.db
        );
        Ok(Self {
            client,
            manager,
            command_timeout_ms: config.command_timeout_ms,
        })
    }

    /// 检查连接是否正常
    #[instrument(skip(self), level = "debug")]
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let response: String = self
            .run("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;
        debug!("RedisStore ping: {}", response);
        Ok(())
    }

    async fn run<T, F>(&self, command: &str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match timeout(Duration::from_millis(self.command_timeout_ms), fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(CacheError::Timeout(format!(
                "{} timed out after {}ms",
                command, self.command_timeout_ms
            ))),
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    fn scan<'a>(&'a self, prefix: &'a str, page_size: usize) -> BoxStream<'a, Result<String>> {
        let pattern = format!("{}*", escape_glob(prefix));
        stream::try_unfold(Some(0u64), move |cursor| {
            let pattern = pattern.clone();
            async move {
                let Some(cursor) = cursor else {
                    return Ok(None);
                };
                let mut conn = self.manager.clone();
                let (next_cursor, keys): (u64, Vec<String>) = self
                    .run(
                        "SCAN",
                        redis::cmd("SCAN")
                            .arg(cursor)
                            .arg("MATCH")
                            .arg(&pattern)
                            .arg("COUNT")
                            .arg(page_size)
                            .query_async(&mut conn),
                    )
                    .await?;
                debug!(
                    "Redis scan page: pattern={}, cursor={}, keys={}",
                    pattern,
                    cursor,
                    keys.len()
                );
                let next = (next_cursor != 0).then_some(next_cursor);
                Ok::<_, CacheError>(Some((keys, next)))
            }
        })
        .map_ok(|keys| stream::iter(keys.into_iter().map(Ok::<String, CacheError>)))
        .try_flatten()
        .boxed()
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        self.run("GET", redis::cmd("GET").arg(key).query_async(&mut conn))
            .await
    }

    #[instrument(skip(self, value), level = "debug", fields(value_len = value.len()))]
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<u64>) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl.filter(|t| *t > 0) {
            cmd.arg("EX").arg(ttl);
        }
        let mut conn = self.manager.clone();
        self.run("SET", cmd.query_async::<()>(&mut conn)).await
    }

    #[instrument(skip(self, items), level = "debug", fields(item_count = items.len()))]
    async fn set_many(&self, items: Vec<(String, Vec<u8>)>, ttl: Option<u64>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let ttl = ttl.filter(|t| *t > 0);
        let mut pipe = redis::pipe();
        for (key, value) in items {
            let cmd = pipe.cmd("SET").arg(key).arg(value);
            if let Some(ttl) = ttl {
                cmd.arg("EX").arg(ttl);
            }
            cmd.ignore();
        }
        let mut conn = self.manager.clone();
        self.run("SET pipeline", pipe.query_async::<()>(&mut conn))
            .await
    }

    #[instrument(skip(self, keys), level = "debug", fields(key_count = keys.len()))]
    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.manager.clone();
        self.run("DEL", redis::cmd("DEL").arg(keys).query_async(&mut conn))
            .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn clear(&self) -> Result<()> {
        debug!("Redis clear: FLUSHDB");
        let mut conn = self.manager.clone();
        self.run("FLUSHDB", redis::cmd("FLUSHDB").query_async::<()>(&mut conn))
            .await
    }
}
