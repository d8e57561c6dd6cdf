//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存后端的抽象接口，以及按命名空间组织的后端集合。

pub mod memory;
pub mod redis_store;

use crate::config::{BackendConfig, Config, DEFAULT_BACKEND};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

/// 物理缓存命名空间标识
///
/// `Default` 为多个域共享的默认命名空间（使用规范编码的键），
/// `Dedicated` 为某个域独占或专用的命名空间（使用简单编码的键）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendId {
    Default,
    Dedicated(String),
}

impl BackendId {
    pub fn parse(id: &str) -> Self {
        if id == DEFAULT_BACKEND {
            BackendId::Default
        } else {
            BackendId::Dedicated(id.to_string())
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, BackendId::Default)
    }

    pub fn as_str(&self) -> &str {
        match self {
            BackendId::Default => DEFAULT_BACKEND,
            BackendId::Dedicated(name) => name,
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 键值缓存存储的抽象
///
/// 一个实例对应一个命名空间，`clear` 只作用于该命名空间。
/// 值对核心逻辑是透明的字节序列。
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 流式扫描以 `prefix` 开头的所有键，每次向后端请求约 `page_size` 个
    fn scan<'a>(&'a self, prefix: &'a str, page_size: usize) -> BoxStream<'a, Result<String>>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// `ttl` 为 `None` 时不过期
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<u64>) -> Result<()>;

    /// 一次调用写入一批键值
    async fn set_many(&self, items: Vec<(String, Vec<u8>)>, ttl: Option<u64>) -> Result<()>;

    /// 删除给定的键，返回实际删除的数量
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// 清空整个命名空间
    async fn clear(&self) -> Result<()>;
}

/// 后端集合
///
/// 启动时按配置解析出的 `BackendId -> KvStore` 映射，之后只读。
#[derive(Clone, Default)]
pub struct Backends {
    stores: HashMap<BackendId, Arc<dyn KvStore>>,
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.stores.keys().map(BackendId::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("Backends").field("ids", &ids).finish()
    }
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: BackendId, store: Arc<dyn KvStore>) -> Self {
        self.insert(id, store);
        self
    }

    pub fn insert(&mut self, id: BackendId, store: Arc<dyn KvStore>) {
        self.stores.insert(id, store);
    }

    /// 获取指定命名空间的存储
    pub fn get(&self, id: &BackendId) -> Result<&Arc<dyn KvStore>> {
        self.stores
            .get(id)
            .ok_or_else(|| CacheError::ConfigError(format!("Backend '{}' is not configured", id)))
    }

    pub fn contains(&self, id: &BackendId) -> bool {
        self.stores.contains_key(id)
    }

    /// 根据配置连接所有后端
    ///
    /// 任何一个后端连接失败都会让启动失败
    #[instrument(skip(config), level = "info", fields(backend_count = config.backends.len()))]
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut backends = Backends::new();
        for (id, backend_cfg) in &config.backends {
            let store: Arc<dyn KvStore> = match backend_cfg {
                BackendConfig::Redis(redis_cfg) => {
                    Arc::new(redis_store::RedisStore::connect(redis_cfg).await?)
                }
                BackendConfig::Memory => Arc::new(memory::MemoryStore::new()),
            };
            info!("Backend '{}' ready", id);
            backends.insert(BackendId::parse(id), store);
        }
        Ok(backends)
    }
}
