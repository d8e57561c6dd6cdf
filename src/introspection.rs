//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 缓存内省：按域统计缓存键数量，并与数据源中的有效实体数量对照。
//!
//! 分页针对的是域列表而不是缓存键，游标就是域名。

use crate::backend::Backends;
use crate::error::Result;
use crate::keys::KeyCodec;
use crate::registry::{DomainDescriptor, DomainEntry, DomainRegistry};
use futures::future::try_join_all;
use futures::TryStreamExt;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// 游标分页参数
///
/// 不在域列表中的游标不会报错：`after` 回到列表开头，`before` 回到列表末尾。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pagination {
    pub first: Option<usize>,
    pub last: Option<usize>,
    pub after: Option<String>,
    pub before: Option<String>,
}

impl Pagination {
    pub fn first(n: usize) -> Self {
        Self {
            first: Some(n),
            ..Self::default()
        }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }
}

/// 分页窗口 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: usize,
    pub end: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// 在有序名称列表上计算分页窗口
pub fn page_window<S: AsRef<str>>(names: &[S], pagination: &Pagination) -> PageWindow {
    let len = names.len();
    let position = |cursor: &str| names.iter().position(|n| n.as_ref() == cursor);

    let mut start = match pagination.after.as_deref() {
        Some(after) => position(after).map(|i| i + 1).unwrap_or(0),
        None => 0,
    };
    let mut end = match pagination.before.as_deref() {
        Some(before) => position(before).unwrap_or(len),
        None => len,
    };
    if end < start {
        end = start;
    }
    if let Some(first) = pagination.first {
        end = end.min(start.saturating_add(first));
    }
    if let Some(last) = pagination.last {
        start = start.max(end.saturating_sub(last));
    }

    PageWindow {
        start,
        end,
        has_next_page: end < len,
        has_previous_page: start > 0,
    }
}

/// 单个域的缓存信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub domain: String,
    pub backend: String,
    /// 当前缓存中该域前缀下的键数量
    pub cached_count: u64,
    /// 数据源中的有效实体数量，不要求与 `cached_count` 相等
    pub source_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfoEdge {
    pub cursor: String,
    pub node: CacheInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfoPage {
    /// 分页全集中的域数量
    pub total_count: usize,
    pub edges: Vec<CacheInfoEdge>,
    pub page_info: PageInfo,
}

/// 缓存中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedEntry {
    pub key: String,
    pub id: String,
}

/// 内省服务
#[derive(Debug, Clone)]
pub struct IntrospectionService {
    registry: Arc<DomainRegistry>,
    backends: Arc<Backends>,
    scan_page_size: usize,
}

impl IntrospectionService {
    pub fn new(
        registry: Arc<DomainRegistry>,
        backends: Arc<Backends>,
        scan_page_size: usize,
    ) -> Self {
        Self {
            registry,
            backends,
            scan_page_size: scan_page_size.max(1),
        }
    }

    /// 列出缓存信息
    ///
    /// # 参数
    ///
    /// * `domain` - 只查询某一个域，`None` 表示全部域
    /// * `pagination` - 基于域名游标的分页参数
    ///
    /// # 返回值
    ///
    /// 返回当前页，只对页内的域执行扫描和计数
    #[instrument(skip(self), level = "info")]
    pub async fn list_cache_info(
        &self,
        domain: Option<&str>,
        pagination: &Pagination,
    ) -> Result<CacheInfoPage> {
        let universe: Vec<&DomainEntry> = match domain {
            Some(name) => vec![self.registry.entry(name)?],
            None => self.registry.entries().iter().collect(),
        };
        let names: Vec<&str> = universe
            .iter()
            .map(|e| e.descriptor().name.as_str())
            .collect();
        let window = page_window(&names, pagination);
        debug!(
            "Cache info window [{}, {}) of {} domains",
            window.start,
            window.end,
            universe.len()
        );

        let nodes = try_join_all(
            universe[window.start..window.end]
                .iter()
                .map(|entry| self.cache_info(entry)),
        )
        .await?;

        let edges: Vec<CacheInfoEdge> = nodes
            .into_iter()
            .map(|node| CacheInfoEdge {
                cursor: node.domain.clone(),
                node,
            })
            .collect();

        Ok(CacheInfoPage {
            total_count: universe.len(),
            page_info: PageInfo {
                has_next_page: window.has_next_page,
                has_previous_page: window.has_previous_page,
                start_cursor: edges.first().map(|e| e.cursor.clone()),
                end_cursor: edges.last().map(|e| e.cursor.clone()),
            },
            edges,
        })
    }

    /// 统计域前缀下的缓存键数量（完整扫描，不是抽样）
    ///
    /// 格式错误的键会记录日志并跳过
    #[instrument(skip(self), level = "debug")]
    pub async fn cached_count(&self, name: &str) -> Result<u64> {
        let descriptor = self.registry.resolve(name)?;
        self.count_keys(descriptor).await
    }

    /// 按扫描顺序列出域中缓存的记录
    #[instrument(skip(self), level = "debug")]
    pub async fn list_entries(&self, name: &str, limit: Option<usize>) -> Result<Vec<CachedEntry>> {
        let descriptor = self.registry.resolve(name)?;
        let store = self.backends.get(&descriptor.backend)?;
        let limit = limit.unwrap_or(usize::MAX);

        let mut keys = store.scan(KeyCodec::prefix_for(descriptor), self.scan_page_size);
        let mut entries = Vec::new();
        while entries.len() < limit {
            let Some(key) = keys.try_next().await? else {
                break;
            };
            match KeyCodec::parse(&key, descriptor) {
                Ok(id) => entries.push(CachedEntry { key, id }),
                Err(e) => warn!("Skipping malformed key in {}: {}", name, e),
            }
        }
        Ok(entries)
    }

    async fn cache_info(&self, entry: &DomainEntry) -> Result<CacheInfo> {
        let descriptor = entry.descriptor();
        let cached_count = self.count_keys(descriptor).await?;
        let source_count = match entry.source() {
            Some(source) => source
                .count()
                .await
                .map_err(crate::error::CacheError::into_source_read)?,
            None => 0,
        };
        Ok(CacheInfo {
            domain: descriptor.name.clone(),
            backend: descriptor.backend.to_string(),
            cached_count,
            source_count,
        })
    }

    async fn count_keys(&self, descriptor: &DomainDescriptor) -> Result<u64> {
        let store = self.backends.get(&descriptor.backend)?;
        let mut keys = store.scan(KeyCodec::prefix_for(descriptor), self.scan_page_size);
        let mut count = 0u64;
        while let Some(key) = keys.try_next().await? {
            match KeyCodec::parse(&key, descriptor) {
                Ok(_) => count += 1,
                Err(e) => warn!("Skipping malformed key in {}: {}", descriptor.name, e),
            }
        }
        Ok(count)
    }
}
