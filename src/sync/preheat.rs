//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存预热引擎：把数据源中的有效实体分批写入缓存。

use crate::backend::Backends;
use crate::error::{CacheError, Result};
use crate::keys::KeyCodec;
use crate::registry::DomainRegistry;
use crate::source::ActorId;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// 默认预热批次大小
pub const DEFAULT_PREHEAT_BATCH_SIZE: usize = 2000;

/// 单次预热的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreheatReport {
    pub domain: String,
    /// 写入的键数量
    pub written: u64,
    /// 批量写入调用次数
    pub batches: u64,
    /// 按操作者过滤时的操作者
    pub scoped_to: Option<ActorId>,
}

/// 缓存预热引擎
///
/// 数据源结果按 `batch_size` 分块，每块一次 `set_many` 写入且不过期。
/// 一块写完之后才会读取下一块。任何一块写入失败都会中止预热，
/// 已写入的块保留在缓存中；由于键是确定的，重试预热是幂等的。
#[derive(Debug, Clone)]
pub struct PreheatEngine {
    registry: Arc<DomainRegistry>,
    backends: Arc<Backends>,
    batch_size: usize,
}

impl PreheatEngine {
    pub fn new(registry: Arc<DomainRegistry>, backends: Arc<Backends>, batch_size: usize) -> Self {
        Self {
            registry,
            backends,
            batch_size: batch_size.max(1),
        }
    }

    /// 预热一个域
    ///
    /// # 参数
    ///
    /// * `name` - 域名
    /// * `actor` - 请求者，仅对按操作者过滤的域生效
    ///
    /// # 返回值
    ///
    /// 成功时返回写入统计；没有数据源的域返回 `UnsupportedDomain`，
    /// 数据源失败返回 `SourceRead`，写入失败返回 `CacheWrite`
    #[instrument(skip(self), level = "info", fields(batch_size = self.batch_size))]
    pub async fn preheat(&self, name: &str, actor: &ActorId) -> Result<PreheatReport> {
        let entry = self.registry.entry(name)?;
        let descriptor = entry.descriptor();
        let source = entry
            .source()
            .ok_or_else(|| CacheError::UnsupportedDomain(name.to_string()))?;
        let store = self.backends.get(&descriptor.backend)?;

        let records = if descriptor.scoped {
            debug!("Preheating {} scoped to actor {}", name, actor);
            source.list_live_for_actor(actor)
        } else {
            source.list_live()
        };

        let mut chunks = records.chunks(self.batch_size);
        let mut written = 0u64;
        let mut batches = 0u64;

        while let Some(chunk) = chunks.next().await {
            let mut items = Vec::with_capacity(chunk.len());
            for record in chunk {
                let record = record.map_err(CacheError::into_source_read)?;
                let key = KeyCodec::key_for(descriptor, &record.id)?;
                let value = serde_json::to_vec(&record)?;
                items.push((String::from(key), value));
            }

            let count = items.len() as u64;
            store
                .set_many(items, None)
                .await
                .map_err(CacheError::into_cache_write)?;
            written += count;
            batches += 1;
            debug!("Domain {}: batch {} written ({} keys)", name, batches, count);
        }

        info!(
            "Domain {} preheated: {} keys in {} batches",
            name, written, batches
        );
        Ok(PreheatReport {
            domain: descriptor.name.clone(),
            written,
            batches,
            scoped_to: descriptor.scoped.then(|| actor.clone()),
        })
    }
}
