//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存失效引擎：按前缀扫描删除，或清空组合域的专用命名空间。

use crate::backend::{Backends, KvStore};
use crate::error::{CacheError, Result};
use crate::keys::KeyCodec;
use crate::registry::{DomainDescriptor, DomainRegistry};
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 失效方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationMode {
    /// 扫描前缀并分批删除
    PrefixScan,
    /// 清空整个专用命名空间
    NamespaceClear,
}

/// 单个域的失效结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationReport {
    pub domain: String,
    pub mode: InvalidationMode,
    /// 删除的键数量，命名空间清空时未知
    pub deleted: Option<u64>,
}

/// 缓存失效引擎
///
/// 不在调用之间保存任何状态，每次调用都从注册表重新推导前缀。
/// 与同一域上的预热并发执行时结果不确定，需要调用方自行串行化。
#[derive(Debug, Clone)]
pub struct InvalidationEngine {
    registry: Arc<DomainRegistry>,
    backends: Arc<Backends>,
    scan_page_size: usize,
    delete_batch_size: usize,
}

impl InvalidationEngine {
    /// 创建新的失效引擎
    ///
    /// # 参数
    ///
    /// * `registry` - 域注册表
    /// * `backends` - 后端集合
    /// * `scan_page_size` - 每次 SCAN 请求的键数量
    /// * `delete_batch_size` - 每次 DEL 的最大键数量
    pub fn new(
        registry: Arc<DomainRegistry>,
        backends: Arc<Backends>,
        scan_page_size: usize,
        delete_batch_size: usize,
    ) -> Self {
        Self {
            registry,
            backends,
            scan_page_size: scan_page_size.max(1),
            delete_batch_size: delete_batch_size.max(1),
        }
    }

    /// 按域类型分发：组合域清空命名空间，普通域按前缀删除
    pub async fn invalidate(&self, name: &str) -> Result<InvalidationReport> {
        let descriptor = self.registry.resolve(name)?;
        if descriptor.composite {
            self.clear_namespace(name).await
        } else {
            self.invalidate_domain(name).await
        }
    }

    /// 删除域前缀下的所有键
    ///
    /// 没有匹配的键时是空操作。前缀下的键无论能否解析都会被删除；
    /// 扫描到格式错误的键时，删除完成后返回第一个 `MalformedKey`。
    #[instrument(skip(self), level = "info")]
    pub async fn invalidate_domain(&self, name: &str) -> Result<InvalidationReport> {
        let descriptor = self.registry.resolve(name)?;
        let store = self.backends.get(&descriptor.backend)?;

        let (deleted, malformed) = self.delete_prefix(descriptor, store.as_ref()).await?;

        if let Some((first, count)) = malformed {
            warn!(
                "Domain {}: {} malformed keys among {} deleted keys",
                name, count, deleted
            );
            return Err(first);
        }

        info!("Domain {} invalidated, {} keys deleted", name, deleted);
        Ok(InvalidationReport {
            domain: descriptor.name.clone(),
            mode: InvalidationMode::PrefixScan,
            deleted: Some(deleted),
        })
    }

    /// 清空组合域的专用命名空间
    #[instrument(skip(self), level = "info")]
    pub async fn clear_namespace(&self, name: &str) -> Result<InvalidationReport> {
        let descriptor = self.registry.resolve(name)?;
        if !descriptor.composite {
            return Err(CacheError::NotAComposite(name.to_string()));
        }
        let store = self.backends.get(&descriptor.backend)?;
        store.clear().await?;

        info!(
            "Domain {}: namespace {} cleared",
            name, descriptor.backend
        );
        Ok(InvalidationReport {
            domain: descriptor.name.clone(),
            mode: InvalidationMode::NamespaceClear,
            deleted: None,
        })
    }

    async fn delete_prefix(
        &self,
        descriptor: &DomainDescriptor,
        store: &dyn KvStore,
    ) -> Result<(u64, Option<(CacheError, usize)>)> {
        let prefix = KeyCodec::prefix_for(descriptor);
        let mut keys = store.scan(prefix, self.scan_page_size);
        let mut batch: Vec<String> = Vec::with_capacity(self.delete_batch_size);
        let mut deleted = 0u64;
        let mut malformed: Option<(CacheError, usize)> = None;

        while let Some(key) = keys.try_next().await? {
            if let Err(e) = KeyCodec::parse(&key, descriptor) {
                debug!("Deleting malformed key {}", key);
                match malformed.as_mut() {
                    Some((_, count)) => *count += 1,
                    None => malformed = Some((e, 1)),
                }
            }
            batch.push(key);
            if batch.len() >= self.delete_batch_size {
                deleted += store.delete(&batch).await?;
                debug!("Deleted batch of {} keys under {}", batch.len(), prefix);
                batch.clear();
            }
        }

        if !batch.is_empty() {
            deleted += store.delete(&batch).await?;
            debug!("Deleted final batch of {} keys under {}", batch.len(), prefix);
        }

        Ok((deleted, malformed))
    }
}
