//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了进程内的键值存储，用于本地运行和测试。

use crate::backend::KvStore;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// 内存存储实现
///
/// 基于 DashMap，每个实例就是一个独立的命名空间
#[derive(Default)]
pub struct MemoryStore {
    // 值: (数据, 过期时间)
    entries: DashMap<String, (Vec<u8>, Option<Instant>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前未过期的条目数量
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !is_expired(&entry.value().1, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 当前未过期的全部键（已排序）
    pub fn keys(&self) -> Vec<String> {
        self.matching_keys("")
    }

    fn matching_keys(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && !is_expired(&entry.value().1, now))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort_unstable();
        keys
    }
}

fn is_expired(expire_at: &Option<Instant>, now: Instant) -> bool {
    matches!(expire_at, Some(at) if now >= *at)
}

fn expiry(ttl: Option<u64>) -> Option<Instant> {
    ttl.filter(|secs| *secs > 0)
        .map(|secs| Instant::now() + Duration::from_secs(secs))
}

#[async_trait]
impl KvStore for MemoryStore {
    /// 先收集全部匹配的键再逐个产出，内存占用随匹配数量增长，
    /// 不满足分页扫描的内存上界，只适合测试和本地开发
    fn scan<'a>(&'a self, prefix: &'a str, _page_size: usize) -> BoxStream<'a, Result<String>> {
        let keys = self.matching_keys(prefix);
        debug!("Memory scan: prefix={}, matched={}", prefix, keys.len());
        stream::iter(keys.into_iter().map(Ok)).boxed()
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.entries.get(key).and_then(|entry| {
            let (bytes, expire_at) = entry.value();
            (!is_expired(expire_at, Instant::now())).then(|| bytes.clone())
        });
        if value.is_none() {
            self.entries
                .remove_if(key, |_, (_, expire_at)| is_expired(expire_at, Instant::now()));
        }
        Ok(value)
    }

    #[instrument(skip(self, value), level = "debug", fields(value_len = value.len()))]
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<u64>) -> Result<()> {
        self.entries.insert(key.to_string(), (value, expiry(ttl)));
        Ok(())
    }

    #[instrument(skip(self, items), level = "debug", fields(item_count = items.len()))]
    async fn set_many(&self, items: Vec<(String, Vec<u8>)>, ttl: Option<u64>) -> Result<()> {
        let expire_at = expiry(ttl);
        for (key, value) in items {
            self.entries.insert(key, (value, expire_at));
        }
        Ok(())
    }

    #[instrument(skip(self, keys), level = "debug", fields(key_count = keys.len()))]
    async fn delete(&self, keys: &[String]) -> Result<u64> {
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .filter(|(_, (_, expire_at))| !is_expired(expire_at, now))
            .count();
        Ok(removed as u64)
    }

    #[instrument(skip(self), level = "debug")]
    async fn clear(&self) -> Result<()> {
        debug!("Memory clear: 清空所有条目");
        self.entries.clear();
        Ok(())
    }
}
