//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 缓存键编解码
//!
//! 两种编码并存：默认命名空间中的规范编码 `oi:1:<EntityType>:<id>`，
//! 以及专用命名空间中的简单编码 `<domain>_<id>`。前缀都记录在域描述中。

use crate::error::{CacheError, Result};
use crate::registry::{DomainDescriptor, KeyEncoding};
use std::fmt;

/// 完整的缓存键，序列化形式为 `prefix + raw_id`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub prefix: String,
    pub raw_id: String,
}

impl CacheKey {
    /// 按已知前缀拆分原始键
    pub fn split(raw: &str, prefix: &str) -> Option<Self> {
        raw.strip_prefix(prefix).map(|raw_id| CacheKey {
            prefix: prefix.to_string(),
            raw_id: raw_id.to_string(),
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.raw_id)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.to_string()
    }
}

/// 键编解码器
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyCodec;

impl KeyCodec {
    /// 生成域内实体的缓存键
    ///
    /// 规范编码下 id 不能包含 `:`，否则无法被 `parse` 还原
    pub fn key_for(domain: &DomainDescriptor, id: &str) -> Result<CacheKey> {
        if id.is_empty() {
            return Err(CacheError::malformed(
                domain.key_prefix.as_str(),
                "entity id is empty",
            ));
        }
        if domain.encoding() == KeyEncoding::Canonical && id.contains(':') {
            return Err(CacheError::malformed(
                format!("{}{}", domain.key_prefix, id),
                "entity id contains ':'",
            ));
        }
        Ok(CacheKey {
            prefix: domain.key_prefix.clone(),
            raw_id: id.to_string(),
        })
    }

    pub fn prefix_for(domain: &DomainDescriptor) -> &str {
        &domain.key_prefix
    }

    /// 从原始键中解析出实体 id
    ///
    /// 规范编码下剥离前缀后的部分可能还带有以 `:` 分隔的二级键，取最后一段。
    pub fn parse(raw: &str, domain: &DomainDescriptor) -> Result<String> {
        let key = CacheKey::split(raw, &domain.key_prefix).ok_or_else(|| {
            CacheError::malformed(
                raw,
                format!("expected prefix '{}'", domain.key_prefix),
            )
        })?;
        let id = match domain.encoding() {
            KeyEncoding::Canonical => key.raw_id.rsplit(':').next().unwrap_or_default(),
            KeyEncoding::Simple => key.raw_id.as_str(),
        };
        if id.is_empty() {
            return Err(CacheError::malformed(raw, "missing entity id"));
        }
        Ok(id.to_string())
    }
}
