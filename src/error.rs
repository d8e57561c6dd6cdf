//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存管理系统的错误类型和处理机制。

use thiserror::Error;

/// 缓存管理错误类型枚举
///
/// 覆盖域解析、键编解码、失效、预热和内省过程中可能出现的错误
#[derive(Error, Debug)]
pub enum CacheError {
    /// 请求的逻辑域不在注册表中
    #[error("Unknown cache domain: {0}")]
    UnknownDomain(String),

    /// 对非组合域执行了命名空间清空
    #[error("Domain '{0}' does not own a dedicated namespace")]
    NotAComposite(String),

    /// 该域不支持预热（没有数据源访问器）
    #[error("Domain '{0}' cannot be preheated")]
    UnsupportedDomain(String),

    /// 缓存键与期望的前缀或格式不匹配
    #[error("Malformed cache key '{key}': {reason}")]
    MalformedKey { key: String, reason: String },

    /// 数据源读取失败
    #[error("Source read error: {0}")]
    SourceRead(String),

    /// 批量写入缓存失败
    #[error("Cache write error: {0}")]
    CacheWrite(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 后端错误
    #[error("Backend error: {0}")]
    BackendError(String),

    /// 超时错误
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Redis错误
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// Sea-ORM数据库错误
    #[error("Sea-ORM error: {0}")]
    SeaOrmError(#[from] sea_orm::DbErr),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CacheError {
    pub(crate) fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CacheError::MalformedKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// 将数据源侧的错误归类为 `SourceRead`
    pub(crate) fn into_source_read(self) -> Self {
        match self {
            e @ CacheError::SourceRead(_) => e,
            other => CacheError::SourceRead(other.to_string()),
        }
    }

    /// 将缓存写入侧的错误归类为 `CacheWrite`
    pub(crate) fn into_cache_write(self) -> Self {
        match self {
            e @ CacheError::CacheWrite(_) => e,
            other => CacheError::CacheWrite(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

/// 缓存操作结果类型别名
pub type Result<T> = std::result::Result<T, CacheError>;
