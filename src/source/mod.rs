//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 数据源（权威关系数据库）访问接口
//!
//! 核心只需要两类能力：统计某个域的有效实体数量，以及流式枚举有效实体的 id。
//! "有效" 的含义（未软删除、未被新版本替代等）由数据源自己决定。

pub mod sql;

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use std::fmt;

/// 发起请求的操作者标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<i64> for ActorId {
    fn from(id: i64) -> Self {
        Self::new(id.to_string())
    }
}

/// 数据源返回的一条有效实体
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRecord {
    pub id: String,
}

impl EntityRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// 单个域的数据源访问器
///
/// 注册表中每个可预热的域都持有一个访问器。返回的流必须是惰性的，
/// 实现方不应一次性把整个结果集读入内存。
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// 有效实体数量
    async fn count(&self) -> Result<u64>;

    /// 流式枚举全部有效实体
    fn list_live(&self) -> BoxStream<'_, Result<EntityRecord>>;

    /// 流式枚举对某个操作者可见的有效实体
    fn list_live_for_actor<'a>(&'a self, actor: &'a ActorId)
        -> BoxStream<'a, Result<EntityRecord>>;
}
