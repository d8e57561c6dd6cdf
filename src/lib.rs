//! cache-manager - 缓存路由、失效与预热引擎
//!
//! 把逻辑缓存域映射到物理命名空间和键前缀，提供按前缀失效、
//! 组合域命名空间清空、从数据源分批预热以及缓存内省功能。

pub use serde;
pub use serde_json;
pub use tokio;

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod introspection;
pub mod keys;
pub mod manager;
pub mod registry;
pub mod source;
pub mod sync;
pub mod telemetry;
pub mod utils;

// Re-export commonly used items
pub use backend::{BackendId, Backends, KvStore};
pub use config::Config;
pub use error::{CacheError, Result};
pub use introspection::{CacheInfoPage, IntrospectionService, Pagination};
pub use keys::{CacheKey, KeyCodec};
pub use manager::CacheManager;
pub use registry::{DomainDescriptor, DomainRegistry, DomainSpec, KeyScheme};
pub use source::{ActorId, EntityRecord, EntitySource};
pub use sync::{InvalidationEngine, PreheatEngine};

/// cache-manager 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
