//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存管理系统的配置结构和解析逻辑。

use crate::error::{CacheError, Result};
use redis::IntoConnectionInfo;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

pub const CONFIG_VERSION: u32 = 1;

/// 默认命名空间在配置中的标识
pub const DEFAULT_BACKEND: &str = "default";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub config_version: Option<u32>,
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut backends = BTreeMap::new();
        backends.insert(DEFAULT_BACKEND.to_string(), BackendConfig::Memory);
        Self {
            config_version: Some(CONFIG_VERSION),
            global: GlobalConfig::default(),
            backends,
            source: None,
            domains: Vec::new(),
        }
    }
}

/// 全局配置
///
/// 键编码方案和各类批次大小
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GlobalConfig {
    /// 规范编码的键命名空间（`oi:1:Location:` 中的 `oi`）
    pub key_namespace: String,
    /// 规范编码的键版本（`oi:1:Location:` 中的 `1`）
    pub key_version: u32,
    /// 每次 SCAN 请求的键数量
    pub scan_page_size: usize,
    /// 每次 DEL 调用删除的最大键数量
    pub delete_batch_size: usize,
    /// 预热批次大小
    pub preheat_batch_size: usize,
    /// 是否在同一域上串行化失效和预热
    pub serialize_per_domain: bool,
    /// 是否注册内置的实体类型目录
    pub use_builtin_catalog: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            key_namespace: "oi".to_string(),
            key_version: 1,
            scan_page_size: 1000,
            delete_batch_size: 500,
            preheat_batch_size: crate::sync::DEFAULT_PREHEAT_BATCH_SIZE,
            serialize_per_domain: true,
            use_builtin_catalog: false,
        }
    }
}

/// 缓存后端配置
#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Redis 逻辑库
    Redis(RedisConfig),
    /// 进程内存储
    Memory,
}

/// Redis 后端配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RedisConfig {
    /// 连接字符串
    pub connection_string: SecretString,
    /// 逻辑库编号，覆盖连接字符串中的库编号
    pub database: Option<i64>,
    /// 是否启用 TLS
    pub enable_tls: bool,
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
    /// 命令执行超时时间（毫秒）
    pub command_timeout_ms: u64,
}

impl RedisConfig {
    /// 解析出 (地址, 生效的库编号)，用于判断两个后端是否落在同一个逻辑库
    pub fn target(&self) -> std::result::Result<(String, i64), redis::RedisError> {
        let info = self.connection_string.expose_secret().into_connection_info()?;
        let db = self.database.unwrap_or(info.redis.db);
        Ok((info.addr.to_string().to_lowercase(), db))
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            connection_string: SecretString::new("redis://localhost:6379".to_string().into()),
            database: None,
            enable_tls: false,
            connection_timeout_ms: 5000,
            command_timeout_ms: 3000,
        }
    }
}

/// 数据源（关系数据库）连接配置
#[derive(Deserialize, Clone, Debug)]
pub struct SourceConfig {
    pub database_url: SecretString,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 键集分页每页读取的行数
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

fn default_max_connections() -> u32 {
    5
}

fn default_fetch_size() -> usize {
    1000
}

/// 单个逻辑域的配置
#[derive(Deserialize, Clone, Debug)]
pub struct DomainConfig {
    pub name: String,
    #[serde(default = "default_backend")]
    pub backend: String,
    /// 规范编码中的实体类型名，缺省为域名的 PascalCase 形式
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub scoped: bool,
    #[serde(default)]
    pub composite: bool,
    #[serde(default)]
    pub source: Option<TableSourceConfig>,
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

/// 基于数据表的数据源访问器配置
#[derive(Deserialize, Clone, Debug)]
pub struct TableSourceConfig {
    pub table: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// "有效" 实体的 SQL 条件，例如 `validity_to IS NULL`
    #[serde(default)]
    pub live_condition: Option<String>,
    /// 按操作者过滤的 SQL 条件，`{actor}` 会被替换为绑定参数
    #[serde(default)]
    pub actor_condition: Option<String>,
}

fn default_id_column() -> String {
    "id".to_string()
}

pub(crate) fn domain_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("static regex"))
}

pub(crate) fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^[A-Za-z_"][A-Za-z0-9_"]*(\.[A-Za-z_"][A-Za-z0-9_"]*)?$"#)
            .expect("static regex")
    })
}

impl Config {
    /// 从 TOML 文件加载配置并验证
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// 从 TOML 文本解析配置并验证
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(raw).map_err(|e| CacheError::ConfigError(e.to_string()))?;
        config.validate().map_err(CacheError::ConfigError)?;
        Ok(config)
    }

    /// 验证配置
    ///
    /// 检查数值范围、后端引用和域定义，遇到第一个问题即返回
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = self.config_version {
            if version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        let global = &self.global;
        if global.key_namespace.is_empty() || global.key_namespace.contains(':') {
            return Err("Global key_namespace must be non-empty and contain no ':'".to_string());
        }
        if !(1..=100_000).contains(&global.scan_page_size) {
            return Err("Global scan_page_size must be between 1 and 100000".to_string());
        }
        if !(1..=10_000).contains(&global.delete_batch_size) {
            return Err("Global delete_batch_size must be between 1 and 10000".to_string());
        }
        if !(1..=100_000).contains(&global.preheat_batch_size) {
            return Err("Global preheat_batch_size must be between 1 and 100000".to_string());
        }

        if !self.backends.contains_key(DEFAULT_BACKEND) {
            return Err(format!("Backend '{}' must be configured", DEFAULT_BACKEND));
        }

        let mut redis_targets: BTreeMap<(String, i64), &str> = BTreeMap::new();
        for (id, backend) in &self.backends {
            if !domain_name_pattern().is_match(id) {
                return Err(format!("Backend id '{}' is not a valid identifier", id));
            }
            if let BackendConfig::Redis(redis) = backend {
                if !(100..=30000).contains(&redis.connection_timeout_ms) {
                    return Err(format!(
                        "Backend '{}' connection_timeout_ms must be between 100 and 30000 ms",
                        id
                    ));
                }
                if !(100..=60000).contains(&redis.command_timeout_ms) {
                    return Err(format!(
                        "Backend '{}' command_timeout_ms must be between 100 and 60000 ms",
                        id
                    ));
                }
                if matches!(redis.database, Some(db) if db < 0) {
                    return Err(format!("Backend '{}' database cannot be negative", id));
                }
                let target = redis
                    .target()
                    .map_err(|e| format!("Backend '{}' connection_string is invalid: {}", id, e))?;
                if let Some(other) = redis_targets.insert(target.clone(), id) {
                    return Err(format!(
                        "Backends '{}' and '{}' share Redis database {} at {}",
                        other, id, target.1, target.0
                    ));
                }
            }
        }

        if let Some(source) = &self.source {
            if source.max_connections == 0 {
                return Err("Source max_connections cannot be zero".to_string());
            }
            if source.fetch_size == 0 || source.fetch_size > 100_000 {
                return Err("Source fetch_size must be between 1 and 100000".to_string());
            }
        }

        let mut seen = HashSet::new();
        for domain in &self.domains {
            if !domain_name_pattern().is_match(&domain.name) {
                return Err(format!("Domain name '{}' is not valid", domain.name));
            }
            if !seen.insert(domain.name.as_str()) {
                return Err(format!("Domain '{}' is defined twice", domain.name));
            }
            if !self.backends.contains_key(&domain.backend) {
                return Err(format!(
                    "Domain '{}' references unknown backend '{}'",
                    domain.name, domain.backend
                ));
            }
            if let Some(table) = &domain.source {
                if self.source.is_none() {
                    return Err(format!(
                        "Domain '{}' declares a table source but no [source] is configured",
                        domain.name
                    ));
                }
                for ident in [&table.table, &table.id_column] {
                    if !identifier_pattern().is_match(ident) {
                        return Err(format!(
                            "Domain '{}' uses invalid SQL identifier '{}'",
                            domain.name, ident
                        ));
                    }
                }
                if domain.scoped && table.actor_condition.is_none() {
                    return Err(format!(
                        "Scoped domain '{}' requires an actor_condition",
                        domain.name
                    ));
                }
            }
        }

        Ok(())
    }
}
