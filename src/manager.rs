//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存管理器，负责根据配置装配注册表、后端和各引擎，
//! 并向上层（API、CLI）暴露解析、失效、预热和内省操作。

use crate::backend::{BackendId, Backends};
use crate::config::{Config, GlobalConfig};
use crate::error::{CacheError, Result};
use crate::introspection::{CacheInfoPage, CachedEntry, IntrospectionService, Pagination};
use crate::registry::{catalog, DomainDescriptor, DomainRegistry, DomainSpec, KeyScheme};
use crate::source::sql::{self, SqlEntitySource};
use crate::source::ActorId;
use crate::sync::{InvalidationEngine, InvalidationReport, PreheatEngine, PreheatReport};
use futures::future::join_all;
use sea_orm::DatabaseConnection;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument, warn};

/// 按域的咨询锁
///
/// 同一域上的失效与预热在持锁期间串行执行，不同域之间互不影响。
/// 锁在构造时按注册表中的域一次性创建，之后集合不再变化。
#[derive(Debug, Default)]
struct DomainLocks {
    locks: HashMap<String, Arc<Mutex<()>>>,
}

impl DomainLocks {
    fn for_domains(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            locks: names.into_iter().map(|n| (n, Arc::default())).collect(),
        }
    }

    /// 未注册的域没有锁，调用方随后会得到 `UnknownDomain`
    async fn acquire(&self, domain: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = self.locks.get(domain)?.clone();
        Some(lock.lock_owned().await)
    }
}

/// 缓存管理器
#[derive(Debug)]
pub struct CacheManager {
    registry: Arc<DomainRegistry>,
    invalidation: InvalidationEngine,
    preheat: PreheatEngine,
    introspection: IntrospectionService,
    locks: Option<DomainLocks>,
}

/// 去除首尾空白并转为小写
pub fn normalize_domain(name: &str) -> String {
    name.trim().to_lowercase()
}

impl CacheManager {
    /// 用已构建的注册表和后端创建管理器
    ///
    /// 注册表引用的每个命名空间都必须有对应的后端，否则立即失败
    pub fn new(
        registry: DomainRegistry,
        backends: Backends,
        global: &GlobalConfig,
    ) -> Result<Self> {
        for backend in registry.backends() {
            if !backends.contains(backend) {
                return Err(CacheError::ConfigError(format!(
                    "Backend '{}' is referenced by the registry but not configured",
                    backend
                )));
            }
        }

        let registry = Arc::new(registry);
        let backends = Arc::new(backends);
        Ok(Self {
            invalidation: InvalidationEngine::new(
                registry.clone(),
                backends.clone(),
                global.scan_page_size,
                global.delete_batch_size,
            ),
            preheat: PreheatEngine::new(
                registry.clone(),
                backends.clone(),
                global.preheat_batch_size,
            ),
            introspection: IntrospectionService::new(
                registry.clone(),
                backends,
                global.scan_page_size,
            ),
            locks: global
                .serialize_per_domain
                .then(|| DomainLocks::for_domains(registry.all_domain_names())),
            registry,
        })
    }

    /// 根据配置连接所有后端和数据源，并构建管理器
    #[instrument(skip(config), level = "info", fields(domain_count = config.domains.len()))]
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate().map_err(CacheError::ConfigError)?;

        let backends = Backends::connect(&config).await?;
        let db = match &config.source {
            Some(source) => Some(sql::connect(source).await?),
            None => None,
        };
        let registry = registry_from_config(&config, db.as_ref())?;
        info!(
            "CacheManager ready with {} domains across {} backends",
            registry.len(),
            registry.backends().len()
        );
        Self::new(registry, backends, &config.global)
    }

    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    /// 解析域名（大小写和首尾空白不敏感）
    pub fn resolve_domain(&self, name: &str) -> Result<&DomainDescriptor> {
        self.registry.resolve(&normalize_domain(name))
    }

    /// 失效一组域
    ///
    /// 组合域清空其命名空间，普通域按前缀删除。各域并发执行，
    /// 单个域失败不影响其他域。
    ///
    /// # 返回值
    ///
    /// 全部成功时返回各域的结果，否则返回失败的 (域名, 错误) 列表
    #[instrument(skip(self, names), level = "info")]
    pub async fn invalidate<I, S>(
        &self,
        names: I,
    ) -> std::result::Result<Vec<InvalidationReport>, Vec<(String, CacheError)>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = names
            .into_iter()
            .map(|n| normalize_domain(n.as_ref()))
            .collect();

        let results = join_all(names.iter().map(|name| async move {
            let _guard = self.lock(name).await;
            (name.clone(), self.invalidation.invalidate(name).await)
        }))
        .await;

        let mut reports = Vec::new();
        let mut failures = Vec::new();
        for (name, result) in results {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!("Failed to invalidate {}: {}", name, e);
                    failures.push((name, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(reports)
        } else {
            Err(failures)
        }
    }

    /// 按前缀删除单个域的缓存
    pub async fn invalidate_domain(&self, name: &str) -> Result<InvalidationReport> {
        let name = normalize_domain(name);
        let _guard = self.lock(&name).await;
        self.invalidation.invalidate_domain(&name).await
    }

    /// 清空组合域的命名空间
    pub async fn clear_namespace(&self, name: &str) -> Result<InvalidationReport> {
        let name = normalize_domain(name);
        let _guard = self.lock(&name).await;
        self.invalidation.clear_namespace(&name).await
    }

    /// 预热单个域
    pub async fn preheat(&self, name: &str, actor: &ActorId) -> Result<PreheatReport> {
        let name = normalize_domain(name);
        let _guard = self.lock(&name).await;
        self.preheat.preheat(&name, actor).await
    }

    /// 列出缓存信息，`domain` 为 `None` 时覆盖全部域
    pub async fn list_info(
        &self,
        domain: Option<&str>,
        pagination: &Pagination,
    ) -> Result<CacheInfoPage> {
        let domain = domain.map(normalize_domain);
        self.introspection
            .list_cache_info(domain.as_deref(), pagination)
            .await
    }

    /// 列出某个域中缓存的记录
    pub async fn list_entries(
        &self,
        name: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CachedEntry>> {
        self.introspection
            .list_entries(&normalize_domain(name), limit)
            .await
    }

    async fn lock(&self, domain: &str) -> Option<OwnedMutexGuard<()>> {
        match &self.locks {
            Some(locks) => locks.acquire(domain).await,
            None => None,
        }
    }
}

/// 根据配置构建注册表
///
/// 配置中的域优先；启用内置目录时，目录中未被配置覆盖的域追加到注册表。
pub fn registry_from_config(
    config: &Config,
    db: Option<&DatabaseConnection>,
) -> Result<DomainRegistry> {
    let scheme = KeyScheme {
        namespace: config.global.key_namespace.clone(),
        version: config.global.key_version,
    };
    let fetch_size = config.source.as_ref().map(|s| s.fetch_size).unwrap_or(1000);

    let mut builder = DomainRegistry::builder(scheme);
    for domain in &config.domains {
        let mut spec = DomainSpec::new(domain.name.clone(), BackendId::parse(&domain.backend))
            .scoped(domain.scoped)
            .composite(domain.composite);
        if let Some(entity_type) = &domain.entity_type {
            spec = spec.entity_type(entity_type.clone());
        }
        if let Some(table) = &domain.source {
            let db = db.ok_or_else(|| {
                CacheError::ConfigError(format!(
                    "Domain '{}' needs a source database connection",
                    domain.name
                ))
            })?;
            spec = spec.source(Arc::new(SqlEntitySource::new(db.clone(), table, fetch_size)?));
        }
        builder = builder.register(spec);
    }

    if config.global.use_builtin_catalog {
        let extra: Vec<DomainSpec> = catalog::builtin_domains()
            .filter(|spec| !builder.is_registered(spec.name()))
            .collect();
        builder = builder.extend(extra);
    }

    builder.build()
}
