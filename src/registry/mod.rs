//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了逻辑域注册表。
//!
//! 注册表是逻辑域名到 (物理命名空间, 键前缀, 数据源访问器) 的静态映射表，
//! 启动时构建，之后只读。所有按域的分发都是对这张表的查找。

pub mod catalog;

use crate::backend::BackendId;
use crate::config::domain_name_pattern;
use crate::error::{CacheError, Result};
use crate::source::EntitySource;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 规范编码的键方案，即 `<namespace>:<version>:<EntityType>:<id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyScheme {
    pub namespace: String,
    pub version: u32,
}

impl Default for KeyScheme {
    fn default() -> Self {
        Self {
            namespace: "oi".to_string(),
            version: 1,
        }
    }
}

/// 键编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    /// `oi:1:<EntityType>:<id>`，用于共享默认命名空间的域
    Canonical,
    /// `<domain>_<id>`，用于拥有专用命名空间的域
    Simple,
}

/// 逻辑域描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDescriptor {
    pub name: String,
    pub backend: BackendId,
    pub key_prefix: String,
    /// 预热是否按请求者过滤
    pub scoped: bool,
    /// 是否独占整个专用命名空间（失效时直接清空命名空间）
    pub composite: bool,
}

impl DomainDescriptor {
    pub fn encoding(&self) -> KeyEncoding {
        if self.backend.is_default() {
            KeyEncoding::Canonical
        } else {
            KeyEncoding::Simple
        }
    }
}

/// 注册域时的输入
#[derive(Clone)]
pub struct DomainSpec {
    name: String,
    backend: BackendId,
    entity_type: Option<String>,
    scoped: bool,
    composite: bool,
    source: Option<Arc<dyn EntitySource>>,
}

impl fmt::Debug for DomainSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainSpec")
            .field("name", &self.name)
            .field("backend", &self.backend)
            .field("entity_type", &self.entity_type)
            .field("scoped", &self.scoped)
            .field("composite", &self.composite)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl DomainSpec {
    pub fn new(name: impl Into<String>, backend: BackendId) -> Self {
        Self {
            name: name.into(),
            backend,
            entity_type: None,
            scoped: false,
            composite: false,
            source: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn scoped(mut self, scoped: bool) -> Self {
        self.scoped = scoped;
        self
    }

    pub fn composite(mut self, composite: bool) -> Self {
        self.composite = composite;
        self
    }

    pub fn source(mut self, source: Arc<dyn EntitySource>) -> Self {
        self.source = Some(source);
        self
    }
}

/// 注册表中的一项：描述 + 可选的数据源访问器
#[derive(Clone)]
pub struct DomainEntry {
    descriptor: DomainDescriptor,
    source: Option<Arc<dyn EntitySource>>,
}

impl fmt::Debug for DomainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainEntry")
            .field("descriptor", &self.descriptor)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl DomainEntry {
    pub fn descriptor(&self) -> &DomainDescriptor {
        &self.descriptor
    }

    pub fn source(&self) -> Option<&Arc<dyn EntitySource>> {
        self.source.as_ref()
    }

    pub fn is_preheatable(&self) -> bool {
        self.source.is_some()
    }
}

/// 逻辑域注册表
#[derive(Debug, Clone)]
pub struct DomainRegistry {
    // 按域名排序
    entries: Vec<DomainEntry>,
    index: HashMap<String, usize>,
}

impl DomainRegistry {
    pub fn builder(scheme: KeyScheme) -> RegistryBuilder {
        RegistryBuilder {
            scheme,
            specs: Vec::new(),
        }
    }

    /// 解析域名
    ///
    /// # 返回值
    ///
    /// 域不存在时返回 `UnknownDomain`
    pub fn resolve(&self, name: &str) -> Result<&DomainDescriptor> {
        self.entry(name).map(DomainEntry::descriptor)
    }

    pub fn entry(&self, name: &str) -> Result<&DomainEntry> {
        self.index
            .get(name)
            .map(|&idx| &self.entries[idx])
            .ok_or_else(|| CacheError::UnknownDomain(name.to_string()))
    }

    /// 按稳定顺序（域名字典序）列出所有域，作为内省分页的全集
    pub fn list_domains(&self) -> impl Iterator<Item = &DomainDescriptor> + '_ {
        self.entries.iter().map(DomainEntry::descriptor)
    }

    pub fn entries(&self) -> &[DomainEntry] {
        &self.entries
    }

    pub fn all_domain_names(&self) -> BTreeSet<String> {
        self.index.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 域在 `list_domains` 顺序中的位置
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn composites(&self) -> impl Iterator<Item = &DomainDescriptor> + '_ {
        self.list_domains().filter(|d| d.composite)
    }

    pub fn backends(&self) -> BTreeSet<&BackendId> {
        self.list_domains().map(|d| &d.backend).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 注册表构建器
#[derive(Debug)]
pub struct RegistryBuilder {
    scheme: KeyScheme,
    specs: Vec<DomainSpec>,
}

impl RegistryBuilder {
    pub fn register(mut self, spec: DomainSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn extend(mut self, specs: impl IntoIterator<Item = DomainSpec>) -> Self {
        self.specs.extend(specs);
        self
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.name == name)
    }

    /// 校验并构建注册表
    ///
    /// 重复域名、位于默认命名空间的组合域、与其他域共享命名空间的组合域
    /// 都会在此处失败，而不是等到第一次使用时。
    pub fn build(self) -> Result<DomainRegistry> {
        let RegistryBuilder { scheme, mut specs } = self;
        specs.sort_by(|a, b| a.name.cmp(&b.name));

        let mut index = HashMap::with_capacity(specs.len());
        let mut backend_users: HashMap<BackendId, usize> = HashMap::new();
        for (idx, spec) in specs.iter().enumerate() {
            if !domain_name_pattern().is_match(&spec.name) {
                return Err(CacheError::ConfigError(format!(
                    "Domain name '{}' is not valid",
                    spec.name
                )));
            }
            if index.insert(spec.name.clone(), idx).is_some() {
                return Err(CacheError::ConfigError(format!(
                    "Domain '{}' is registered twice",
                    spec.name
                )));
            }
            if spec.composite && spec.backend.is_default() {
                return Err(CacheError::ConfigError(format!(
                    "Composite domain '{}' must own a dedicated backend",
                    spec.name
                )));
            }
            *backend_users.entry(spec.backend.clone()).or_default() += 1;
        }

        for spec in specs.iter().filter(|s| s.composite) {
            if backend_users.get(&spec.backend).copied().unwrap_or(0) > 1 {
                return Err(CacheError::ConfigError(format!(
                    "Composite domain '{}' shares backend '{}' with other domains",
                    spec.name, spec.backend
                )));
            }
        }

        let entries = specs
            .into_iter()
            .map(|spec| {
                let key_prefix = key_prefix_for(&scheme, &spec)?;
                debug!("Registered domain {} -> {}{{id}}", spec.name, key_prefix);
                Ok(DomainEntry {
                    descriptor: DomainDescriptor {
                        name: spec.name,
                        backend: spec.backend,
                        key_prefix,
                        scoped: spec.scoped,
                        composite: spec.composite,
                    },
                    source: spec.source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        check_prefix_overlap(&entries)?;

        Ok(DomainRegistry { entries, index })
    }
}

/// 同一命名空间中任意两个前缀都不能互为前缀，否则一个域的前缀扫描会命中另一个域的键
fn check_prefix_overlap(entries: &[DomainEntry]) -> Result<()> {
    for (i, a) in entries.iter().enumerate() {
        for b in &entries[i + 1..] {
            let (a, b) = (&a.descriptor, &b.descriptor);
            if a.backend != b.backend {
                continue;
            }
            if a.key_prefix.starts_with(&b.key_prefix) || b.key_prefix.starts_with(&a.key_prefix)
            {
                return Err(CacheError::ConfigError(format!(
                    "Domains '{}' and '{}' overlap on backend '{}' ('{}' vs '{}')",
                    a.name, b.name, a.backend, a.key_prefix, b.key_prefix
                )));
            }
        }
    }
    Ok(())
}

fn key_prefix_for(scheme: &KeyScheme, spec: &DomainSpec) -> Result<String> {
    if !spec.backend.is_default() {
        return Ok(format!("{}_", spec.name));
    }
    let entity_type = spec
        .entity_type
        .clone()
        .unwrap_or_else(|| pascal_case(&spec.name));
    if entity_type.is_empty() || entity_type.contains(':') {
        return Err(CacheError::ConfigError(format!(
            "Domain '{}' has an invalid entity type '{}'",
            spec.name, entity_type
        )));
    }
    Ok(format!(
        "{}:{}:{}:",
        scheme.namespace, scheme.version, entity_type
    ))
}

/// `claim_ded_rem` -> `ClaimDedRem`
pub fn pascal_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
