//! 数据库组：物理组（主库 + 可选从库）与虚拟组（按表条件路由到物理组）。

use crate::config::{GroupConfig, RouterConfig};
use crate::datasource::{Connection, DataSource, ExecutionError};
use crate::error::ConfigError;
use crate::table_condition::TableCondition;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// 一个数据库（一个数据源）。
#[derive(Debug)]
pub struct DatabaseService {
    name: String,
    data_source: Arc<dyn DataSource>,
    available: AtomicBool,
    closed: AtomicBool,
}

impl DatabaseService {
    pub fn new(name: impl Into<String>, data_source: Arc<dyn DataSource>) -> Self {
        Self {
            name: name.into(),
            data_source,
            available: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire)
    }

    /// 标记可用性，例如由外部健康检查调用。
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn get_connection(&self) -> Result<Box<dyn Connection>, ExecutionError> {
        self.data_source.get_connection()
    }

    /// 关闭数据源；已关闭过的返回 `Ok(false)`。
    pub fn close(&self) -> Result<bool, ExecutionError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        self.data_source.close().map(|_| true)
    }
}

#[derive(Debug)]
pub struct PhysicsDBGroup {
    name: String,
    master: Arc<DatabaseService>,
    slave: Option<Arc<DatabaseService>>,
}

impl PhysicsDBGroup {
    pub fn new(name: impl Into<String>, master: Arc<DatabaseService>) -> Self {
        Self {
            name: name.into(),
            master,
            slave: None,
        }
    }

    pub fn with_slave(mut self, slave: Arc<DatabaseService>) -> Self {
        self.slave = Some(slave);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn master(&self) -> &Arc<DatabaseService> {
        &self.master
    }

    pub fn slave(&self) -> Option<&Arc<DatabaseService>> {
        self.slave.as_ref()
    }
}

/// 分库路由：表条件 -> 物理组名。
pub trait ShardRouter: Send + Sync + fmt::Debug {
    fn route(&self, condition: Option<&TableCondition>) -> Option<String>;
}

/// 取 `key` 的值（转为字符串）在路由表中查找，找不到时使用默认组。
#[derive(Debug, Clone, Default)]
pub struct EqualityShardRouter {
    key: String,
    routes: HashMap<String, String>,
    default: Option<String>,
}

impl EqualityShardRouter {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn add_route(mut self, value: impl Into<String>, group: impl Into<String>) -> Self {
        self.routes.insert(value.into(), group.into());
        self
    }

    pub fn default_group(mut self, group: impl Into<String>) -> Self {
        self.default = Some(group.into());
        self
    }
}

impl ShardRouter for EqualityShardRouter {
    fn route(&self, condition: Option<&TableCondition>) -> Option<String> {
        condition
            .and_then(|c| c.get(&self.key))
            .and_then(|v| self.routes.get(&v.to_string()))
            .or(self.default.as_ref())
            .cloned()
    }
}

/// 整数键值对组数取模（结果非负）。
#[derive(Debug, Clone)]
pub struct ModuloShardRouter {
    key: String,
    groups: Vec<String>,
}

impl ModuloShardRouter {
    pub fn new(key: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            key: key.into(),
            groups,
        }
    }
}

impl ShardRouter for ModuloShardRouter {
    fn route(&self, condition: Option<&TableCondition>) -> Option<String> {
        if self.groups.is_empty() {
            return None;
        }
        let v = condition.and_then(|c| c.get(&self.key))?.as_i64()?;
        let idx = v.rem_euclid(self.groups.len() as i64) as usize;
        self.groups.get(idx).cloned()
    }
}

#[derive(Debug)]
pub struct VirtualDBGroup {
    name: String,
    router: Arc<dyn ShardRouter>,
}

impl VirtualDBGroup {
    pub fn new(name: impl Into<String>, router: impl ShardRouter + 'static) -> Self {
        Self {
            name: name.into(),
            router: Arc::new(router),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn route(&self, condition: Option<&TableCondition>) -> Option<String> {
        self.router.route(condition)
    }
}

#[derive(Debug, Clone)]
pub enum DBGroup {
    Physics(Arc<PhysicsDBGroup>),
    Virtual(Arc<VirtualDBGroup>),
}

impl DBGroup {
    pub fn name(&self) -> &str {
        match self {
            Self::Physics(g) => g.name(),
            Self::Virtual(g) => g.name(),
        }
    }
}

/// 组名 -> 数据库组。启动时构建，之后只读共享。
#[derive(Debug, Default)]
pub struct DBGroupManager {
    groups: HashMap<String, DBGroup>,
}

impl DBGroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_physics(&mut self, group: PhysicsDBGroup) -> &mut Self {
        self.groups
            .insert(group.name.clone(), DBGroup::Physics(Arc::new(group)));
        self
    }

    pub fn add_virtual(&mut self, group: VirtualDBGroup) -> &mut Self {
        self.groups
            .insert(group.name.clone(), DBGroup::Virtual(Arc::new(group)));
        self
    }

    pub fn get_group(&self, name: &str) -> Result<&DBGroup, ConfigError> {
        self.groups
            .get(name)
            .ok_or_else(|| ConfigError::UnknownGroup(name.to_string()))
    }

    pub fn get_physics_group(&self, name: &str) -> Result<Arc<PhysicsDBGroup>, ConfigError> {
        match self.get_group(name)? {
            DBGroup::Physics(g) => Ok(Arc::clone(g)),
            DBGroup::Virtual(_) => Err(ConfigError::WrongGroupKind {
                name: name.to_string(),
                expected: "physics",
            }),
        }
    }

    pub fn get_virtual_group(&self, name: &str) -> Result<Arc<VirtualDBGroup>, ConfigError> {
        match self.get_group(name)? {
            DBGroup::Virtual(g) => Ok(Arc::clone(g)),
            DBGroup::Physics(_) => Err(ConfigError::WrongGroupKind {
                name: name.to_string(),
                expected: "virtual",
            }),
        }
    }

    /// 解析到物理组：虚拟组按表条件路由。
    pub fn resolve(
        &self,
        name: &str,
        condition: Option<&TableCondition>,
    ) -> Result<Arc<PhysicsDBGroup>, ConfigError> {
        match self.get_group(name)? {
            DBGroup::Physics(g) => Ok(Arc::clone(g)),
            DBGroup::Virtual(g) => {
                let target = g.route(condition).ok_or_else(|| ConfigError::NoShardMatch {
                    group: name.to_string(),
                    condition: condition.map_or_else(|| "{}".to_string(), ToString::to_string),
                })?;
                self.get_physics_group(&target)
            }
        }
    }

    /// 按配置构建；同名数据源在各组之间共享同一个 `DatabaseService`。
    pub fn from_config(
        groups: &[GroupConfig],
        data_sources: &HashMap<String, Arc<dyn DataSource>>,
    ) -> Result<Self, ConfigError> {
        let mut services: HashMap<String, Arc<DatabaseService>> = HashMap::new();
        let mut service = |name: &str| -> Result<Arc<DatabaseService>, ConfigError> {
            if let Some(s) = services.get(name) {
                return Ok(Arc::clone(s));
            }
            let ds = data_sources
                .get(name)
                .ok_or_else(|| ConfigError::UnknownDataSource(name.to_string()))?;
            let s = Arc::new(DatabaseService::new(name, Arc::clone(ds)));
            services.insert(name.to_string(), Arc::clone(&s));
            Ok(s)
        };

        let mut manager = Self::new();
        for group in groups {
            match group {
                GroupConfig::Physics {
                    name,
                    master,
                    slave,
                } => {
                    let mut g = PhysicsDBGroup::new(name.clone(), service(master)?);
                    if let Some(slave) = slave {
                        g = g.with_slave(service(slave)?);
                    }
                    manager.add_physics(g);
                }
                GroupConfig::Virtual { name, router } => {
                    let g = match router {
                        RouterConfig::Equality {
                            key,
                            routes,
                            default,
                        } => {
                            let mut r = EqualityShardRouter::new(key.clone());
                            for (value, target) in routes {
                                r = r.add_route(value.clone(), target.clone());
                            }
                            if let Some(d) = default {
                                r = r.default_group(d.clone());
                            }
                            VirtualDBGroup::new(name.clone(), r)
                        }
                        RouterConfig::Modulo { key, groups } => {
                            VirtualDBGroup::new(name.clone(), ModuloShardRouter::new(key.clone(), groups.clone()))
                        }
                    };
                    manager.add_virtual(g);
                }
            }
        }
        info!(groups = manager.groups.len(), "db groups loaded");
        Ok(manager)
    }

    /// 关闭所有主从库，每个数据源只关闭一次；单个失败只记录日志。
    pub fn shutdown(&self) {
        for group in self.groups.values() {
            let DBGroup::Physics(g) = group else {
                continue;
            };
            for db in std::iter::once(&g.master).chain(g.slave.iter()) {
                match db.close() {
                    Ok(true) => info!(group = g.name(), database = db.name(), "database closed"),
                    Ok(false) => {}
                    Err(e) => warn!(group = g.name(), database = db.name(), "failed to close database: {e}"),
                }
            }
        }
    }
}
