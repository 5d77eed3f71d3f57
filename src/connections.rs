//! ConnectionsGroup：一个事务内的连接缓存，每个物理组最多一个连接。
//!
//! 连接在第一次使用时获取，`close` 时统一释放，且只释放一次。
//! 隔离级别的修改以保存点的形式入栈，可以回退到任意保存点。

use crate::datasource::{Connection, ExecutionError, IsolationLevel};
use crate::db_group::{DatabaseService, PhysicsDBGroup};
use crate::error::{ConfigError, DaoError};
use std::sync::Arc;
use tracing::{debug, warn};

/// 选择主库还是从库。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFetcher {
    /// 允许延迟读：优先使用可用的从库，否则主库。
    DelayedRead,
    /// 实时读：总是主库。
    NoDelayRead,
    /// 写：总是主库，主库不可用时报错。获取连接时设置 auto commit。
    Write { auto_commit: bool },
}

impl ConnectionFetcher {
    pub fn pick(&self, group: &PhysicsDBGroup) -> Result<Arc<DatabaseService>, ConfigError> {
        match self {
            Self::DelayedRead => Ok(Arc::clone(
                group
                    .slave()
                    .filter(|s| s.is_available())
                    .unwrap_or(group.master()),
            )),
            Self::NoDelayRead => Ok(Arc::clone(group.master())),
            Self::Write { .. } => {
                if group.master().is_available() {
                    Ok(Arc::clone(group.master()))
                } else {
                    Err(ConfigError::MasterUnavailable(group.name().to_string()))
                }
            }
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

/// `set_transaction_isolation` 返回的保存点。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationSavePointer {
    depth: usize,
}

#[derive(Debug)]
struct HeldConnection {
    group: String,
    conn: Box<dyn Connection>,
    /// 第一次修改隔离级别前的级别。
    original_isolation: Option<IsolationLevel>,
}

impl HeldConnection {
    fn apply_isolation(&mut self, level: Option<IsolationLevel>) -> Result<(), ExecutionError> {
        match level {
            Some(level) => {
                if self.original_isolation.is_none() {
                    self.original_isolation = Some(self.conn.transaction_isolation()?);
                }
                self.conn.set_transaction_isolation(level)
            }
            None => match self.original_isolation.take() {
                Some(original) => self.conn.set_transaction_isolation(original),
                None => Ok(()),
            },
        }
    }
}

#[derive(Debug)]
pub struct ConnectionsGroup {
    fetcher: ConnectionFetcher,
    connections: Vec<HeldConnection>,
    /// 每个保存点之前生效的隔离级别。
    isolation_stack: Vec<Option<IsolationLevel>>,
    current_isolation: Option<IsolationLevel>,
    closed: bool,
}

impl ConnectionsGroup {
    pub fn new(fetcher: ConnectionFetcher) -> Self {
        Self {
            fetcher,
            connections: Vec::new(),
            isolation_stack: Vec::new(),
            current_isolation: None,
            closed: false,
        }
    }

    pub fn fetcher(&self) -> ConnectionFetcher {
        self.fetcher
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 已持有的连接数。
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// 取该物理组的连接，没有则按 fetcher 获取一个并缓存。
    pub fn get_connection(&mut self, group: &PhysicsDBGroup) -> Result<&mut dyn Connection, DaoError> {
        if self.closed {
            return Err(ExecutionError::new("connections group is already closed").into());
        }

        let idx = match self.connections.iter().position(|c| c.group == group.name()) {
            Some(idx) => idx,
            None => {
                let held = self.acquire(group)?;
                self.connections.push(held);
                self.connections.len() - 1
            }
        };
        Ok(self.connections[idx].conn.as_mut())
    }

    fn acquire(&self, group: &PhysicsDBGroup) -> Result<HeldConnection, DaoError> {
        let db = self.fetcher.pick(group)?;
        let conn = db.get_connection()?;
        let mut held = HeldConnection {
            group: group.name().to_string(),
            conn,
            original_isolation: None,
        };

        let mut prepare = || -> Result<(), ExecutionError> {
            if let ConnectionFetcher::Write { auto_commit } = self.fetcher {
                held.conn.set_auto_commit(auto_commit)?;
            }
            if self.current_isolation.is_some() {
                held.apply_isolation(self.current_isolation)?;
            }
            Ok(())
        };
        if let Err(e) = prepare() {
            if let Err(close_err) = held.conn.close() {
                warn!(group = group.name(), "failed to release connection: {close_err}");
            }
            return Err(e.into());
        }

        debug!(group = group.name(), database = db.name(), "connection acquired");
        Ok(held)
    }

    /// 提交全部连接；全部尝试后返回第一个错误。
    pub fn commit(&mut self) -> Result<(), ExecutionError> {
        self.for_each_connection("commit", |c| c.commit())
    }

    /// 回滚全部连接；全部尝试后返回第一个错误。
    pub fn rollback(&mut self) -> Result<(), ExecutionError> {
        self.for_each_connection("rollback", |c| c.rollback())
    }

    fn for_each_connection(
        &mut self,
        action: &str,
        mut f: impl FnMut(&mut dyn Connection) -> Result<(), ExecutionError>,
    ) -> Result<(), ExecutionError> {
        let mut first_err = None;
        for held in &mut self.connections {
            if let Err(e) = f(held.conn.as_mut()) {
                warn!(group = held.group.as_str(), "{action} failed: {e}");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// 修改所有连接（包括之后获取的连接）的隔离级别，返回保存点。
    pub fn set_transaction_isolation(&mut self, level: IsolationLevel) -> Result<IsolationSavePointer, ExecutionError> {
        self.isolation_stack.push(self.current_isolation);
        let pointer = IsolationSavePointer {
            depth: self.isolation_stack.len(),
        };
        self.current_isolation = Some(level);
        self.apply_current_isolation()?;
        Ok(pointer)
    }

    /// 恢复到 `pointer` 对应的 `set` 之前的级别，之后的保存点一并丢弃。
    pub fn reset_transaction_isolation_to(&mut self, pointer: IsolationSavePointer) -> Result<(), ExecutionError> {
        if pointer.depth == 0 || pointer.depth > self.isolation_stack.len() {
            return Ok(());
        }
        let previous = self.isolation_stack[pointer.depth - 1];
        self.isolation_stack.truncate(pointer.depth - 1);
        self.current_isolation = previous;
        self.apply_current_isolation()
    }

    pub fn reset_transaction_isolation_to_last_save_pointer(&mut self) -> Result<(), ExecutionError> {
        let depth = self.isolation_stack.len();
        self.reset_transaction_isolation_to(IsolationSavePointer { depth })
    }

    pub fn is_isolation_level_changed(&self) -> bool {
        self.current_isolation.is_some()
    }

    fn apply_current_isolation(&mut self) -> Result<(), ExecutionError> {
        let level = self.current_isolation;
        let mut first_err = None;
        for held in &mut self.connections {
            if let Err(e) = held.apply_isolation(level) {
                warn!(group = held.group.as_str(), "failed to change transaction isolation: {e}");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// 释放所有连接，只执行一次。失败记录日志并返回，不会中断其它连接的释放。
    pub fn close(&mut self) -> Vec<ExecutionError> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;

        let mut errors = Vec::new();
        for mut held in self.connections.drain(..) {
            if let Err(e) = held.apply_isolation(None) {
                warn!(group = held.group.as_str(), "failed to restore transaction isolation: {e}");
            }
            let group = std::mem::take(&mut held.group);
            if let Err(e) = held.conn.close() {
                warn!(group = group.as_str(), "failed to release connection: {e}");
                errors.push(e);
            }
        }
        self.isolation_stack.clear();
        self.current_isolation = None;
        errors
    }
}

impl Drop for ConnectionsGroup {
    fn drop(&mut self) {
        if !self.closed {
            if !self.connections.is_empty() {
                warn!(connections = self.connections.len(), "connections group dropped without close");
            }
            self.close();
        }
    }
}
