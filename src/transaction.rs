//! TransactionManager：持有启动时构建好的注册表，负责打开会话。

use crate::config::SessionConfig;
use crate::connections::{ConnectionFetcher, ConnectionsGroup};
use crate::db_group::DBGroupManager;
use crate::debug::{DebugService, TracingDebugService};
use crate::mapping::ObjectMappingManager;
use crate::session::{ReadonlyTranSession, SessionCore, WriteTranSession};
use crate::sql_manager::CompiledSQLManager;
use crate::table_condition::TableCondition;
use std::sync::Arc;
use tracing::info;

/// 会话共享的只读环境。
#[derive(Debug)]
pub struct Env {
    pub(crate) sqls: Arc<CompiledSQLManager>,
    pub(crate) groups: Arc<DBGroupManager>,
    pub(crate) debug: Arc<dyn DebugService>,
    pub(crate) config: SessionConfig,
}

impl Env {
    pub fn mappings(&self) -> &Arc<ObjectMappingManager> {
        self.sqls.mappings()
    }

    pub fn sqls(&self) -> &Arc<CompiledSQLManager> {
        &self.sqls
    }

    pub fn groups(&self) -> &Arc<DBGroupManager> {
        &self.groups
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[derive(Debug, Clone)]
pub struct TransactionManager {
    env: Arc<Env>,
    default_table_condition: Option<TableCondition>,
}

impl TransactionManager {
    /// 使用 `tracing` 输出 SQL 日志。
    pub fn new(sqls: Arc<CompiledSQLManager>, groups: Arc<DBGroupManager>, config: SessionConfig) -> Self {
        let debug = Arc::new(TracingDebugService::from_config(&config));
        Self::with_debug_service(sqls, groups, config, debug)
    }

    pub fn with_debug_service(
        sqls: Arc<CompiledSQLManager>,
        groups: Arc<DBGroupManager>,
        config: SessionConfig,
        debug: Arc<dyn DebugService>,
    ) -> Self {
        Self {
            env: Arc::new(Env {
                sqls,
                groups,
                debug,
                config,
            }),
            default_table_condition: None,
        }
    }

    /// 之后打开的会话默认使用的表条件。
    pub fn set_default_table_condition(&mut self, condition: Option<TableCondition>) -> &mut Self {
        self.default_table_condition = condition;
        self
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    fn core(&self, fetcher: ConnectionFetcher) -> SessionCore {
        SessionCore::new(
            Arc::clone(&self.env),
            ConnectionsGroup::new(fetcher),
            self.default_table_condition.clone(),
        )
    }

    /// 只读会话，允许从从库读取（数据可能有延迟）。
    pub fn open_delay_read_tran(&self) -> ReadonlyTranSession {
        ReadonlyTranSession::new(self.core(ConnectionFetcher::DelayedRead))
    }

    /// 只读会话，总是读主库。
    pub fn open_no_delay_read_tran(&self) -> ReadonlyTranSession {
        ReadonlyTranSession::new(self.core(ConnectionFetcher::NoDelayRead))
    }

    /// 读写会话，`auto_commit` 为 false 时需要显式 `commit`。
    pub fn open_rw_tran(&self, auto_commit: bool) -> WriteTranSession {
        WriteTranSession::new(self.core(ConnectionFetcher::Write { auto_commit }))
    }

    /// 关闭所有数据库组的数据源。
    pub fn shutdown(&self) {
        info!("shutting down db groups");
        self.env.groups.shutdown();
    }
}
