//! 测试用的内存数据源：记录执行过的语句与连接事件，查询结果按顺序预设。

use crate::config::SessionConfig;
use crate::datasource::{Connection, DataSource, ExecutionError, IsolationLevel, Row, Statement};
use crate::db_group::{DBGroupManager, DatabaseService, PhysicsDBGroup, VirtualDBGroup, ModuloShardRouter};
use crate::dialect::Dialect;
use crate::flavor::Flavor;
use crate::mapping::{ObjectMapping, ObjectMappingManager, SuffixShadow, Table, TableColumn};
use crate::sql_manager::CompiledSQLManager;
use crate::sql_type::SqlDataType;
use crate::transaction::TransactionManager;
use crate::value::SqlValue;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub(crate) struct MockState {
    /// (数据库名, 语句)
    executed: Vec<(String, Statement)>,
    events: Vec<String>,
    results: VecDeque<Vec<Row>>,
    update_counts: VecDeque<u64>,
    fail_sql: Option<String>,
    fail_close: Vec<String>,
    fail_commit: Vec<String>,
    fail_connect: Vec<String>,
    fail_shutdown: Vec<String>,
}

/// 多个数据源共享的记录器。
#[derive(Debug, Clone, Default)]
pub(crate) struct Mock {
    state: Arc<Mutex<MockState>>,
}

impl Mock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn data_source(&self, name: &str) -> Arc<dyn DataSource> {
        Arc::new(MockDataSource {
            name: name.to_string(),
            mock: self.clone(),
        })
    }

    pub(crate) fn service(&self, name: &str) -> Arc<DatabaseService> {
        Arc::new(DatabaseService::new(name, self.data_source(name)))
    }

    /// 下一次查询返回的行。
    pub(crate) fn push_rows(&self, rows: Vec<Row>) {
        self.lock().results.push_back(rows);
    }

    pub(crate) fn push_update_count(&self, count: u64) {
        self.lock().update_counts.push_back(count);
    }

    /// 语句包含 `fragment` 时执行失败。
    pub(crate) fn fail_sql_containing(&self, fragment: &str) {
        self.lock().fail_sql = Some(fragment.to_string());
    }

    pub(crate) fn fail_close(&self, db: &str) {
        self.lock().fail_close.push(db.to_string());
    }

    pub(crate) fn fail_commit(&self, db: &str) {
        self.lock().fail_commit.push(db.to_string());
    }

    pub(crate) fn fail_connect(&self, db: &str) {
        self.lock().fail_connect.push(db.to_string());
    }

    pub(crate) fn fail_shutdown(&self, db: &str) {
        self.lock().fail_shutdown.push(db.to_string());
    }

    pub(crate) fn executed(&self) -> Vec<(String, Statement)> {
        self.lock().executed.clone()
    }

    pub(crate) fn executed_sql(&self) -> Vec<String> {
        self.lock().executed.iter().map(|(_, s)| s.sql.clone()).collect()
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    fn event(&self, event: String) {
        self.lock().events.push(event);
    }
}

#[derive(Debug)]
struct MockDataSource {
    name: String,
    mock: Mock,
}

impl DataSource for MockDataSource {
    fn get_connection(&self) -> Result<Box<dyn Connection>, ExecutionError> {
        if self.mock.lock().fail_connect.contains(&self.name) {
            return Err(ExecutionError::new(format!("cannot connect to {}", self.name)));
        }
        self.mock.event(format!("{}:open", self.name));
        Ok(Box::new(MockConnection {
            db: self.name.clone(),
            mock: self.mock.clone(),
            isolation: IsolationLevel::ReadCommitted,
        }))
    }

    fn close(&self) -> Result<(), ExecutionError> {
        if self.mock.lock().fail_shutdown.contains(&self.name) {
            return Err(ExecutionError::new(format!("shutdown failed on {}", self.name)));
        }
        self.mock.event(format!("{}:shutdown", self.name));
        Ok(())
    }
}

#[derive(Debug)]
struct MockConnection {
    db: String,
    mock: Mock,
    isolation: IsolationLevel,
}

impl MockConnection {
    fn record(&self, stmt: &Statement) -> Result<(), ExecutionError> {
        let mut state = self.mock.lock();
        state.executed.push((self.db.clone(), stmt.clone()));
        match &state.fail_sql {
            Some(fragment) if stmt.sql.contains(fragment.as_str()) => {
                Err(ExecutionError::new("syntax error").with_code(1064, "42000"))
            }
            _ => Ok(()),
        }
    }
}

impl Connection for MockConnection {
    fn query(&mut self, stmt: &Statement) -> Result<Vec<Row>, ExecutionError> {
        self.record(stmt)?;
        Ok(self.mock.lock().results.pop_front().unwrap_or_default())
    }

    fn execute_update(&mut self, stmt: &Statement) -> Result<u64, ExecutionError> {
        self.record(stmt)?;
        Ok(self.mock.lock().update_counts.pop_front().unwrap_or(1))
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), ExecutionError> {
        self.mock.event(format!("{}:auto_commit={auto_commit}", self.db));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ExecutionError> {
        if self.mock.lock().fail_commit.contains(&self.db) {
            return Err(ExecutionError::new(format!("commit failed on {}", self.db)));
        }
        self.mock.event(format!("{}:commit", self.db));
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ExecutionError> {
        self.mock.event(format!("{}:rollback", self.db));
        Ok(())
    }

    fn transaction_isolation(&self) -> Result<IsolationLevel, ExecutionError> {
        Ok(self.isolation)
    }

    fn set_transaction_isolation(&mut self, level: IsolationLevel) -> Result<(), ExecutionError> {
        self.isolation = level;
        self.mock.event(format!("{}:isolation={level:?}", self.db));
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), ExecutionError> {
        if self.mock.lock().fail_close.contains(&self.db) {
            return Err(ExecutionError::new(format!("close failed on {}", self.db)));
        }
        self.mock.event(format!("{}:close", self.db));
        Ok(())
    }
}

pub(crate) fn row(columns: &[&str], values: Vec<SqlValue>) -> Row {
    Row::new(columns.iter().map(|c| c.to_string()).collect(), values)
}

/// 文章：`TB_ARTICLE`，位于 `default` 组。
pub(crate) fn article_mapping(dialect: Arc<Dialect>) -> ObjectMapping {
    let table = Table::new("TB_ARTICLE", dialect)
        .column(TableColumn::new("id", "id", SqlDataType::Int))
        .column(TableColumn::new("title", "NAME", SqlDataType::String))
        .column(TableColumn::new("content", "DESCRIPTION", SqlDataType::String))
        .column(TableColumn::new("createdTime", "createdTime", SqlDataType::DateTime))
        .pk("id");
    ObjectMapping::new("article", "default", table)
}

/// 用户：带乐观锁版本列。
pub(crate) fn user_mapping(dialect: Arc<Dialect>) -> ObjectMapping {
    let table = Table::new("TB_USER", dialect)
        .column(TableColumn::new("id", "pk", SqlDataType::Int))
        .column(TableColumn::new("userName", "userName", SqlDataType::String))
        .column(TableColumn::new("vipPoints", "VIP_POINTS", SqlDataType::Int))
        .column(TableColumn::new("version", "version", SqlDataType::Int))
        .pk("id")
        .version("version");
    ObjectMapping::new("user", "default", table)
}

/// 评论：按 `userId` 分表，位于按 `userId` 取模分库的虚拟组。
pub(crate) fn comment_mapping(dialect: Arc<Dialect>) -> ObjectMapping {
    let table = Table::new("TB_COMMENT", dialect)
        .column(TableColumn::new("id", "id", SqlDataType::Int))
        .column(TableColumn::new("userId", "userId", SqlDataType::Int))
        .column(TableColumn::new("content", "DESCRIPTION", SqlDataType::String))
        .pk("id")
        .shadow(SuffixShadow::new("userId"));
    ObjectMapping::new("comment", "comments", table)
}

pub(crate) fn mappings(flavor: Flavor) -> Arc<ObjectMappingManager> {
    let dialect = Arc::new(Dialect::new(flavor));
    let mut m = ObjectMappingManager::new();
    m.register(article_mapping(Arc::clone(&dialect)));
    m.register(user_mapping(Arc::clone(&dialect)));
    m.register(comment_mapping(dialect));
    Arc::new(m)
}

/// 组：`default`（master + slave），`comment1` / `comment2`，虚拟组 `comments`。
pub(crate) fn groups(mock: &Mock) -> DBGroupManager {
    let mut groups = DBGroupManager::new();
    groups
        .add_physics(PhysicsDBGroup::new("default", mock.service("master")).with_slave(mock.service("slave")))
        .add_physics(PhysicsDBGroup::new("comment1", mock.service("c1")))
        .add_physics(PhysicsDBGroup::new("comment2", mock.service("c2")))
        .add_virtual(VirtualDBGroup::new(
            "comments",
            ModuloShardRouter::new("userId", vec!["comment1".to_string(), "comment2".to_string()]),
        ));
    groups
}

pub(crate) fn sql_manager(flavor: Flavor) -> CompiledSQLManager {
    CompiledSQLManager::new(mappings(flavor)).unwrap()
}

pub(crate) fn transaction_manager(mock: &Mock, flavor: Flavor) -> TransactionManager {
    transaction_manager_with(mock, sql_manager(flavor), SessionConfig::default())
}

pub(crate) fn transaction_manager_with(mock: &Mock, sqls: CompiledSQLManager, config: SessionConfig) -> TransactionManager {
    TransactionManager::new(Arc::new(sqls), Arc::new(groups(mock)), config)
}
