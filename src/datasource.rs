//! DataSource / Connection：驱动层能力接口。
//!
//! 本 crate 只负责生成语句、路由和管理事务内连接，真正的网络 IO 由调用方实现这两个 trait。

use crate::value::SqlValue;
use std::fmt;
use std::time::Duration;

/// 驱动返回的执行错误，保留厂商错误码、SQL state 与出错语句。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sql execution failed (code: {code}, state: {sql_state}): {message}. sql: {sql}")]
pub struct ExecutionError {
    pub code: i32,
    pub sql_state: String,
    pub message: String,
    pub sql: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            sql_state: String::new(),
            message: message.into(),
            sql: String::new(),
        }
    }

    pub fn with_code(mut self, code: i32, sql_state: impl Into<String>) -> Self {
        self.code = code;
        self.sql_state = sql_state.into();
        self
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = sql.into();
        self
    }
}

/// 事务隔离级别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// 一条待执行的语句：占位符已按方言写好，参数按出现顺序排列。
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub timeout: Option<Duration>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// 结果行，列名按大小写不敏感查找。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }

    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 一个物理连接。会话独占使用，`close` 消耗自身，保证只释放一次。
pub trait Connection: Send + fmt::Debug {
    fn query(&mut self, stmt: &Statement) -> Result<Vec<Row>, ExecutionError>;

    /// 返回受影响的行数。
    fn execute_update(&mut self, stmt: &Statement) -> Result<u64, ExecutionError>;

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), ExecutionError>;

    fn commit(&mut self) -> Result<(), ExecutionError>;

    fn rollback(&mut self) -> Result<(), ExecutionError>;

    fn transaction_isolation(&self) -> Result<IsolationLevel, ExecutionError>;

    fn set_transaction_isolation(&mut self, level: IsolationLevel) -> Result<(), ExecutionError>;

    fn close(self: Box<Self>) -> Result<(), ExecutionError>;
}

/// 连接来源（连接池、单连接工厂等），在多个线程间共享。
pub trait DataSource: Send + Sync + fmt::Debug {
    fn get_connection(&self) -> Result<Box<dyn Connection>, ExecutionError>;

    /// 关闭数据源，由 `DBGroupManager::shutdown` 调用一次。
    fn close(&self) -> Result<(), ExecutionError> {
        Ok(())
    }
}
