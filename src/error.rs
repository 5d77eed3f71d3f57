//! 错误类型：配置、编译两类错误定义在这里，`DaoError` 汇总全部错误。
//!
//! 执行错误见 `datasource::ExecutionError`，值转换错误见 `sql_type::ConversionError`，
//! 属性读写错误见 `bean::BeanError`。

use crate::bean::BeanError;
use crate::datasource::ExecutionError;
use crate::sql_type::ConversionError;

/// 配置错误：注册表中找不到、类型不符、路由不到等。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown db group: {0}")]
    UnknownGroup(String),
    #[error("db group [{name}] is not a {expected} group")]
    WrongGroupKind { name: String, expected: &'static str },
    #[error("virtual db group [{group}] has no physical group for table condition {condition}")]
    NoShardMatch { group: String, condition: String },
    #[error("mapping not found: {0}")]
    MappingNotFound(String),
    #[error("master database of group [{0}] is not available")]
    MasterUnavailable(String),
    #[error("compiled sql not found: {0}")]
    SqlNotFound(String),
    #[error("table [{table}] requires table condition key [{key}]")]
    MissingTableCondition { table: String, key: String },
    #[error("table condition key [{key}] of table [{table}] has an invalid value [{value}]")]
    InvalidTableCondition { table: String, key: String, value: String },
    #[error("business [{0}] has no primary key")]
    NoPrimaryKey(String),
    #[error("unknown data source: {0}")]
    UnknownDataSource(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// 编译错误：模板、条件文本、参数绑定。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("business [{business}] has no property [{prop}]")]
    UnknownProperty { business: String, prop: String },
    #[error("unknown parameter: {0}")]
    UnknownParam(String),
    #[error("parameter [{0}] is not bound")]
    ParamNotBound(String),
    #[error(
        "invalid operator:[{0}]. operator must be one of the [!=, ~~, =~=, ~=, <>, ==, =, >, <, >=, <=]"
    )]
    InvalidOperator(String),
    #[error("unbalanced directive in sql: {0}")]
    UnbalancedDirective(String),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// 数据访问层对外的统一错误。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DaoError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Bean(#[from] BeanError),
    #[error("record not found. sql: {sql}, params: {params}")]
    NotFound { sql: String, params: String },
}

impl From<ConversionError> for DaoError {
    fn from(e: ConversionError) -> Self {
        Self::Compile(CompileError::Conversion(e))
    }
}

impl DaoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type DaoResult<T> = Result<T, DaoError>;
