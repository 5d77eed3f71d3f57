//! halo-dal：带标记的 SQL 模板编译、条件代数、主从/分库路由与事务内连接管理。

pub mod args;
pub mod bean;
pub mod compiled_sql;
pub mod condition;
pub mod config;
pub mod connections;
#[cfg(test)]
mod connections_tests;
pub mod datasource;
pub mod db_group;
pub mod debug;
pub mod dialect;
pub mod error;
pub mod expression;
pub mod flavor;
pub mod macros;
pub mod mapping;
pub mod marked_sql;
pub mod session;
pub mod sql_manager;
#[cfg(test)]
mod sql_manager_tests;
pub mod sql_type;
pub mod table_condition;
pub mod term;
#[cfg(test)]
mod term_tests;
#[cfg(test)]
mod test_support;
pub mod transaction;
pub mod value;

pub use crate::args::Args;
pub use crate::bean::{BeanAccess, BeanError, Record};
pub use crate::compiled_sql::{BindedCompiledSQL, CompiledSQL, LockMode, PreparedSql, RowLoader};
pub use crate::condition::{ConditionSegment, LogicOperation};
pub use crate::config::{GroupConfig, RouterConfig, SessionConfig};
pub use crate::connections::{ConnectionFetcher, ConnectionsGroup, IsolationSavePointer};
pub use crate::datasource::{Connection, DataSource, ExecutionError, IsolationLevel, Row, Statement};
pub use crate::db_group::{
    DBGroup, DBGroupManager, DatabaseService, EqualityShardRouter, ModuloShardRouter, PhysicsDBGroup,
    ShardRouter, VirtualDBGroup,
};
pub use crate::debug::{DebugService, TracingDebugService};
pub use crate::dialect::Dialect;
pub use crate::error::{CompileError, ConfigError, DaoError, DaoResult};
pub use crate::expression::{PageFlip, SearchExpression};
pub use crate::flavor::Flavor;
pub use crate::mapping::{ObjectMapping, ObjectMappingManager, ShadowTable, SuffixShadow, Table, TableColumn};
pub use crate::marked_sql::MarkedSQL;
pub use crate::session::{ReadApi, ReadSession, ReadonlyTranSession, SessionCore, WriteTranSession};
pub use crate::sql_manager::{BusinessSqls, CompiledSQLManager, PK_PARAM};
pub use crate::sql_type::{ConversionError, SqlDataType};
pub use crate::table_condition::TableCondition;
pub use crate::term::SearchTerm;
pub use crate::transaction::{Env, TransactionManager};
pub use crate::value::SqlValue;
