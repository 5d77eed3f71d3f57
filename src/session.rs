//! 会话：只读事务、读写事务，以及从读写事务借出的只读句柄。
//!
//! 执行流程：映射 -> 数据库组（虚拟组按表条件路由）-> 事务内缓存的连接 ->
//! 锁子句 -> 分页改写 -> 执行 -> 结果行映射。
//! 表条件优先使用本次调用指定的，否则用会话默认值。

use crate::args::Args;
use crate::bean::{BeanAccess, Record};
use crate::compiled_sql::{BindedCompiledSQL, LockMode};
use crate::connections::{ConnectionsGroup, IsolationSavePointer};
use crate::datasource::{Connection, ExecutionError, IsolationLevel, Row, Statement};
use crate::db_group::PhysicsDBGroup;
use crate::debug::{DebugService, format_params};
use crate::error::{CompileError, ConfigError, DaoError, DaoResult};
use crate::expression::{MAX_OFFSET, PageFlip, SearchExpression};
use crate::mapping::ObjectMapping;
use crate::marked_sql::MarkedSQL;
use crate::sql_manager::PK_PARAM;
use crate::table_condition::TableCondition;
use crate::transaction::Env;
use crate::value::SqlValue;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
enum Lowering {
    Load,
    Count,
    Delete,
}

fn pk_prop_of(mapping: &ObjectMapping) -> Result<String, ConfigError> {
    mapping
        .table()
        .pk_column()
        .map(|c| c.prop().to_string())
        .ok_or_else(|| ConfigError::NoPrimaryKey(mapping.business().to_string()))
}

fn attach_sql(mut e: ExecutionError, sql: &str) -> ExecutionError {
    if e.sql.is_empty() {
        e.sql = sql.to_string();
    }
    e
}

fn not_found(stmt: &Statement) -> DaoError {
    DaoError::NotFound {
        sql: stmt.sql.clone(),
        params: format_params(&stmt.params),
    }
}

fn first_cell(rows: &[Row]) -> Option<SqlValue> {
    rows.first().and_then(|r| r.get_index(0)).cloned()
}

/// 会话状态：共享环境 + 本事务的连接 + 默认表条件。
#[derive(Debug)]
pub struct SessionCore {
    env: Arc<Env>,
    connections: ConnectionsGroup,
    default_condition: Option<TableCondition>,
}

impl SessionCore {
    pub(crate) fn new(env: Arc<Env>, connections: ConnectionsGroup, default_condition: Option<TableCondition>) -> Self {
        Self {
            env,
            connections,
            default_condition,
        }
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn connections(&self) -> &ConnectionsGroup {
        &self.connections
    }

    pub fn default_table_condition(&self) -> Option<&TableCondition> {
        self.default_condition.as_ref()
    }

    fn lower(&self, se: &SearchExpression, lowering: Lowering) -> DaoResult<BindedCompiledSQL> {
        let mappings = self.env.mappings();
        let mapping = mappings.get(se.business())?;
        let mut args = Args::new();
        let marked: MarkedSQL = match lowering {
            Lowering::Load => se.to_load_records_marked_sql(&mapping, &mut args)?,
            Lowering::Count => se.to_compute_record_number_sql(&mapping, &mut args)?,
            Lowering::Delete => se.to_delete_record_sql(&mapping, &mut args)?,
        };
        // 值已在渲染条件时按列类型转换过，这里原样绑定
        let compiled = Arc::new(marked.compile(mappings)?);
        let mut bsql = compiled
            .bind_map(args.params().iter().map(|(k, v)| (k, v.clone())))?
            .with_lock_mode(se.lock_mode());
        if let Some(condition) = se.table_condition() {
            bsql = bsql.with_table_condition(condition.clone());
        }
        Ok(bsql)
    }

    fn statement_for(
        &self,
        bsql: &BindedCompiledSQL,
        paging: Option<(usize, usize)>,
    ) -> DaoResult<(Arc<PhysicsDBGroup>, Statement)> {
        let default = self.default_condition.as_ref();
        let mapping = bsql.mapping();
        let group = self
            .env
            .groups
            .resolve(mapping.db_group(), bsql.effective_condition(default))?;
        let prepared = bsql.prepare(default)?;

        let dialect = mapping.dialect();
        let mut sql = match bsql.lock_mode() {
            LockMode::None => prepared.sql,
            LockMode::Upgrade => dialect.for_update_string(&prepared.sql),
            LockMode::UpgradeNowait => dialect.for_update_no_wait_string(&prepared.sql),
        };
        if let Some((offset, limit)) = paging {
            sql = dialect.limited_string(&sql, offset, limit);
        }
        let stmt = Statement::new(sql, prepared.params).with_timeout(self.env.config.query_timeout());
        Ok((group, stmt))
    }

    fn execute<T>(
        &mut self,
        group: &PhysicsDBGroup,
        stmt: &Statement,
        run: impl FnOnce(&mut dyn Connection, &Statement) -> Result<T, ExecutionError>,
    ) -> DaoResult<T> {
        let debug_service: Arc<dyn DebugService> = Arc::clone(&self.env.debug);
        let conn = self.connections.get_connection(group)?;
        let started = debug_service.is_measure_time().then(Instant::now);
        let result = run(conn, stmt);
        if debug_service.is_log_sql() {
            debug_service.log_sql(&stmt.sql, &stmt.params, started.map(|s| s.elapsed()));
        }
        result.map_err(|e| attach_sql(e, &stmt.sql).into())
    }

    fn fetch_rows(
        &mut self,
        bsql: &BindedCompiledSQL,
        paging: Option<(usize, usize)>,
    ) -> DaoResult<(Statement, Vec<Row>)> {
        let (group, stmt) = self.statement_for(bsql, paging)?;
        let rows = self.execute(&group, &stmt, |c, s| c.query(s))?;
        Ok((stmt, rows))
    }

    fn fetch_records(&mut self, bsql: &BindedCompiledSQL, paging: Option<(usize, usize)>) -> DaoResult<Vec<Record>> {
        let (_, rows) = self.fetch_rows(bsql, paging)?;
        rows.iter().map(|r| bsql.load_row(r)).collect()
    }

    fn fetch_one(&mut self, bsql: &BindedCompiledSQL) -> DaoResult<Option<Record>> {
        let (stmt, rows) = self.fetch_rows(bsql, Some((0, 1)))?;
        match rows.first() {
            Some(row) => bsql.load_row(row).map(Some),
            None if bsql.is_exception_on_no_record_found() => Err(not_found(&stmt)),
            None => Ok(None),
        }
    }

    fn fetch_cell(&mut self, bsql: &BindedCompiledSQL) -> DaoResult<Option<SqlValue>> {
        let (stmt, rows) = self.fetch_rows(bsql, None)?;
        match first_cell(&rows) {
            Some(v) => match bsql.result_type() {
                Some(t) if !v.is_null() => Ok(Some(t.coerce(v)?)),
                _ => Ok(Some(v)),
            },
            None if bsql.is_exception_on_no_record_found() => Err(not_found(&stmt)),
            None => Ok(None),
        }
    }

    fn update_rows(&mut self, bsql: &BindedCompiledSQL) -> DaoResult<u64> {
        let (group, stmt) = self.statement_for(bsql, None)?;
        self.execute(&group, &stmt, |c, s| c.execute_update(s))
    }
}

/// 读操作。只读事务、读写事务和借出的 `ReadApi` 共用。
pub trait ReadSession {
    fn core(&mut self) -> &mut SessionCore;

    /// 之后的调用在未指定表条件时使用它。
    fn set_default_table_condition(&mut self, condition: Option<TableCondition>) {
        self.core().default_condition = condition;
    }

    /// 按表达式查询，表达式指定了页大小时分页。空查询不访问数据库。
    fn list(&mut self, se: &SearchExpression) -> DaoResult<Vec<Record>> {
        if se.is_empty_query() {
            return Ok(Vec::new());
        }
        let core = self.core();
        let bsql = core.lower(se, Lowering::Load)?;
        core.fetch_records(&bsql, se.paging())
    }

    /// 不分页，返回全部结果。
    fn list_all(&mut self, bsql: &BindedCompiledSQL) -> DaoResult<Vec<Record>> {
        self.core().fetch_records(bsql, None)
    }

    /// `start_pos` 从 1 开始；从第 1 条开始且 `max_size` 为 `usize::MAX` 时不分页。
    fn list_page(&mut self, bsql: &BindedCompiledSQL, start_pos: usize, max_size: usize) -> DaoResult<Vec<Record>> {
        let paging = (start_pos > 1 || max_size != usize::MAX)
            .then(|| (start_pos.saturating_sub(1).min(MAX_OFFSET), max_size.min(MAX_OFFSET)));
        self.core().fetch_records(bsql, paging)
    }

    /// 执行已注册的命名语句。
    fn list_by_id(
        &mut self,
        id: &str,
        params: &[(&str, SqlValue)],
        start_pos: usize,
        max_size: usize,
    ) -> DaoResult<Vec<Record>> {
        let compiled = self.core().env.sqls.get_sql(id)?;
        let bsql = compiled.bind_map(params.iter().map(|(k, v)| (*k, v.clone())))?;
        self.list_page(&bsql, start_pos, max_size)
    }

    /// 记录数；统计短语的结果不是整数时返回 0。
    fn count(&mut self, se: &SearchExpression) -> DaoResult<i64> {
        if se.is_empty_query() {
            return Ok(0);
        }
        let core = self.core();
        let bsql = core.lower(se, Lowering::Count)?;
        let (_, rows) = core.fetch_rows(&bsql, None)?;
        Ok(first_cell(&rows).and_then(|v| v.as_i64()).unwrap_or(0))
    }

    fn page(&mut self, se: &SearchExpression) -> DaoResult<PageFlip<Record>> {
        let total_count = if se.compute_record_number() {
            Some(self.count(se)?.max(0) as u64)
        } else {
            None
        };
        let elements = if se.load_records() {
            self.list(se)?
        } else {
            Vec::new()
        };
        Ok(PageFlip {
            page_no: se.page_no(),
            page_size: se.page_size().unwrap_or(0),
            total_count,
            elements,
        })
    }

    /// 第一条记录。查询不到时返回 `None`，开启 `exception_on_no_record_found` 时返回 `NotFound`。
    fn find_object(&mut self, bsql: &BindedCompiledSQL) -> DaoResult<Option<Record>> {
        self.core().fetch_one(bsql)
    }

    fn find_object_by_se(&mut self, se: &SearchExpression) -> DaoResult<Option<Record>> {
        if se.is_empty_query() {
            return Ok(None);
        }
        let core = self.core();
        let bsql = core.lower(se, Lowering::Load)?;
        core.fetch_one(&bsql)
    }

    fn find_object_by_pk(&mut self, business: &str, pk: impl Into<SqlValue>) -> DaoResult<Option<Record>>
    where
        Self: Sized,
    {
        let core = self.core();
        let mapping = core.env.mappings().get(business)?;
        let pk_prop = pk_prop_of(&mapping)?;
        let select = Arc::clone(&core.env.sqls.business_sqls(business)?.select);
        let bsql = select.bind(&pk_prop, pk)?;
        core.fetch_one(&bsql)
    }

    /// 第一行第一列；设置了 `with_result_type` 时按该类型转换。
    fn find_cell00(&mut self, bsql: &BindedCompiledSQL) -> DaoResult<Option<SqlValue>> {
        self.core().fetch_cell(bsql)
    }

    /// 按主键重新读取并写回对象，记录必须存在。
    fn refresh(&mut self, business: &str, bean: &mut dyn BeanAccess, lock_mode: LockMode) -> DaoResult<()> {
        let core = self.core();
        let mapping = core.env.mappings().get(business)?;
        let pk_prop = pk_prop_of(&mapping)?;
        let pk = bean.get_value(&pk_prop).unwrap_or(SqlValue::Null);
        let select = Arc::clone(&core.env.sqls.business_sqls(business)?.select);
        let bsql = select
            .bind(&pk_prop, pk)?
            .with_lock_mode(lock_mode)
            .exception_on_no_record_found(true);
        if let Some(record) = core.fetch_one(&bsql)? {
            for (prop, value) in record.iter() {
                bean.set_value(prop, value.clone())?;
            }
        }
        Ok(())
    }

    /// 修改本事务所有连接的隔离级别。
    fn set_transaction_isolation(&mut self, level: IsolationLevel) -> DaoResult<IsolationSavePointer> {
        Ok(self.core().connections.set_transaction_isolation(level)?)
    }

    fn reset_transaction_isolation_to(&mut self, pointer: IsolationSavePointer) -> DaoResult<()> {
        Ok(self.core().connections.reset_transaction_isolation_to(pointer)?)
    }

    fn reset_transaction_isolation_to_last_save_pointer(&mut self) -> DaoResult<()> {
        Ok(self
            .core()
            .connections
            .reset_transaction_isolation_to_last_save_pointer()?)
    }
}

fn close_core(core: &mut SessionCore) -> Result<(), ExecutionError> {
    let mut errors = core.connections.close().into_iter();
    let first = errors.next();
    let suppressed = errors.count();
    if suppressed > 0 {
        debug!(suppressed, "more connections failed to close");
    }
    first.map_or(Ok(()), Err)
}

/// 只读事务。
#[derive(Debug)]
pub struct ReadonlyTranSession {
    core: SessionCore,
}

impl ReadonlyTranSession {
    pub(crate) fn new(core: SessionCore) -> Self {
        Self { core }
    }

    /// 释放本事务持有的连接。多个连接释放失败时返回第一个错误，其余已记录日志。
    pub fn close(mut self) -> Result<(), ExecutionError> {
        close_core(&mut self.core)
    }
}

impl ReadSession for ReadonlyTranSession {
    fn core(&mut self) -> &mut SessionCore {
        &mut self.core
    }
}

/// 从读写事务借出的只读句柄，与事务共用连接，不能关闭事务。
#[derive(Debug)]
pub struct ReadApi<'a> {
    core: &'a mut SessionCore,
}

impl ReadSession for ReadApi<'_> {
    fn core(&mut self) -> &mut SessionCore {
        self.core
    }
}

/// 读写事务。
#[derive(Debug)]
pub struct WriteTranSession {
    core: SessionCore,
}

impl ReadSession for WriteTranSession {
    fn core(&mut self) -> &mut SessionCore {
        &mut self.core
    }
}

impl WriteTranSession {
    pub(crate) fn new(core: SessionCore) -> Self {
        Self { core }
    }

    pub fn export_read_api(&mut self) -> ReadApi<'_> {
        ReadApi { core: &mut self.core }
    }

    /// 插入对象，返回主键。
    ///
    /// 对象已有主键时连同主键插入；否则由数据库生成主键，方言支持时读回并写入对象。
    pub fn insert(&mut self, business: &str, bean: &mut dyn BeanAccess) -> DaoResult<SqlValue> {
        let mapping = self.core.env.mappings().get(business)?;
        let pk_prop = pk_prop_of(&mapping)?;
        let sqls = self.core.env.sqls.business_sqls(business)?.clone();

        let pk = bean.get_value(&pk_prop).unwrap_or(SqlValue::Null);
        if !pk.is_null() {
            let bsql = sqls.insert.bind_bean(&*bean)?;
            self.core.update_rows(&bsql)?;
            return Ok(pk);
        }

        let bsql = sqls.insert_without_pk.bind_bean(&*bean)?;
        let (group, stmt) = self.core.statement_for(&bsql, None)?;
        self.core.execute(&group, &stmt, |c, s| c.execute_update(s))?;

        let Some(clause) = mapping.dialect().select_inserted_auto_id_clause() else {
            return Ok(SqlValue::Null);
        };
        let id_stmt = Statement::new(clause, Vec::new()).with_timeout(self.core.env.config.query_timeout());
        let rows = self.core.execute(&group, &id_stmt, |c, s| c.query(s))?;
        let id = first_cell(&rows).unwrap_or(SqlValue::Null);
        let id = match mapping.data_type_of_prop(&pk_prop) {
            Some(t) if !id.is_null() => t.coerce(id)?,
            _ => id,
        };
        bean.set_value(&pk_prop, id.clone())?;
        Ok(id)
    }

    /// 按主键更新全部可更新列，返回受影响行数。
    ///
    /// 有版本列时只更新版本匹配的记录，成功后对象上的版本号加一。
    pub fn update(&mut self, business: &str, bean: &mut dyn BeanAccess) -> DaoResult<u64> {
        let mapping = self.core.env.mappings().get(business)?;
        let update = self.core.env.sqls.business_sqls(business)?.update.clone().ok_or_else(|| {
            ConfigError::Invalid(format!("business [{business}] has no updatable column"))
        })?;
        let bsql = update.bind_bean(&*bean)?;
        let rows = self.core.update_rows(&bsql)?;

        if rows == 1 {
            if let Some(version) = mapping.table().version_column() {
                let next = bean
                    .get_value(version.prop())
                    .and_then(|v| v.as_i64())
                    .map_or(SqlValue::Null, |v| SqlValue::I64(v + 1));
                if !next.is_null() {
                    bean.set_value(version.prop(), next)?;
                }
            }
        }
        Ok(rows)
    }

    /// 只更新给定的属性。
    pub fn update_props(&mut self, business: &str, bean: &dyn BeanAccess, props: &[&str]) -> DaoResult<u64> {
        let compiled = self.core.env.sqls.build_update_sql(business, props)?;
        let bsql = compiled.bind_bean(bean)?;
        self.core.update_rows(&bsql)
    }

    pub fn delete(&mut self, business: &str, bean: &dyn BeanAccess) -> DaoResult<u64> {
        let delete = Arc::clone(&self.core.env.sqls.business_sqls(business)?.delete);
        let bsql = delete.bind_bean(bean)?;
        self.core.update_rows(&bsql)
    }

    /// 按表达式删除。空查询不访问数据库，返回 0。
    pub fn delete_by_se(&mut self, se: &SearchExpression) -> DaoResult<u64> {
        if se.is_empty_query() {
            return Ok(0);
        }
        let bsql = self.core.lower(se, Lowering::Delete)?;
        self.core.update_rows(&bsql)
    }

    pub fn execute_update(&mut self, bsql: &BindedCompiledSQL) -> DaoResult<u64> {
        self.core.update_rows(bsql)
    }

    pub fn execute_update_by_id(&mut self, id: &str, params: &[(&str, SqlValue)]) -> DaoResult<u64> {
        let compiled = self.core.env.sqls.get_sql(id)?;
        let bsql = compiled.bind_map(params.iter().map(|(k, v)| (*k, v.clone())))?;
        self.core.update_rows(&bsql)
    }

    /// 以 `for update` 锁住记录并读出一个属性，记录必须存在。
    pub fn load_prop_for_update(&mut self, business: &str, pk: impl Into<SqlValue>, prop: &str) -> DaoResult<SqlValue> {
        let mapping = self.core.env.mappings().get(business)?;
        let column = mapping
            .table()
            .column_by_prop(prop)
            .ok_or_else(|| CompileError::UnknownProperty {
                business: business.to_string(),
                prop: prop.to_string(),
            })?;
        let compiled = self
            .core
            .env
            .sqls
            .build_load_column_by_pk_sql(business, column.col_name_for_sql())?;
        let bsql = compiled
            .bind(PK_PARAM, pk)?
            .with_lock_mode(LockMode::Upgrade)
            .with_result_type(column.data_type())
            .exception_on_no_record_found(true);

        Ok(self.core.fetch_cell(&bsql)?.unwrap_or(SqlValue::Null))
    }

    pub fn commit(&mut self) -> DaoResult<()> {
        self.core.connections.commit()?;
        debug!(connections = self.core.connections.len(), "transaction committed");
        Ok(())
    }

    pub fn rollback(&mut self) -> DaoResult<()> {
        self.core.connections.rollback()?;
        debug!(connections = self.core.connections.len(), "transaction rolled back");
        Ok(())
    }

    /// 释放本事务持有的连接。多个连接释放失败时返回第一个错误，其余已记录日志。
    pub fn close(mut self) -> Result<(), ExecutionError> {
        close_core(&mut self.core)
    }
}
