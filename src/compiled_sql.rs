//! CompiledSQL / BindedCompiledSQL：编译好的模板与一次执行的绑定。
//!
//! `CompiledSQL` 编译后不可变，通过 `Arc` 共享；每次执行调用 `bind` 得到新的 `BindedCompiledSQL`，
//! 其中保存绑定值、表条件、锁模式等本次调用的选项。

use crate::bean::{BeanAccess, Record};
use crate::datasource::Row;
use crate::error::{CompileError, DaoError};
use crate::mapping::ObjectMapping;
use crate::marked_sql::Node;
use crate::sql_type::SqlDataType;
use crate::table_condition::TableCondition;
use crate::value::SqlValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 查询时附加的行锁。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockMode {
    #[default]
    None,
    /// `for update`
    Upgrade,
    /// `for update nowait`
    UpgradeNowait,
}

/// 自定义的行映射。
pub trait RowLoader: dyn_clone::DynClone + fmt::Debug + Send + Sync {
    fn load(&self, mapping: &ObjectMapping, row: &Row) -> Result<Record, DaoError>;
}

dyn_clone::clone_trait_object!(RowLoader);

/// 按方言写好占位符的最终语句。
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSql {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl PreparedSql {
    pub fn params_string(&self) -> String {
        crate::debug::format_params(&self.params)
    }
}

#[derive(Debug, Clone)]
pub struct CompiledSQL {
    mapping: Arc<ObjectMapping>,
    result_mapping: Option<Arc<ObjectMapping>>,
    sql: String,
    nodes: Vec<Node>,
    ordered_params: Vec<String>,
    directive_vars: Vec<String>,
    param_props: HashMap<String, String>,
    param_types: HashMap<String, SqlDataType>,
}

fn collect_names(nodes: &[Node], params: &mut Vec<String>, vars: &mut Vec<String>) {
    for node in nodes {
        match node {
            Node::Param(name) if !params.contains(name) => params.push(name.clone()),
            Node::If { var, body, .. } | Node::NotEmpty { var, body } => {
                if !vars.contains(var) {
                    vars.push(var.clone());
                }
                collect_names(body, params, vars);
            }
            _ => {}
        }
    }
}

impl CompiledSQL {
    pub(crate) fn new(mapping: Arc<ObjectMapping>, sql: String, nodes: Vec<Node>) -> Self {
        let mut ordered_params = Vec::new();
        let mut directive_vars = Vec::new();
        collect_names(&nodes, &mut ordered_params, &mut directive_vars);
        Self {
            mapping,
            result_mapping: None,
            sql,
            nodes,
            ordered_params,
            directive_vars,
            param_props: HashMap::new(),
            param_types: HashMap::new(),
        }
    }

    /// 参数 `param` 对应属性 `prop`：可以用属性名绑定，值按属性类型转换。
    pub fn with_param_prop(mut self, param: impl Into<String>, prop: impl Into<String>) -> Self {
        self.param_props.insert(param.into(), prop.into());
        self
    }

    /// 显式声明参数类型，优先于属性类型。
    pub fn with_param_type(mut self, param: impl Into<String>, data_type: SqlDataType) -> Self {
        self.param_types.insert(param.into(), data_type);
        self
    }

    /// 结果行按另一个映射转换（默认使用所属映射）。
    pub fn with_result_mapping(mut self, mapping: Arc<ObjectMapping>) -> Self {
        self.result_mapping = Some(mapping);
        self
    }

    pub fn mapping(&self) -> &Arc<ObjectMapping> {
        &self.mapping
    }

    pub fn result_mapping(&self) -> &Arc<ObjectMapping> {
        self.result_mapping.as_ref().unwrap_or(&self.mapping)
    }

    /// 原始的带标记文本。
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// 参数名，按第一次出现的顺序。
    pub fn ordered_params(&self) -> &[String] {
        &self.ordered_params
    }

    fn resolve_param(&self, name: &str) -> Option<String> {
        if self.ordered_params.iter().any(|p| p == name)
            || self.directive_vars.iter().any(|v| v == name)
        {
            return Some(name.to_string());
        }
        self.param_props
            .iter()
            .filter(|(_, prop)| prop.as_str() == name)
            .map(|(param, _)| param.clone())
            .min()
    }

    fn param_type(&self, param: &str) -> Option<SqlDataType> {
        self.param_types.get(param).copied().or_else(|| {
            self.param_props
                .get(param)
                .and_then(|prop| self.mapping.data_type_of_prop(prop))
        })
    }

    pub fn bind(self: &Arc<Self>, name: &str, value: impl Into<SqlValue>) -> Result<BindedCompiledSQL, CompileError> {
        self.bind_no_params().bind(name, value)
    }

    pub fn bind_map<K, V>(self: &Arc<Self>, values: impl IntoIterator<Item = (K, V)>) -> Result<BindedCompiledSQL, CompileError>
    where
        K: AsRef<str>,
        V: Into<SqlValue>,
    {
        let mut binded = self.bind_no_params();
        for (k, v) in values {
            binded = binded.bind(k.as_ref(), v)?;
        }
        Ok(binded)
    }

    pub fn bind_no_params(self: &Arc<Self>) -> BindedCompiledSQL {
        BindedCompiledSQL {
            compiled: Arc::clone(self),
            values: HashMap::new(),
            table_condition: None,
            lock_mode: LockMode::None,
            exception_on_no_record_found: false,
            row_loader: None,
            result_type: None,
        }
    }

    /// 从对象中取出每个参数对应属性的值并绑定。属性缺失时绑定 `Null`。
    ///
    /// 只出现在 `#if` / `#notEmpty` 中的变量，对象有该属性时一并绑定。
    pub fn bind_bean(self: &Arc<Self>, bean: &dyn BeanAccess) -> Result<BindedCompiledSQL, CompileError> {
        let mut binded = self.bind_no_params();
        for param in &self.ordered_params {
            let prop = self.param_props.get(param).unwrap_or(param);
            let value = bean.get_value(prop).unwrap_or(SqlValue::Null);
            binded = binded.bind(param, value)?;
        }
        for var in &self.directive_vars {
            if self.ordered_params.contains(var) {
                continue;
            }
            let prop = self.param_props.get(var).unwrap_or(var);
            if let Some(value) = bean.get_value(prop) {
                binded = binded.bind(var, value)?;
            }
        }
        Ok(binded)
    }
}

/// 一次执行：编译好的语句 + 绑定值 + 调用选项。
#[derive(Clone)]
pub struct BindedCompiledSQL {
    compiled: Arc<CompiledSQL>,
    values: HashMap<String, SqlValue>,
    table_condition: Option<TableCondition>,
    lock_mode: LockMode,
    exception_on_no_record_found: bool,
    row_loader: Option<Box<dyn RowLoader>>,
    result_type: Option<SqlDataType>,
}

impl fmt::Debug for BindedCompiledSQL {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindedCompiledSQL")
            .field("sql", &self.compiled.sql)
            .field("values", &self.values)
            .field("table_condition", &self.table_condition)
            .field("lock_mode", &self.lock_mode)
            .field("exception_on_no_record_found", &self.exception_on_no_record_found)
            .field("row_loader", &self.row_loader)
            .field("result_type", &self.result_type)
            .finish()
    }
}

impl BindedCompiledSQL {
    /// 按参数名或已映射的属性名绑定，其它名字报错。
    pub fn bind(mut self, name: &str, value: impl Into<SqlValue>) -> Result<Self, CompileError> {
        let param = self
            .compiled
            .resolve_param(name)
            .ok_or_else(|| CompileError::UnknownParam(name.to_string()))?;
        let value = match self.compiled.param_type(&param) {
            Some(t) => t.coerce(value.into())?,
            None => value.into(),
        };
        self.values.insert(param, value);
        Ok(self)
    }

    pub fn with_table_condition(mut self, condition: TableCondition) -> Self {
        self.table_condition = Some(condition);
        self
    }

    pub fn with_lock_mode(mut self, lock_mode: LockMode) -> Self {
        self.lock_mode = lock_mode;
        self
    }

    /// 查询不到记录时返回 `DaoError::NotFound`，而不是 `None`。
    pub fn exception_on_no_record_found(mut self, raise: bool) -> Self {
        self.exception_on_no_record_found = raise;
        self
    }

    pub fn with_row_loader(mut self, loader: impl RowLoader + 'static) -> Self {
        self.row_loader = Some(Box::new(loader));
        self
    }

    /// 单值查询（`find_cell00`）的结果按该类型转换。
    pub fn with_result_type(mut self, data_type: SqlDataType) -> Self {
        self.result_type = Some(data_type);
        self
    }

    pub fn result_type(&self) -> Option<SqlDataType> {
        self.result_type
    }

    pub fn compiled(&self) -> &Arc<CompiledSQL> {
        &self.compiled
    }

    pub fn mapping(&self) -> &Arc<ObjectMapping> {
        &self.compiled.mapping
    }

    pub fn table_condition(&self) -> Option<&TableCondition> {
        self.table_condition.as_ref()
    }

    pub fn lock_mode(&self) -> LockMode {
        self.lock_mode
    }

    pub fn is_exception_on_no_record_found(&self) -> bool {
        self.exception_on_no_record_found
    }

    pub fn value(&self, param: &str) -> Option<&SqlValue> {
        self.values.get(param)
    }

    /// 生效的表条件：本次调用指定的优先，否则用会话默认值。
    pub fn effective_condition<'c>(&'c self, default: Option<&'c TableCondition>) -> Option<&'c TableCondition> {
        self.table_condition.as_ref().or(default)
    }

    /// 展开指令、替换真实表名、按方言写占位符。
    pub fn prepare(&self, default_condition: Option<&TableCondition>) -> Result<PreparedSql, DaoError> {
        let condition = self.effective_condition(default_condition);
        let mut out = PreparedSql {
            sql: String::with_capacity(self.compiled.sql.len() + 16),
            params: Vec::new(),
        };
        self.render(&self.compiled.nodes, condition, &mut out)?;
        Ok(out)
    }

    fn render(
        &self,
        nodes: &[Node],
        condition: Option<&TableCondition>,
        out: &mut PreparedSql,
    ) -> Result<(), DaoError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.sql.push_str(text),
                Node::Table(mapping) => {
                    out.sql
                        .push_str(&mapping.table().real_table_name(condition)?);
                }
                Node::Param(name) => {
                    let value = self
                        .values
                        .get(name)
                        .ok_or_else(|| CompileError::ParamNotBound(name.clone()))?;
                    out.params.push(value.clone());
                    self.compiled
                        .mapping
                        .dialect()
                        .write_placeholder(out.params.len(), &mut out.sql);
                }
                Node::If { var, negate, body } => {
                    let truthy = self.values.get(var).is_some_and(SqlValue::is_truthy);
                    if truthy != *negate {
                        self.render(body, condition, out)?;
                    }
                }
                Node::NotEmpty { var, body } => {
                    if self.values.get(var).is_some_and(|v| !v.is_empty_value()) {
                        self.render(body, condition, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// 结果行 -> Record：优先使用调用方的 `RowLoader`。
    pub fn load_row(&self, row: &Row) -> Result<Record, DaoError> {
        match &self.row_loader {
            Some(loader) => loader.load(self.compiled.result_mapping(), row),
            None => Ok(self.compiled.result_mapping().row_to_record(row)),
        }
    }
}
