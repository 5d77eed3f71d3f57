//! 对象映射元数据：业务名 -> 表、列、主键、版本列、所属数据库组、影子表规则。
//!
//! 只保留模板编译与路由需要的部分。

use crate::bean::Record;
use crate::datasource::Row;
use crate::dialect::Dialect;
use crate::error::ConfigError;
use crate::sql_type::SqlDataType;
use crate::table_condition::TableCondition;
use crate::value::SqlValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 一列。
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    prop: String,
    col_name_for_sql: String,
    col_name_for_rs: String,
    data_type: SqlDataType,
    allow_insert: bool,
    allow_update: bool,
}

impl TableColumn {
    /// `col_name` 用反引号包住（如 `` `order` ``）时，加入表后按方言转义。
    pub fn new(prop: impl Into<String>, col_name: impl Into<String>, data_type: SqlDataType) -> Self {
        let col_name = col_name.into();
        Self {
            prop: prop.into(),
            col_name_for_rs: col_name.trim_matches('`').to_string(),
            col_name_for_sql: col_name,
            data_type,
            allow_insert: true,
            allow_update: true,
        }
    }

    pub fn insertable(mut self, allow: bool) -> Self {
        self.allow_insert = allow;
        self
    }

    pub fn updatable(mut self, allow: bool) -> Self {
        self.allow_update = allow;
        self
    }

    pub fn prop(&self) -> &str {
        &self.prop
    }

    /// 写进 SQL 的列名（已转义）。
    pub fn col_name_for_sql(&self) -> &str {
        &self.col_name_for_sql
    }

    /// 结果集中的列标签。
    pub fn col_name_for_rs(&self) -> &str {
        &self.col_name_for_rs
    }

    pub fn data_type(&self) -> SqlDataType {
        self.data_type
    }

    pub fn allow_insert(&self) -> bool {
        self.allow_insert
    }

    pub fn allow_update(&self) -> bool {
        self.allow_update
    }
}

/// 影子表：按表条件决定真实表名。
pub trait ShadowTable: Send + Sync + fmt::Debug {
    fn real_table_name(
        &self,
        base_name: &str,
        condition: Option<&TableCondition>,
    ) -> Result<String, ConfigError>;
}

/// `base_{value}` 形式的影子表，value 取自表条件中的 `key`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixShadow {
    key: String,
}

impl SuffixShadow {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl ShadowTable for SuffixShadow {
    fn real_table_name(
        &self,
        base_name: &str,
        condition: Option<&TableCondition>,
    ) -> Result<String, ConfigError> {
        let value = match condition.and_then(|c| c.get(&self.key)) {
            Some(v) if !v.is_null() => v,
            _ => {
                return Err(ConfigError::MissingTableCondition {
                    table: base_name.to_string(),
                    key: self.key.clone(),
                });
            }
        };
        // 后缀直接拼进表名，只接受整数或由字母、数字、下划线组成的字符串
        let suffix_ok = match value {
            SqlValue::I64(_) | SqlValue::U64(_) => true,
            SqlValue::String(s) => !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'),
            _ => false,
        };
        if !suffix_ok {
            return Err(ConfigError::InvalidTableCondition {
                table: base_name.to_string(),
                key: self.key.clone(),
                value: value.to_string(),
            });
        }
        Ok(format!("{base_name}_{value}"))
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    dialect: Arc<Dialect>,
    columns: Vec<TableColumn>,
    pk_prop: Option<String>,
    version_prop: Option<String>,
    shadow: Option<Arc<dyn ShadowTable>>,
}

impl Table {
    pub fn new(name: impl Into<String>, dialect: Arc<Dialect>) -> Self {
        Self {
            name: name.into(),
            dialect,
            columns: Vec::new(),
            pk_prop: None,
            version_prop: None,
            shadow: None,
        }
    }

    pub fn column(mut self, mut column: TableColumn) -> Self {
        let raw = column.col_name_for_sql.as_str();
        if raw.len() > 2 && raw.starts_with('`') && raw.ends_with('`') {
            column.col_name_for_sql = self.dialect.escaped_column_name(&raw[1..raw.len() - 1]);
        }
        self.columns.push(column);
        self
    }

    pub fn pk(mut self, prop: impl Into<String>) -> Self {
        self.pk_prop = Some(prop.into());
        self
    }

    /// 乐观锁版本列，更新时自增并参与 where 条件。
    pub fn version(mut self, prop: impl Into<String>) -> Self {
        self.version_prop = Some(prop.into());
        self
    }

    pub fn shadow(mut self, shadow: impl ShadowTable + 'static) -> Self {
        self.shadow = Some(Arc::new(shadow));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialect(&self) -> &Arc<Dialect> {
        &self.dialect
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column_by_prop(&self, prop: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.prop == prop)
    }

    pub fn pk_column(&self) -> Option<&TableColumn> {
        self.pk_prop.as_deref().and_then(|p| self.column_by_prop(p))
    }

    pub fn version_column(&self) -> Option<&TableColumn> {
        self.version_prop
            .as_deref()
            .and_then(|p| self.column_by_prop(p))
    }

    pub fn is_shadow(&self) -> bool {
        self.shadow.is_some()
    }

    /// 当前表条件下的真实表名；非影子表忽略条件。
    pub fn real_table_name(&self, condition: Option<&TableCondition>) -> Result<String, ConfigError> {
        match &self.shadow {
            Some(shadow) => shadow.real_table_name(&self.name, condition),
            None => Ok(self.name.clone()),
        }
    }
}

/// 一个业务对象的映射。
#[derive(Debug, Clone)]
pub struct ObjectMapping {
    business: String,
    table: Table,
    db_group: String,
}

impl ObjectMapping {
    pub fn new(business: impl Into<String>, db_group: impl Into<String>, table: Table) -> Self {
        Self {
            business: business.into(),
            table,
            db_group: db_group.into(),
        }
    }

    pub fn business(&self) -> &str {
        &self.business
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn dialect(&self) -> &Arc<Dialect> {
        self.table.dialect()
    }

    pub fn db_group(&self) -> &str {
        &self.db_group
    }

    pub fn has_prop(&self, prop: &str) -> bool {
        self.table.column_by_prop(prop).is_some()
    }

    pub fn col_name_by_prop(&self, prop: &str) -> Option<&str> {
        self.table.column_by_prop(prop).map(TableColumn::col_name_for_sql)
    }

    pub fn data_type_of_prop(&self, prop: &str) -> Option<SqlDataType> {
        self.table.column_by_prop(prop).map(TableColumn::data_type)
    }

    /// 行 -> Record：已映射的列使用属性名，其它列保留列标签。
    pub fn row_to_record(&self, row: &Row) -> Record {
        let mut record = Record::new();
        for (label, value) in row.iter() {
            let prop = self
                .table
                .columns
                .iter()
                .find(|c| c.col_name_for_rs.eq_ignore_ascii_case(label))
                .map_or(label, |c| c.prop.as_str());
            record.insert(prop.to_string(), value.clone());
        }
        record
    }
}

/// 业务名 -> 映射。启动时注册，之后只读共享。
#[derive(Debug, Default)]
pub struct ObjectMappingManager {
    mappings: HashMap<String, Arc<ObjectMapping>>,
}

impl ObjectMappingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, mapping: ObjectMapping) -> Arc<ObjectMapping> {
        let mapping = Arc::new(mapping);
        self.mappings
            .insert(mapping.business.clone(), Arc::clone(&mapping));
        mapping
    }

    pub fn get(&self, business: &str) -> Result<Arc<ObjectMapping>, ConfigError> {
        self.find(business)
            .ok_or_else(|| ConfigError::MappingNotFound(business.to_string()))
    }

    pub fn find(&self, business: &str) -> Option<Arc<ObjectMapping>> {
        self.mappings.get(business).cloned()
    }

    pub fn businesses(&self) -> impl Iterator<Item = &str> {
        self.mappings.keys().map(String::as_str)
    }
}
