//! Dialect：某一种数据库的全部字符串规则，外加厂商类型名注册表。
//!
//! 构造完成后不可变，通过 `Arc<Dialect>` 在表映射之间共享。

use crate::flavor::Flavor;
use crate::sql_type::SqlDataType;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Dialect {
    flavor: Flavor,
    custom_types: HashMap<String, SqlDataType>,
}

impl Dialect {
    /// 创建方言，并注册该库常见的厂商类型名。
    pub fn new(flavor: Flavor) -> Self {
        let d = Self {
            flavor,
            custom_types: HashMap::new(),
        };
        match flavor {
            Flavor::Oracle => d
                .with_custom_type("Oracle.Long", SqlDataType::String)
                .with_custom_type("varchar2", SqlDataType::String)
                .with_custom_type("nclob", SqlDataType::Clob)
                .with_custom_type("raw", SqlDataType::Bytes)
                .with_custom_type("number", SqlDataType::Decimal),
            Flavor::PostgreSQL => d
                .with_custom_type("bytea", SqlDataType::Bytes)
                .with_custom_type("int8", SqlDataType::BigInt)
                .with_custom_type("serial", SqlDataType::Int),
            Flavor::MySQL => d
                .with_custom_type("mediumtext", SqlDataType::Clob)
                .with_custom_type("longtext", SqlDataType::Clob)
                .with_custom_type("longblob", SqlDataType::Blob),
            Flavor::SQLite | Flavor::H2 => d,
        }
    }

    /// 注册一个自定义类型名（大小写不敏感）。
    pub fn with_custom_type(mut self, name: &str, data_type: SqlDataType) -> Self {
        self.custom_types.insert(name.to_ascii_lowercase(), data_type);
        self
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// 类型名解析：先查本方言注册的类型，再查内置类型。
    pub fn data_type(&self, name: &str) -> Option<SqlDataType> {
        self.custom_types
            .get(&name.trim().to_ascii_lowercase())
            .copied()
            .or_else(|| SqlDataType::from_name(name))
    }

    pub fn escaped_column_name(&self, column: &str) -> String {
        self.flavor.quote(column)
    }

    pub fn limited_string(&self, sql: &str, offset: usize, limit: usize) -> String {
        self.flavor.limited_string(sql, offset, limit)
    }

    pub fn for_update_string(&self, sql: &str) -> String {
        self.flavor.for_update_string(sql)
    }

    pub fn for_update_no_wait_string(&self, sql: &str) -> String {
        self.flavor.for_update_no_wait_string(sql)
    }

    pub fn native_id_generator(&self) -> &'static str {
        self.flavor.native_id_generator()
    }

    pub fn select_sequence_clause(&self, sequence: &str) -> Option<String> {
        self.flavor.select_sequence_clause(sequence)
    }

    pub fn select_inserted_auto_id_clause(&self) -> Option<&'static str> {
        self.flavor.select_inserted_auto_id_clause()
    }

    pub(crate) fn write_placeholder(&self, index_1_based: usize, out: &mut String) {
        self.flavor.write_placeholder(index_1_based, out)
    }

    /// 大小写不敏感的 LIKE。
    pub(crate) fn like_ignore_case(&self, column: &str, param: &str) -> String {
        match self.flavor {
            Flavor::PostgreSQL => format!("{column} ilike :{param}"),
            _ => format!("lower({column}) like lower(:{param})"),
        }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::new(Flavor::default())
    }
}
