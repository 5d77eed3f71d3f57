//! BeanAccess：按属性名读写领域对象。
//!
//! Rust 没有运行时反射；需要持久化的类型实现这个 trait（手写、宏生成都可以），
//! crate 自带的 `Record` 是一个按属性名存值的动态对象，查询结果默认映射为它。

use crate::value::SqlValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BeanError {
    #[error("unknown property: {0}")]
    UnknownProperty(String),
    #[error("property [{prop}] rejects value: {reason}")]
    InvalidValue { prop: String, reason: String },
}

pub trait BeanAccess {
    /// 读属性；属性不存在返回 `None`，属性存在但为空返回 `Some(SqlValue::Null)`。
    fn get_value(&self, prop: &str) -> Option<SqlValue>;

    fn set_value(&mut self, prop: &str, value: SqlValue) -> Result<(), BeanError>;

    fn has_property(&self, prop: &str) -> bool;
}

/// 动态对象：属性名 -> 值。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, SqlValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, prop: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.values.insert(prop.into(), value.into());
        self
    }

    pub fn insert(&mut self, prop: impl Into<String>, value: impl Into<SqlValue>) {
        self.values.insert(prop.into(), value.into());
    }

    pub fn get(&self, prop: &str) -> Option<&SqlValue> {
        self.values.get(prop)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl BeanAccess for Record {
    fn get_value(&self, prop: &str) -> Option<SqlValue> {
        self.values.get(prop).cloned()
    }

    fn set_value(&mut self, prop: &str, value: SqlValue) -> Result<(), BeanError> {
        self.values.insert(prop.to_string(), value);
        Ok(())
    }

    fn has_property(&self, prop: &str) -> bool {
        self.values.contains_key(prop)
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
