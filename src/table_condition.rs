//! TableCondition：分表/分库键。
//!
//! 调用时显式传入，会话打开时可以给一个默认值。

use crate::value::SqlValue;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCondition {
    values: BTreeMap<String, SqlValue>,
}

impl TableCondition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SqlValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&SqlValue> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for TableCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::TableCondition;
    use crate::value::SqlValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_lists_keys_in_order() {
        let c = TableCondition::new().with("shardKey", 1).with("city", "bj");
        assert_eq!(c.to_string(), "{city=bj, shardKey=1}");
        assert_eq!(c.get("shardKey"), Some(&SqlValue::I64(1)));
        assert!(TableCondition::new().is_empty());
    }
}
