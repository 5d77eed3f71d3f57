//! Args：条件渲染时的有序参数累加器。
//!
//! 每个叶子条件调用 `add` 得到一个不冲突的参数名（`<prop>_<n>`，n 按属性单独计数），
//! 值按加入顺序保存，之后整体绑定到编译出的语句上。

use crate::value::SqlValue;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    params: Vec<(String, SqlValue)>,
    param_props: HashMap<String, String>,
    counters: HashMap<String, usize>,
}

/// 属性名里不能出现在 `:name` 中的字符统一替换为 `_`。
fn param_base(prop: &str) -> String {
    let base: String = prop
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if base.is_empty() { "p".to_string() } else { base }
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个属于 `prop` 的值，返回生成的参数名（不带 `:`）。
    pub fn add(&mut self, prop: &str, value: impl Into<SqlValue>) -> String {
        let base = param_base(prop);
        let n = self.counters.entry(base.clone()).or_insert(0);
        let name = format!("{base}_{n}");
        *n += 1;

        self.param_props.insert(name.clone(), prop.to_string());
        self.params.push((name.clone(), value.into()));
        name
    }

    pub fn value(&self, name: &str) -> Option<&SqlValue> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// 参数名对应的属性名。
    pub fn prop_of(&self, name: &str) -> Option<&str> {
        self.param_props.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &[(String, SqlValue)] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
