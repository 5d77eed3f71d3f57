//! ConditionSegment：把 `"age>=18"` 这样的条件文本拆成（字段，运算符，值）。
//!
//! 从左往右扫描，第一个遇到的运算符生效，所以值里出现的运算符字符不会干扰解析。

use crate::bean::BeanAccess;
use crate::error::CompileError;
use crate::mapping::ObjectMapping;
use crate::term::SearchTerm;
use crate::value::SqlValue;
use std::cmp::Ordering;
use std::fmt;

/// 比较运算符。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOperation {
    Equal,
    NotEqual,
    Bigger,
    BiggerOrEqual,
    Smaller,
    SmallerOrEqual,
    Like,
    LikeIgnoreCase,
    EqualIgnoreCase,
}

impl LogicOperation {
    /// 条件文本里的运算符写法。
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token.trim() {
            "!=" | "<>" => Self::NotEqual,
            "~~" => Self::LikeIgnoreCase,
            "=~=" => Self::EqualIgnoreCase,
            "~=" => Self::Like,
            "==" | "=" => Self::Equal,
            ">=" => Self::BiggerOrEqual,
            "<=" => Self::SmallerOrEqual,
            ">" => Self::Bigger,
            "<" => Self::Smaller,
            _ => return None,
        };
        Some(op)
    }

    /// 渲染到 SQL 时的运算符；两个忽略大小写的变体由方言单独处理。
    pub fn sql_symbol(self) -> &'static str {
        match self {
            Self::Equal | Self::EqualIgnoreCase => "=",
            Self::NotEqual => "<>",
            Self::Bigger => ">",
            Self::BiggerOrEqual => ">=",
            Self::Smaller => "<",
            Self::SmallerOrEqual => "<=",
            Self::Like | Self::LikeIgnoreCase => "like",
        }
    }
}

impl fmt::Display for LogicOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Bigger => ">",
            Self::BiggerOrEqual => ">=",
            Self::Smaller => "<",
            Self::SmallerOrEqual => "<=",
            Self::Like => "~=",
            Self::LikeIgnoreCase => "~~",
            Self::EqualIgnoreCase => "=~=",
        };
        f.write_str(s)
    }
}

/// 找到第一个运算符，返回 (字段结束位置, 值开始位置, 运算符)。
fn scan_operator(text: &str) -> Option<(usize, usize, LogicOperation)> {
    use LogicOperation::*;

    let b = text.as_bytes();
    for i in 0..b.len() {
        let next = b.get(i + 1).copied().unwrap_or(0);
        let found = match b[i] {
            b'!' if next == b'=' => Some((2, NotEqual)),
            b'>' if next == b'=' => Some((2, BiggerOrEqual)),
            b'>' => Some((1, Bigger)),
            b'<' => match next {
                b'>' => Some((2, NotEqual)),
                b'=' => Some((2, SmallerOrEqual)),
                _ => Some((1, Smaller)),
            },
            b'=' => match next {
                b'=' => Some((2, Equal)),
                // `=~` 后面必须跟 `=`，否则继续向后扫描
                b'~' => (b.get(i + 2) == Some(&b'=')).then_some((3, EqualIgnoreCase)),
                _ => Some((1, Equal)),
            },
            b'~' => match next {
                b'~' => Some((2, LikeIgnoreCase)),
                b'=' => Some((2, Like)),
                _ => None,
            },
            _ => None,
        };
        if let Some((width, op)) = found {
            return Some((i, i + width, op));
        }
    }
    None
}

/// 一个条件片段。`value == None` 表示匹配任意值（模板占位），不是 SQL 的 NULL 判断。
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionSegment {
    pub field_name: String,
    pub operator: LogicOperation,
    pub value: Option<SqlValue>,
}

impl ConditionSegment {
    pub fn new(field_name: impl Into<String>, operator: LogicOperation, value: Option<SqlValue>) -> Self {
        Self {
            field_name: field_name.into(),
            operator,
            value,
        }
    }

    /// 解析条件文本，值保留为字符串。没有运算符时返回 `None`。
    pub fn parse(text: &str) -> Option<Self> {
        let (key_end, value_start, op) = scan_operator(text)?;
        let field = text[..key_end].trim();
        let value = text[value_start..].trim();
        Some(Self::new(field, op, Some(SqlValue::String(value.to_string().into()))))
    }

    /// 解析条件文本，并按属性声明的类型转换值。
    pub fn parse_with_mapping(mapping: &ObjectMapping, text: &str) -> Result<Option<Self>, CompileError> {
        let Some((key_end, value_start, op)) = scan_operator(text) else {
            return Ok(None);
        };
        let field = text[..key_end].trim();
        let data_type = mapping
            .data_type_of_prop(field)
            .ok_or_else(|| CompileError::UnknownProperty {
                business: mapping.business().to_string(),
                prop: field.to_string(),
            })?;
        let value = data_type.from_str_value(text[value_start..].trim())?;
        Ok(Some(Self::new(field, op, Some(value))))
    }

    /// 用显式的运算符写法构造。
    pub fn from_operator(
        field_name: &str,
        operator: &str,
        value: Option<SqlValue>,
    ) -> Result<Self, CompileError> {
        let op = LogicOperation::from_token(operator)
            .ok_or_else(|| CompileError::InvalidOperator(operator.to_string()))?;
        Ok(Self::new(field_name.trim(), op, value))
    }

    /// 对象的字段值是否满足本条件。如条件为 `id > 3`，对象的 id 大于 3 时返回 true。
    pub fn matches(&self, bean: &dyn BeanAccess) -> bool {
        let Some(expected) = &self.value else {
            return true;
        };
        let actual = bean.get_value(&self.field_name).unwrap_or(SqlValue::Null);
        let ord = actual.compare(expected);

        match self.operator {
            LogicOperation::Equal => ord == Some(Ordering::Equal),
            LogicOperation::NotEqual => ord != Some(Ordering::Equal),
            LogicOperation::Bigger => ord == Some(Ordering::Greater),
            LogicOperation::BiggerOrEqual => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            LogicOperation::Smaller => ord == Some(Ordering::Less),
            LogicOperation::SmallerOrEqual => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            LogicOperation::EqualIgnoreCase => match (actual.as_str(), expected.as_str()) {
                (Some(a), Some(e)) => a.to_lowercase() == e.to_lowercase(),
                _ => ord == Some(Ordering::Equal),
            },
            LogicOperation::Like => match (actual.as_str(), expected.as_str()) {
                (Some(a), Some(p)) => like_match(a, p),
                _ => false,
            },
            LogicOperation::LikeIgnoreCase => match (actual.as_str(), expected.as_str()) {
                (Some(a), Some(p)) => like_match(&a.to_lowercase(), &p.to_lowercase()),
                _ => false,
            },
        }
    }

    /// 转成等价的查询条件；匹配任意值的片段没有对应条件。
    pub fn to_term(&self) -> Option<SearchTerm> {
        self.value
            .clone()
            .map(|v| SearchTerm::compare(self.field_name.clone(), self.operator, v))
    }
}

impl fmt::Display for ConditionSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.field_name, self.operator)?;
        match &self.value {
            Some(v) => write!(f, "{v}"),
            None => f.write_str("?"),
        }
    }
}

/// SQL LIKE 匹配：`%` 任意长度，`_` 单个字符。
fn like_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '%')
}

#[cfg(test)]
mod tests {
    use super::like_match;

    #[test]
    fn like_wildcards() {
        assert!(like_match("guzz", "g%"));
        assert!(like_match("guzz", "%zz"));
        assert!(like_match("guzz", "g_zz"));
        assert!(like_match("guzz", "%"));
        assert!(!like_match("guzz", "g_z"));
        assert!(!like_match("guzz", "a%"));
    }
}
