//! SearchTerm：可组合的查询条件。
//!
//! 叶子为比较与 IN，内部节点为 And / Or。条件是不可变的值对象，可以在多个查询间复用。

use crate::args::Args;
use crate::condition::LogicOperation;
use crate::error::CompileError;
use crate::mapping::ObjectMapping;
use crate::value::SqlValue;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchTerm {
    Comparison {
        prop: String,
        op: LogicOperation,
        value: SqlValue,
    },
    In {
        prop: String,
        values: Vec<SqlValue>,
    },
    And(Option<Box<SearchTerm>>, Option<Box<SearchTerm>>),
    Or(Option<Box<SearchTerm>>, Option<Box<SearchTerm>>),
}

impl SearchTerm {
    pub fn compare(prop: impl Into<String>, op: LogicOperation, value: impl Into<SqlValue>) -> Self {
        Self::Comparison {
            prop: prop.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(prop: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(prop, LogicOperation::Equal, value)
    }

    pub fn ne(prop: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(prop, LogicOperation::NotEqual, value)
    }

    pub fn gt(prop: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(prop, LogicOperation::Bigger, value)
    }

    pub fn ge(prop: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(prop, LogicOperation::BiggerOrEqual, value)
    }

    pub fn lt(prop: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(prop, LogicOperation::Smaller, value)
    }

    pub fn le(prop: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(prop, LogicOperation::SmallerOrEqual, value)
    }

    pub fn like(prop: impl Into<String>, pattern: impl Into<SqlValue>) -> Self {
        Self::compare(prop, LogicOperation::Like, pattern)
    }

    pub fn ilike(prop: impl Into<String>, pattern: impl Into<SqlValue>) -> Self {
        Self::compare(prop, LogicOperation::LikeIgnoreCase, pattern)
    }

    pub fn eq_ignore_case(prop: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(prop, LogicOperation::EqualIgnoreCase, value)
    }

    /// `prop in (...)`；空列表是一个永远不匹配的空查询。
    pub fn in_<V: Into<SqlValue>>(prop: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In {
            prop: prop.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(left: SearchTerm, right: SearchTerm) -> Self {
        Self::And(Some(Box::new(left)), Some(Box::new(right)))
    }

    pub fn or(left: SearchTerm, right: SearchTerm) -> Self {
        Self::Or(Some(Box::new(left)), Some(Box::new(right)))
    }

    /// 把多个条件用 and 左结合串起来。
    pub fn all(terms: impl IntoIterator<Item = SearchTerm>) -> Option<Self> {
        terms.into_iter().reduce(Self::and)
    }

    /// 把多个条件用 or 左结合串起来。
    pub fn any(terms: impl IntoIterator<Item = SearchTerm>) -> Option<Self> {
        terms.into_iter().reduce(Self::or)
    }

    fn is_concat(&self) -> bool {
        matches!(self, Self::And(..) | Self::Or(..))
    }

    /// 空查询：永远不会匹配任何记录，会话直接返回空结果，不访问数据库。
    pub fn is_empty_query(&self) -> bool {
        match self {
            Self::Comparison { .. } => false,
            Self::In { values, .. } => values.is_empty(),
            Self::And(l, r) => match (l, r) {
                (None, None) => true,
                _ => l.iter().chain(r.iter()).any(|t| t.is_empty_query()),
            },
            Self::Or(l, r) => l.iter().chain(r.iter()).all(|t| t.is_empty_query()),
        }
    }

    /// 渲染为带 `:param` 的 SQL 片段，值依次追加到 `args`。空子树渲染为空串。
    pub fn to_expression(&self, mapping: &ObjectMapping, args: &mut Args) -> Result<String, CompileError> {
        if self.is_empty_query() {
            return Ok(String::new());
        }

        match self {
            Self::Comparison { prop, op, value } => render_comparison(mapping, args, prop, *op, value),
            Self::In { prop, values } => {
                let (col, data_type) = resolve(mapping, prop)?;
                let mut params = Vec::with_capacity(values.len());
                for v in values {
                    let name = args.add(prop, data_type.coerce(v.clone())?);
                    params.push(format!(":{name}"));
                }
                Ok(format!("{col} in ({})", params.join(", ")))
            }
            Self::And(l, r) => render_concat(mapping, args, l, r, "and"),
            Self::Or(l, r) => render_concat(mapping, args, l, r, "or"),
        }
    }
}

fn resolve<'m>(
    mapping: &'m ObjectMapping,
    prop: &str,
) -> Result<(&'m str, crate::sql_type::SqlDataType), CompileError> {
    let column = mapping
        .table()
        .column_by_prop(prop)
        .ok_or_else(|| CompileError::UnknownProperty {
            business: mapping.business().to_string(),
            prop: prop.to_string(),
        })?;
    Ok((column.col_name_for_sql(), column.data_type()))
}

fn render_comparison(
    mapping: &ObjectMapping,
    args: &mut Args,
    prop: &str,
    op: LogicOperation,
    value: &SqlValue,
) -> Result<String, CompileError> {
    let (col, data_type) = resolve(mapping, prop)?;

    if value.is_null() {
        match op {
            LogicOperation::Equal | LogicOperation::EqualIgnoreCase => return Ok(format!("{col} is null")),
            LogicOperation::NotEqual => return Ok(format!("{col} is not null")),
            _ => {}
        }
    }

    let value = match op {
        // like 的模式总是字符串
        LogicOperation::Like | LogicOperation::LikeIgnoreCase => value.clone(),
        _ => data_type.coerce(value.clone())?,
    };
    let param = args.add(prop, value);

    let sql = match op {
        LogicOperation::LikeIgnoreCase => mapping.dialect().like_ignore_case(col, &param),
        LogicOperation::EqualIgnoreCase => format!("lower({col}) = lower(:{param})"),
        _ => format!("{col} {} :{param}", op.sql_symbol()),
    };
    Ok(sql)
}

fn render_concat(
    mapping: &ObjectMapping,
    args: &mut Args,
    left: &Option<Box<SearchTerm>>,
    right: &Option<Box<SearchTerm>>,
    joiner: &str,
) -> Result<String, CompileError> {
    let render = |t: &Option<Box<SearchTerm>>, args: &mut Args| -> Result<(String, bool), CompileError> {
        match t {
            Some(t) => Ok((t.to_expression(mapping, args)?, t.is_concat())),
            None => Ok((String::new(), false)),
        }
    };
    let (l, l_concat) = render(left, args)?;
    let (r, r_concat) = render(right, args)?;

    if l.trim().is_empty() {
        return Ok(r);
    }
    if r.trim().is_empty() {
        return Ok(l);
    }

    let wrap = |s: String, concat: bool| {
        if concat { format!("({})", s.trim()) } else { s }
    };
    Ok(format!(" {} {joiner} {} ", wrap(l, l_concat), wrap(r, r_concat)))
}
