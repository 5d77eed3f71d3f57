//! SqlDataType：列的声明类型，以及字符串到绑定值的转换。

use crate::value::SqlValue;
use time::format_description::FormatItem;
use time::macros::format_description;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DATETIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const DATETIME_T_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert [{value}] to sql type {data_type:?}")]
pub struct ConversionError {
    pub data_type: SqlDataType,
    pub value: String,
}

/// 内置的 SQL 类型。方言可以为厂商类型名注册别名（见 `Dialect::with_custom_type`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDataType {
    Int,
    BigInt,
    Double,
    Decimal,
    Bool,
    String,
    Clob,
    Bytes,
    Blob,
    Date,
    DateTime,
}

impl SqlDataType {
    /// 按类型名查找内置类型（大小写不敏感）。
    pub fn from_name(name: &str) -> Option<Self> {
        let t = match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" | "smallint" | "tinyint" | "short" | "byte" => Self::Int,
            "bigint" | "long" => Self::BigInt,
            "double" | "float" | "real" => Self::Double,
            "decimal" | "numeric" | "bigdecimal" => Self::Decimal,
            "bool" | "boolean" | "bit" => Self::Bool,
            "string" | "varchar" | "char" | "text" => Self::String,
            "clob" => Self::Clob,
            "bytes" | "binary" | "varbinary" => Self::Bytes,
            "blob" => Self::Blob,
            "date" => Self::Date,
            "datetime" | "timestamp" => Self::DateTime,
            _ => return None,
        };
        Some(t)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::BigInt | Self::Double | Self::Decimal)
    }

    pub fn is_lob(self) -> bool {
        matches!(self, Self::Clob | Self::Blob)
    }

    /// 把条件文本或模板参数中的字符串转换为本类型的值。
    ///
    /// 空串对非字符类型视为 `Null`。
    pub fn from_str_value(self, s: &str) -> Result<SqlValue, ConversionError> {
        let err = || ConversionError {
            data_type: self,
            value: s.to_string(),
        };
        let trimmed = s.trim();
        if trimmed.is_empty() && !matches!(self, Self::String | Self::Clob) {
            return Ok(SqlValue::Null);
        }

        match self {
            Self::Int | Self::BigInt => trimmed.parse::<i64>().map(SqlValue::I64).map_err(|_| err()),
            Self::Double => trimmed.parse::<f64>().map(SqlValue::F64).map_err(|_| err()),
            // decimal 保留原文，交给驱动按精度处理
            Self::Decimal => {
                trimmed.parse::<f64>().map_err(|_| err())?;
                Ok(SqlValue::String(trimmed.to_string().into()))
            }
            Self::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "y" | "yes" | "on" => Ok(SqlValue::Bool(true)),
                "false" | "0" | "n" | "no" | "off" => Ok(SqlValue::Bool(false)),
                _ => Err(err()),
            },
            Self::String | Self::Clob => Ok(SqlValue::String(s.to_string().into())),
            Self::Bytes | Self::Blob => Ok(SqlValue::Bytes(s.as_bytes().to_vec())),
            Self::Date => time::Date::parse(trimmed, DATE_FORMAT)
                .map(SqlValue::Date)
                .map_err(|_| err()),
            Self::DateTime => time::PrimitiveDateTime::parse(trimmed, DATETIME_FORMAT)
                .or_else(|_| time::PrimitiveDateTime::parse(trimmed, DATETIME_T_FORMAT))
                .or_else(|_| {
                    time::Date::parse(trimmed, DATE_FORMAT).map(|d| d.midnight())
                })
                .map(SqlValue::DateTime)
                .map_err(|_| err()),
        }
    }

    /// 绑定时的类型归一：字符串按本类型解析，其余值原样返回。
    pub fn coerce(self, value: SqlValue) -> Result<SqlValue, ConversionError> {
        match value {
            SqlValue::String(s) if !matches!(self, Self::String | Self::Clob) => {
                self.from_str_value(&s)
            }
            SqlValue::I64(v) if self == Self::Double => Ok(SqlValue::F64(v as f64)),
            SqlValue::I64(v) if self == Self::Bool => Ok(SqlValue::Bool(v != 0)),
            other => Ok(other),
        }
    }
}
