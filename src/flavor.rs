//! SQL Flavor（数据库种类）：控制占位符、标识符转义、分页与锁子句改写。

use serde::Deserialize;
use std::fmt;

/// 支持的数据库种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    #[default]
    MySQL,
    #[serde(alias = "postgres")]
    PostgreSQL,
    SQLite,
    Oracle,
    H2,
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MySQL => "MySQL",
            Self::PostgreSQL => "PostgreSQL",
            Self::SQLite => "SQLite",
            Self::Oracle => "Oracle",
            Self::H2 => "H2",
        };
        f.write_str(s)
    }
}

const FOR_UPDATE: &str = " for update";
const FOR_UPDATE_NOWAIT: &str = " for update nowait";

/// 拆出 SQL 末尾的锁子句，分页改写后再原样接回。
fn split_lock_suffix(sql: &str) -> (&str, &str) {
    let sql = sql.trim();
    let lower = sql.to_ascii_lowercase();
    for suffix in [FOR_UPDATE_NOWAIT, FOR_UPDATE] {
        if lower.ends_with(suffix) {
            let at = sql.len() - suffix.len();
            return (&sql[..at], &sql[at..]);
        }
    }
    (sql, "")
}

impl Flavor {
    /// 为列名/表名加引号。
    pub fn quote(self, name: &str) -> String {
        match self {
            Self::MySQL => format!("`{name}`"),
            Self::PostgreSQL | Self::SQLite | Self::Oracle | Self::H2 => format!("\"{name}\""),
        }
    }

    /// 写入第 `index_1_based` 个绑定占位符。
    pub(crate) fn write_placeholder(self, index_1_based: usize, out: &mut String) {
        match self {
            Self::MySQL | Self::SQLite | Self::H2 => out.push('?'),
            Self::PostgreSQL => {
                out.push('$');
                out.push_str(&index_1_based.to_string());
            }
            Self::Oracle => {
                out.push(':');
                out.push_str(&index_1_based.to_string());
            }
        }
    }

    /// 分页改写。`offset` 从 0 开始；末尾已有的锁子句保持在最后。
    pub fn limited_string(self, sql: &str, offset: usize, limit: usize) -> String {
        let (body, lock) = split_lock_suffix(sql);
        let mut out = String::with_capacity(body.len() + 64);

        match self {
            Self::MySQL => {
                out.push_str(body);
                if offset > 0 {
                    out.push_str(&format!(" limit {offset}, {limit}"));
                } else {
                    out.push_str(&format!(" limit {limit}"));
                }
            }
            Self::PostgreSQL | Self::SQLite | Self::H2 => {
                out.push_str(body);
                out.push_str(&format!(" limit {limit}"));
                if offset > 0 {
                    out.push_str(&format!(" offset {offset}"));
                }
            }
            Self::Oracle => {
                if offset > 0 {
                    out.push_str("select * from ( select row_.*, rownum rownum_ from ( ");
                    out.push_str(body);
                    out.push_str(&format!(
                        " ) row_ ) where rownum_ <= {} and rownum_ > {offset}",
                        limit.saturating_add(offset)
                    ));
                } else {
                    out.push_str("select * from ( ");
                    out.push_str(body);
                    out.push_str(&format!(" ) where rownum <= {limit}"));
                }
            }
        }

        out.push_str(lock);
        out
    }

    /// `select ... for update`。SQLite 没有行锁，原样返回。
    pub fn for_update_string(self, sql: &str) -> String {
        match self {
            Self::SQLite => sql.to_string(),
            _ => format!("{sql}{FOR_UPDATE}"),
        }
    }

    /// `select ... for update nowait`，不支持 nowait 的库退化为 `for update`。
    pub fn for_update_no_wait_string(self, sql: &str) -> String {
        match self {
            Self::SQLite => sql.to_string(),
            Self::H2 => format!("{sql}{FOR_UPDATE}"),
            _ => format!("{sql}{FOR_UPDATE_NOWAIT}"),
        }
    }

    /// 本库默认的主键生成策略名。
    pub fn native_id_generator(self) -> &'static str {
        match self {
            Self::PostgreSQL | Self::Oracle => "sequence",
            Self::MySQL | Self::SQLite | Self::H2 => "identity",
        }
    }

    pub fn supports_sequence(self) -> bool {
        matches!(self, Self::PostgreSQL | Self::Oracle | Self::H2)
    }

    /// 取序列下一个值的语句；不支持序列的库返回 `None`。
    pub fn select_sequence_clause(self, sequence: &str) -> Option<String> {
        match self {
            Self::PostgreSQL => Some(format!("select nextval('{sequence}')")),
            Self::Oracle => Some(format!("select {sequence}.nextval from dual")),
            Self::H2 => Some(format!("call next value for {sequence}")),
            Self::MySQL | Self::SQLite => None,
        }
    }

    /// 取最近一次自增主键的语句。
    pub fn select_inserted_auto_id_clause(self) -> Option<&'static str> {
        match self {
            Self::MySQL => Some("select last_insert_id()"),
            Self::SQLite => Some("select last_insert_rowid()"),
            Self::H2 => Some("call identity()"),
            Self::PostgreSQL | Self::Oracle => None,
        }
    }

    pub fn default_batch_size(self) -> usize {
        match self {
            Self::Oracle => 10,
            _ => 20,
        }
    }
}
