//! 配置结构：调用方从任意格式反序列化（serde），本 crate 不负责读文件。

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// 会话配置。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 单条语句的查询超时（秒），不设置则不限制。
    pub query_timeout_secs: Option<u64>,
    pub log_sql: bool,
    pub measure_time: bool,
    /// 超过该耗时的语句按慢 SQL 记录。
    pub slow_sql_threshold_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: None,
            log_sql: true,
            measure_time: false,
            slow_sql_threshold_ms: 1000,
        }
    }
}

impl SessionConfig {
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_secs.map(Duration::from_secs)
    }

    pub fn slow_sql_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_sql_threshold_ms)
    }
}

/// 数据库组配置。主从库按数据源名称引用。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GroupConfig {
    Physics {
        name: String,
        master: String,
        #[serde(default)]
        slave: Option<String>,
    },
    Virtual {
        name: String,
        router: RouterConfig,
    },
}

impl GroupConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Physics { name, .. } | Self::Virtual { name, .. } => name,
        }
    }
}

/// 虚拟组的分库路由。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RouterConfig {
    /// 键值（转为字符串）查表。
    Equality {
        key: String,
        routes: BTreeMap<String, String>,
        #[serde(default)]
        default: Option<String>,
    },
    /// 整数键值对组数取模。
    Modulo { key: String, groups: Vec<String> },
}
