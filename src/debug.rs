//! DebugService：SQL 日志与耗时统计。
//!
//! 自带的 `TracingDebugService` 通过 `tracing` 输出，订阅器由应用自行安装。

use crate::config::SessionConfig;
use crate::value::SqlValue;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub trait DebugService: Send + Sync + fmt::Debug {
    fn is_log_sql(&self) -> bool;

    fn is_measure_time(&self) -> bool;

    /// `elapsed` 仅在开启耗时统计时传入。
    fn log_sql(&self, sql: &str, params: &[SqlValue], elapsed: Option<Duration>);
}

/// 日志用的参数串，如 `[1, lily]`。
pub fn format_params(params: &[SqlValue]) -> String {
    let items: Vec<String> = params.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingDebugService {
    log_sql: bool,
    measure_time: bool,
    slow_threshold: Duration,
}

impl TracingDebugService {
    pub fn new(log_sql: bool, measure_time: bool, slow_threshold: Duration) -> Self {
        Self {
            log_sql,
            measure_time,
            slow_threshold,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.log_sql, config.measure_time, config.slow_sql_threshold())
    }

    pub fn is_slow(&self, elapsed: Duration) -> bool {
        elapsed >= self.slow_threshold
    }
}

impl Default for TracingDebugService {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

impl DebugService for TracingDebugService {
    fn is_log_sql(&self) -> bool {
        self.log_sql
    }

    fn is_measure_time(&self) -> bool {
        self.measure_time
    }

    fn log_sql(&self, sql: &str, params: &[SqlValue], elapsed: Option<Duration>) {
        let params = format_params(params);
        match elapsed {
            Some(elapsed) if self.is_slow(elapsed) => warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                params = %params,
                "slow sql: {sql}"
            ),
            Some(elapsed) => debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                params = %params,
                "sql: {sql}"
            ),
            None => debug!(params = %params, "sql: {sql}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DebugService, TracingDebugService, format_params};
    use crate::config::SessionConfig;
    use crate::value::SqlValue;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn params_are_listed_in_order() {
        assert_eq!(format_params(&[SqlValue::I64(1), "lily".into(), SqlValue::Null]), "[1, lily, NULL]");
        assert_eq!(format_params(&[]), "[]");
    }

    #[test]
    fn built_from_session_config() {
        let config = SessionConfig {
            measure_time: true,
            slow_sql_threshold_ms: 20,
            ..SessionConfig::default()
        };
        let svc = TracingDebugService::from_config(&config);
        assert!(svc.is_log_sql());
        assert!(svc.is_measure_time());
        assert!(svc.is_slow(Duration::from_millis(20)));
        assert!(!svc.is_slow(Duration::from_millis(19)));
    }
}
