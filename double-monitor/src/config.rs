//! Configuration management via environment variables
//!
//! Provides helper functions for reading `DOUBLE_MONITOR_*` environment
//! variables, and the validated daemon settings.

use crate::common::error::{MonitorError, MonitorResult};
use std::time::Duration;

/// 最小のハートビート間隔（ミリ秒）
pub const MIN_HEARTBEAT_INTERVAL_MS: u64 = 1000;

/// デフォルトのハートビート間隔（ミリ秒）
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5000;

/// デフォルトの許容失敗回数
pub const DEFAULT_FAILURE_TOLERANCE: u32 = 1;

/// デフォルトのpingタイムアウト（ミリ秒）
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 3000;

/// Get an environment variable, treating an empty value as unset
///
/// # Example
/// ```
/// use double_monitor::config::get_env;
///
/// let port = get_env("DOUBLE_MONITOR_PORT");
/// ```
pub fn get_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|val| !val.is_empty())
}

/// Get an environment variable with a default value
pub fn get_env_or(name: &str, default: &str) -> String {
    get_env(name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable, parsing to a specific type
///
/// Returns `default` if unset. An unparsable value is logged and ignored.
pub fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match get_env(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value '{}' for {}", raw, name);
            default
        }),
        None => default,
    }
}

/// デフォルトのデータベースURLを取得
///
/// `DOUBLE_MONITOR_DATABASE_URL` が未設定の場合は
/// `~/.double-monitor/monitor.db` を使用する。
pub fn default_database_url() -> String {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    get_env_or(
        "DOUBLE_MONITOR_DATABASE_URL",
        &format!("sqlite:{}/.double-monitor/monitor.db", home),
    )
}

/// モニターデーモンの動作設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// pingラウンドの間隔
    pub heartbeat_interval: Duration,
    /// 復旧を試みるまでに許容する連続失敗回数
    pub failure_tolerance: u32,
    /// 1回のpingリクエストのタイムアウト
    pub ping_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS),
            failure_tolerance: DEFAULT_FAILURE_TOLERANCE,
            ping_timeout: Duration::from_millis(DEFAULT_PING_TIMEOUT_MS),
        }
    }
}

impl MonitorConfig {
    /// 各値を検証して設定を作成
    ///
    /// pingタイムアウトはハートビート間隔より長くならないよう切り詰める。
    pub fn new(
        heartbeat_interval_ms: u64,
        failure_tolerance: u32,
        ping_timeout_ms: u64,
    ) -> MonitorResult<Self> {
        if heartbeat_interval_ms < MIN_HEARTBEAT_INTERVAL_MS {
            return Err(MonitorError::Config(format!(
                "Heartbeat interval must be at least {} milliseconds",
                MIN_HEARTBEAT_INTERVAL_MS
            )));
        }
        if failure_tolerance < 1 {
            return Err(MonitorError::Config(
                "failureTolerance must be at least 1".to_string(),
            ));
        }
        if ping_timeout_ms == 0 {
            return Err(MonitorError::Config(
                "Ping timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            heartbeat_interval: Duration::from_millis(heartbeat_interval_ms),
            failure_tolerance,
            ping_timeout: Duration::from_millis(ping_timeout_ms.min(heartbeat_interval_ms)),
        })
    }

    /// 環境変数から設定を読み込む
    pub fn from_env() -> MonitorResult<Self> {
        Self::new(
            get_env_parse(
                "DOUBLE_MONITOR_HEARTBEAT_INTERVAL_MS",
                DEFAULT_HEARTBEAT_INTERVAL_MS,
            ),
            get_env_parse("DOUBLE_MONITOR_FAILURE_TOLERANCE", DEFAULT_FAILURE_TOLERANCE),
            get_env_parse("DOUBLE_MONITOR_PING_TIMEOUT_MS", DEFAULT_PING_TIMEOUT_MS),
        )
    }
}
