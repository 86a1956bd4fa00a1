//! エラー型定義
//!
//! 統一エラー型（thiserror使用）

use thiserror::Error;

/// モニター共通エラー型
#[derive(Debug, Error)]
pub enum MonitorError {
    /// ノード設定の検証エラー
    #[error("Validation error: {0}")]
    Validation(String),

    /// 永続化層のエラー
    #[error("Database error: {0}")]
    Database(String),

    /// HTTP通信エラー
    #[error("HTTP client error: {0}")]
    Http(String),

    /// ノードからの不正なRPC応答
    #[error("Malformed RPC response: {0}")]
    Rpc(String),

    /// 設定値エラー
    #[error("Configuration error: {0}")]
    Config(String),

    /// 監視ポート範囲にモニターが存在しない
    #[error("No monitor running in ports {start}..={end}")]
    MonitorNotFound {
        /// 走査範囲の開始ポート
        start: u16,
        /// 走査範囲の終了ポート
        end: u16,
    },

    /// 監視ポート範囲に空きポートがない
    #[error("No available port for monitor in {start}..={end}")]
    NoAvailablePort {
        /// 走査範囲の開始ポート
        start: u16,
        /// 走査範囲の終了ポート
        end: u16,
    },

    /// 復旧コマンドの起動失敗
    #[error("Failed to spawn `{cmd}`: {source}")]
    Spawn {
        /// 起動しようとしたコマンド
        cmd: String,
        /// 元のI/Oエラー
        #[source]
        source: std::io::Error,
    },

    /// I/Oエラー
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 内部エラー
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for MonitorError {
    fn from(err: sqlx::Error) -> Self {
        MonitorError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::Http(err.to_string())
    }
}

/// モニター共通のResult型
pub type MonitorResult<T> = Result<T, MonitorError>;
