//! ログ初期化
//!
//! `DOUBLE_MONITOR_LOG_LEVEL`（未設定なら `RUST_LOG`）でフィルタを指定する。
//! デフォルトは `info`。ログファイルを指定した場合は標準エラーではなく
//! そのファイルへ追記する。

use crate::common::error::{MonitorError, MonitorResult};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ログレベル指定の環境変数
pub const LOG_LEVEL_ENV: &str = "DOUBLE_MONITOR_LOG_LEVEL";

/// 環境変数からログフィルタを組み立てる
pub fn env_filter() -> EnvFilter {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// ログを初期化する
///
/// ファイル出力時に返される `WorkerGuard` はプロセス終了まで保持すること。
/// 破棄するとバッファ済みのログが書き出されなくなる。
pub fn init(log_file: Option<&Path>) -> MonitorResult<Option<WorkerGuard>> {
    let registry = tracing_subscriber::registry().with(env_filter());

    let Some(path) = log_file else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| MonitorError::Config(format!("Failed to initialize logging: {}", e)))?;
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| MonitorError::Config(format!("Invalid log file path: {}", path.display())))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory)?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    registry
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| MonitorError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(Some(guard))
}
