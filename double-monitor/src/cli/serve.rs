//! serve サブコマンド
//!
//! モニターデーモンをフォアグラウンドで起動する。

use crate::config::{default_database_url, MonitorConfig};
use crate::db::{self, nodes::import_jsonl, NodeStore};
use crate::discovery::first_available_port;
use crate::lock::MonitorLock;
use crate::monitor::{Monitor, DEFAULT_HOST};
use crate::registry::NodeRegistry;
use crate::server::shutdown_signal;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// serve サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Listen port (default: first available port in the monitor range)
    #[arg(short, long, env = "DOUBLE_MONITOR_PORT")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(short = 'H', long, default_value = DEFAULT_HOST, env = "DOUBLE_MONITOR_HOST")]
    pub host: String,

    /// SQLite database URL
    #[arg(long)]
    pub database_url: Option<String>,

    /// Interval between ping rounds in milliseconds
    #[arg(long)]
    pub heartbeat_interval_ms: Option<u64>,

    /// Consecutive failed pings before the revive command runs
    #[arg(long)]
    pub failure_tolerance: Option<u32>,

    /// Timeout of a single ping in milliseconds
    #[arg(long)]
    pub ping_timeout_ms: Option<u64>,

    /// Import node configs from a JSON-lines file before serving
    #[arg(long, value_name = "FILE")]
    pub import: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl ServeArgs {
    /// 引数と環境変数から動作設定を組み立てる（引数優先）
    pub fn monitor_config(&self) -> anyhow::Result<MonitorConfig> {
        let env = MonitorConfig::from_env()?;
        Ok(MonitorConfig::new(
            self.heartbeat_interval_ms
                .unwrap_or(env.heartbeat_interval.as_millis() as u64),
            self.failure_tolerance.unwrap_or(env.failure_tolerance),
            self.ping_timeout_ms
                .unwrap_or(env.ping_timeout.as_millis() as u64),
        )?)
    }

    /// 使用するデータベースURL
    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(default_database_url)
    }
}

/// serve コマンドを実行
pub async fn execute(args: &ServeArgs) -> Result<(), anyhow::Error> {
    let config = args.monitor_config()?;
    let database_url = args.database_url();
    let port = match args.port {
        Some(port) => port,
        None => first_available_port()?,
    };

    let lock = MonitorLock::acquire(port, &database_url)?;

    let pool = db::init_db_pool(&database_url).await?;
    let registry = NodeRegistry::load(NodeStore::new(pool.clone())).await?;

    if let Some(path) = &args.import {
        import_nodes(&registry, path).await?;
    }

    let monitor = Monitor::new(registry, config)?.with_host(args.host.clone());
    let addr = monitor.start(port).await?;
    info!(%addr, database_url = %database_url, "double-monitor is serving");

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = monitor.wait() => {}
    }

    monitor.stop().await;
    pool.close().await;
    lock.release()?;
    Ok(())
}

/// JSON Lines形式のファイルからノードを登録する
///
/// 既に同じ設定で登録済みのエントリは取り込まない。
async fn import_nodes(registry: &NodeRegistry, path: &std::path::Path) -> anyhow::Result<()> {
    let known = registry.snapshot().await;
    let configs: Vec<_> = import_jsonl(path)
        .await?
        .into_iter()
        .filter(|config| !known.iter().any(|node| &node.config == config))
        .collect();

    let count = configs.len();
    if count > 0 {
        registry.register_all(configs).await?;
    }
    info!(path = %path.display(), imported = count, "Imported node configs");
    Ok(())
}
