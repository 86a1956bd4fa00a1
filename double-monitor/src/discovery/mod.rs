//! モニターのディスカバリー
//!
//! 固定ポート範囲を走査して稼働中のモニターを探し、見つからなければ
//! 空きポートでデーモンを起動する。モニターは `GET /status` の応答に
//! 付与される `Server: double-monitor` ヘッダーで識別する。

use crate::api::MONITOR_SERVER_HEADER;
use crate::common::error::{MonitorError, MonitorResult};
use crate::health::revive::spawn_detached;
use futures::future::join_all;
use reqwest::{header, Client};
use std::net::{Ipv4Addr, TcpListener};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// モニター用ポート範囲の開始
pub const MONITOR_PORT_START: u16 = 9545;

/// モニター用ポート範囲の終了（この値を含む）
pub const MONITOR_PORT_END: u16 = 9644;

/// ポートごとの走査タイムアウト
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(1);

/// デーモン起動を待つ最大時間
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// モニター用ポート範囲
pub fn monitor_port_range() -> RangeInclusive<u16> {
    MONITOR_PORT_START..=MONITOR_PORT_END
}

fn probe_client(timeout: Duration) -> MonitorResult<Client> {
    Client::builder()
        .timeout(timeout)
        .no_proxy()
        .build()
        .map_err(|e| MonitorError::Http(format!("Failed to create HTTP client: {}", e)))
}

/// 指定ポートでモニターが応答するか確認する
pub async fn probe_port(client: &Client, port: u16) -> bool {
    let url = format!("http://127.0.0.1:{}/status", port);
    match client.get(&url).send().await {
        Ok(response) => response
            .headers()
            .get(header::SERVER)
            .is_some_and(|server| server == MONITOR_SERVER_HEADER),
        Err(_) => false,
    }
}

/// 既定のポート範囲でモニターを探す
pub async fn scan_for_monitor() -> MonitorResult<u16> {
    scan_for_monitor_in(monitor_port_range(), DEFAULT_SCAN_TIMEOUT).await
}

/// 指定範囲の全ポートを並列に走査し、モニターが応答した最小のポートを返す
pub async fn scan_for_monitor_in(range: RangeInclusive<u16>, timeout: Duration) -> MonitorResult<u16> {
    let (start, end) = (*range.start(), *range.end());
    let client = probe_client(timeout)?;

    let ports: Vec<u16> = range.collect();
    let results = join_all(ports.iter().map(|&port| probe_port(&client, port))).await;

    match ports
        .into_iter()
        .zip(results)
        .find_map(|(port, found)| found.then_some(port))
    {
        Some(port) => {
            debug!(port, "Found running monitor");
            Ok(port)
        }
        None => {
            debug!(start, end, "No monitor running");
            Err(MonitorError::MonitorNotFound { start, end })
        }
    }
}

/// 既定のポート範囲で最初に使用可能なポートを返す
pub fn first_available_port() -> MonitorResult<u16> {
    first_available_port_in(monitor_port_range())
}

/// 指定範囲で `127.0.0.1` にバインドできる最小のポートを返す
///
/// 確認に使ったリスナーは即座に閉じる。
pub fn first_available_port_in(range: RangeInclusive<u16>) -> MonitorResult<u16> {
    let (start, end) = (*range.start(), *range.end());
    range
        .into_iter()
        .find(|&port| TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok())
        .ok_or(MonitorError::NoAvailablePort { start, end })
}

/// デーモン起動方法
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// 起動する実行ファイル
    pub program: PathBuf,
    /// `serve --port N` の後に渡す追加引数
    pub extra_args: Vec<String>,
    /// 走査・起動に使うポート範囲
    pub port_range: RangeInclusive<u16>,
    /// ポートごとの走査タイムアウト
    pub scan_timeout: Duration,
    /// 起動完了を待つ最大時間
    pub startup_timeout: Duration,
}

impl StartOptions {
    /// 現在の実行ファイルをデーモンとして起動する設定
    pub fn current_exe() -> MonitorResult<Self> {
        Ok(Self::with_program(std::env::current_exe()?))
    }

    /// 任意の実行ファイルを起動する設定
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            port_range: monitor_port_range(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

/// 探索・起動したモニターの情報
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedMonitor {
    /// モニターのポート
    pub port: u16,
    /// 今回起動した場合はそのPID
    pub spawned_pid: Option<u32>,
}

/// 稼働中のモニターを探し、なければ起動する
pub async fn find_or_start(options: &StartOptions) -> MonitorResult<LocatedMonitor> {
    match scan_for_monitor_in(options.port_range.clone(), options.scan_timeout).await {
        Ok(port) => {
            return Ok(LocatedMonitor {
                port,
                spawned_pid: None,
            })
        }
        Err(MonitorError::MonitorNotFound { .. }) => {}
        Err(e) => return Err(e),
    }

    let port = first_available_port_in(options.port_range.clone())?;
    let mut args = vec!["serve".to_string(), "--port".to_string(), port.to_string()];
    args.extend(options.extra_args.iter().cloned());

    let program = options.program.display().to_string();
    let spawned_pid = spawn_detached(&program, &args)?;
    info!(port, pid = ?spawned_pid, "Started monitor daemon");

    let client = probe_client(options.scan_timeout)?;
    let deadline = tokio::time::Instant::now() + options.startup_timeout;
    loop {
        if probe_port(&client, port).await {
            return Ok(LocatedMonitor { port, spawned_pid });
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(MonitorError::Internal(format!(
                "Monitor did not start on port {} within {:?}",
                port, options.startup_timeout
            )));
        }
        tokio::time::sleep(STARTUP_POLL_INTERVAL).await;
    }
}
