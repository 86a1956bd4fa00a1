//! モニターインスタンス
//!
//! レジストリ、HTTPリスナー、pingタイマーを束ね、`start` / `stop` の
//! ライフサイクルを提供する。

use crate::api;
use crate::common::error::{MonitorError, MonitorResult};
use crate::config::{MonitorConfig, MIN_HEARTBEAT_INTERVAL_MS};
use crate::health::LivenessProber;
use crate::registry::NodeRegistry;
use crate::server;
use crate::shutdown::ShutdownController;
use crate::AppState;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// デフォルトのバインドホスト
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// グレースフルシャットダウンを待つ最大時間
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

struct Running {
    local_addr: SocketAddr,
    shutdown: ShutdownController,
    server: JoinHandle<MonitorResult<()>>,
    prober: JoinHandle<()>,
}

/// ノード監視デーモンの本体
pub struct Monitor {
    registry: NodeRegistry,
    config: MonitorConfig,
    host: String,
    running: Mutex<Option<Running>>,
}

impl Monitor {
    /// 設定を検証してモニターを作成
    pub fn new(registry: NodeRegistry, config: MonitorConfig) -> MonitorResult<Self> {
        if config.heartbeat_interval < Duration::from_millis(MIN_HEARTBEAT_INTERVAL_MS) {
            return Err(MonitorError::Config(format!(
                "Heartbeat interval must be at least {} milliseconds",
                MIN_HEARTBEAT_INTERVAL_MS
            )));
        }
        if config.failure_tolerance < 1 {
            return Err(MonitorError::Config(
                "failureTolerance must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            registry,
            config,
            host: DEFAULT_HOST.to_string(),
            running: Mutex::new(None),
        })
    }

    /// バインドするホストを変更
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// 監視対象のレジストリ
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// HTTPサーバーとpingタイマーを開始し、バインドしたアドレスを返す
    ///
    /// `port` に0を指定するとOSが空きポートを割り当てる。
    pub async fn start(&self, port: u16) -> MonitorResult<SocketAddr> {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            return Err(MonitorError::Internal(format!(
                "Monitor already running on {}",
                current.local_addr
            )));
        }

        let listener = TcpListener::bind((self.host.as_str(), port)).await?;
        let local_addr = listener.local_addr()?;
        let prober = LivenessProber::new(self.registry.clone(), &self.config)?;

        let shutdown = ShutdownController::default();
        let app = api::create_app(AppState::new(self.registry.clone()));
        let server = tokio::spawn(server::serve(listener, app, shutdown.clone()));
        let prober = prober.start(shutdown.clone());

        info!(
            address = %local_addr,
            nodes = self.registry.len().await,
            "Monitor started"
        );

        *running = Some(Running {
            local_addr,
            shutdown,
            server,
            prober,
        });
        Ok(local_addr)
    }

    /// 稼働中であればバインドしているアドレス
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.local_addr)
    }

    /// pingタイマーを止め、リスナーを閉じる
    ///
    /// 未起動または停止済みの場合は何もしない。
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        running.shutdown.request_shutdown();
        running.prober.abort();
        let _ = running.prober.await;

        let mut server = running.server;
        match tokio::time::timeout(SERVER_DRAIN_TIMEOUT, &mut server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!("Server stopped with error: {}", e),
            Ok(Err(e)) => warn!("Server task join error: {}", e),
            Err(_) => {
                warn!("Server did not drain in time, aborting");
                server.abort();
            }
        }

        info!(address = %running.local_addr, "Monitor stopped");
    }

    /// 停止要求（`stop` またはシャットダウン要求）まで待機
    ///
    /// 未起動の場合は即座に戻る。
    pub async fn wait(&self) {
        let shutdown = self
            .running
            .lock()
            .await
            .as_ref()
            .map(|r| r.shutdown.clone());
        if let Some(shutdown) = shutdown {
            shutdown.wait().await;
        }
    }
}
