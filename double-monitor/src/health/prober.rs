//! ノード死活監視（ハートビート）
//!
//! 一定間隔で全ノードへ JSON-RPC `net_version` を並列に送信し、
//! 応答に応じてレジストリを更新する。
//!
//! リクエストIDには `lastResponseId + 1` を用い、`lastResponseId` 以下のIDを持つ
//! 応答は古い応答として破棄する（重複したラウンドの競合対策）。

use crate::common::error::{MonitorError, MonitorResult};
use crate::config::MonitorConfig;
use crate::health::revive::RevivalController;
use crate::registry::NodeRegistry;
use crate::shutdown::ShutdownController;
use crate::types::node::NodeStatus;
use chrono::Utc;
use futures::future::join_all;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// ハートビートに使うRPCメソッド
pub const HEARTBEAT_METHOD: &str = "net_version";

/// 1回のpingの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    /// 応答を受理した
    Accepted,
    /// 古い応答のため破棄した
    Stale,
    /// 通信失敗または不正な応答
    Failed,
    /// 対象ノードが存在しない
    Missing,
}

/// 検証済みのハートビート応答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatResponse {
    /// 応答のリクエストID
    pub id: u64,
    /// `result` フィールド（ネットワークID）
    pub result: String,
}

impl HeartbeatResponse {
    /// JSON-RPC応答を検証する
    ///
    /// `id`（非負整数）と `result`（null以外）の両方が必要。
    /// `u64::MAX` は次のリクエストIDを作れないため不正な応答とする。
    pub fn parse(body: &Value) -> MonitorResult<Self> {
        let id = body
            .get("id")
            .ok_or_else(|| MonitorError::Rpc("response does not contain id field".to_string()))?
            .as_u64()
            .ok_or_else(|| MonitorError::Rpc("id is not a number".to_string()))?;
        if id == u64::MAX {
            return Err(MonitorError::Rpc("id is out of range".to_string()));
        }

        let result = match body.get("result") {
            None | Some(Value::Null) => {
                return Err(MonitorError::Rpc(
                    "response does not contain result field".to_string(),
                ))
            }
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        Ok(Self { id, result })
    }
}

/// 応答をノード状態に反映する
///
/// IDが `last_response_id` より大きい場合のみ受理する。
/// 古い応答ではどのフィールドも変更しない。
pub fn apply_response(status: &mut NodeStatus, response: &HeartbeatResponse) -> PingOutcome {
    if response.id <= status.last_response_id {
        return PingOutcome::Stale;
    }

    status.alive = true;
    status.network_id = Some(response.result.clone());
    status.last_update = Utc::now();
    status.failure_count = 0;
    status.last_response_id = response.id;
    PingOutcome::Accepted
}

/// 失敗をノード状態に反映する
///
/// `last_response_id` と `network_id` は変更しない。
pub fn apply_failure(status: &mut NodeStatus) {
    status.alive = false;
    status.failure_count = status.failure_count.saturating_add(1);
}

/// ノードのアドレスからRPCのURLを組み立てる
pub fn rpc_url(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

/// ノード死活監視
#[derive(Clone)]
pub struct LivenessProber {
    registry: NodeRegistry,
    client: Client,
    revival: RevivalController,
    heartbeat_interval: Duration,
}

impl LivenessProber {
    /// 新しいプローバーを作成
    pub fn new(registry: NodeRegistry, config: &MonitorConfig) -> MonitorResult<Self> {
        let client = Client::builder()
            .timeout(config.ping_timeout)
            .build()
            .map_err(|e| MonitorError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            registry,
            client,
            revival: RevivalController::new(config.failure_tolerance),
            heartbeat_interval: config.heartbeat_interval,
        })
    }

    /// ハートビート間隔
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// バックグラウンドで監視を開始
    ///
    /// シャットダウン要求を受けるとループを抜ける。
    pub fn start(self, shutdown: ShutdownController) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.monitor_loop(shutdown).await;
        })
    }

    /// 監視ループ
    async fn monitor_loop(&self, shutdown: ShutdownController) {
        let mut timer = interval(self.heartbeat_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_ms = self.heartbeat_interval.as_millis() as u64,
            failure_tolerance = self.revival.failure_tolerance(),
            "Liveness prober started"
        );

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    // 前ラウンドの遅延応答は待たない
                    self.spawn_round().await;
                }
                _ = shutdown.wait() => {
                    debug!("Liveness prober shutting down");
                    break;
                }
            }
        }
    }

    /// 全ノードへのpingを起動する（完了は待たない）
    pub async fn spawn_round(&self) -> Vec<JoinHandle<PingOutcome>> {
        let count = self.registry.len().await;
        (0..count)
            .map(|index| {
                let prober = self.clone();
                tokio::spawn(async move { prober.check_node(index).await })
            })
            .collect()
    }

    /// 全ノードをpingし、全ての結果を待つ
    pub async fn check_all(&self) -> Vec<PingOutcome> {
        let handles = self.spawn_round().await;
        join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Ping task join error: {}", e);
                    PingOutcome::Failed
                }
            })
            .collect()
    }

    /// 単一ノードのヘルスチェック
    pub async fn check_node(&self, index: usize) -> PingOutcome {
        let Some(node) = self.registry.get(index).await else {
            return PingOutcome::Missing;
        };
        let Some(request_id) = node.last_response_id.checked_add(1) else {
            warn!(
                address = %node.address(),
                last_response_id = node.last_response_id,
                "Request id space exhausted"
            );
            return self.handle_failure(index).await;
        };

        match self.ping(node.address(), request_id).await {
            Ok(response) => {
                let outcome = self
                    .registry
                    .apply(index, |status| apply_response(status, &response))
                    .await
                    .unwrap_or(PingOutcome::Missing);

                match outcome {
                    PingOutcome::Accepted => debug!(
                        address = %node.address(),
                        id = response.id,
                        network_id = %response.result,
                        "Heartbeat accepted"
                    ),
                    PingOutcome::Stale => debug!(
                        address = %node.address(),
                        id = response.id,
                        "Discarded stale heartbeat response"
                    ),
                    _ => {}
                }
                outcome
            }
            Err(e) => {
                warn!(
                    address = %node.address(),
                    error = %e,
                    "Failed to contact node"
                );
                self.handle_failure(index).await
            }
        }
    }

    async fn handle_failure(&self, index: usize) -> PingOutcome {
        let Some(updated) = self
            .registry
            .apply(index, |status| {
                apply_failure(status);
                status.clone()
            })
            .await
        else {
            return PingOutcome::Missing;
        };

        if let Some(pid) = self.revival.try_revive(&updated) {
            self.registry
                .apply(index, |status| status.last_process_id = Some(pid))
                .await;
        }

        PingOutcome::Failed
    }

    /// `net_version` を送信し、応答を検証する
    async fn ping(&self, address: &str, request_id: u64) -> MonitorResult<HeartbeatResponse> {
        let response = self
            .client
            .post(rpc_url(address))
            .json(&json!({
                "jsonrpc": "2.0",
                "method": HEARTBEAT_METHOD,
                "params": [],
                "id": request_id,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MonitorError::Http(format!("HTTP {}", response.status())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| MonitorError::Rpc(format!("invalid JSON body: {}", e)))?;

        HeartbeatResponse::parse(&body)
    }
}
