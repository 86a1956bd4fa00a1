//! ノード復旧コントローラー
//!
//! pingの失敗ごとに呼び出され、連続失敗回数が許容値に達したノードの
//! 復旧コマンドをデタッチしたサブプロセスとして起動する。
//!
//! 閾値を超えた後も失敗が続く限り、pingの失敗ごとに復旧を再試行する。

use crate::common::error::{MonitorError, MonitorResult};
use crate::types::node::NodeStatus;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// 復旧判定の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevivalDecision {
    /// 許容失敗回数に達していない
    BelowThreshold,
    /// 復旧コマンドが設定されていない
    NoCommand,
    /// 復旧コマンドを実行する
    Revive {
        /// 実行するコマンド
        cmd: String,
        /// コマンド引数
        args: Vec<String>,
    },
}

/// 復旧コントローラー
#[derive(Debug, Clone, Copy)]
pub struct RevivalController {
    failure_tolerance: u32,
}

impl RevivalController {
    /// 許容失敗回数を指定して作成（最小1）
    pub fn new(failure_tolerance: u32) -> Self {
        Self {
            failure_tolerance: failure_tolerance.max(1),
        }
    }

    /// 許容失敗回数
    pub fn failure_tolerance(&self) -> u32 {
        self.failure_tolerance
    }

    /// ノード状態から復旧の要否を判定する
    pub fn decide(&self, node: &NodeStatus) -> RevivalDecision {
        if node.failure_count < self.failure_tolerance {
            return RevivalDecision::BelowThreshold;
        }

        match &node.config.revive_cmd {
            Some(cmd) => RevivalDecision::Revive {
                cmd: cmd.clone(),
                args: node.config.revive_args.clone().unwrap_or_default(),
            },
            None => RevivalDecision::NoCommand,
        }
    }

    /// 必要であれば復旧コマンドを起動し、起動したプロセスのPIDを返す
    ///
    /// 起動失敗はログに記録して `None` を返す（デーモンは動作を継続する）。
    pub fn try_revive(&self, node: &NodeStatus) -> Option<u32> {
        match self.decide(node) {
            RevivalDecision::BelowThreshold => {
                debug!(
                    address = %node.address(),
                    failure_count = node.failure_count,
                    failure_tolerance = self.failure_tolerance,
                    "Node hasn't reached failure threshold, not reviving"
                );
                None
            }
            RevivalDecision::NoCommand => {
                debug!(address = %node.address(), "Node has no revive command");
                None
            }
            RevivalDecision::Revive { cmd, args } => match spawn_detached(&cmd, &args) {
                Ok(pid) => {
                    info!(
                        address = %node.address(),
                        cmd = %cmd,
                        args = ?args,
                        pid = ?pid,
                        "Spawned revive command"
                    );
                    pid
                }
                Err(e) => {
                    warn!(address = %node.address(), error = %e, "Failed to revive node");
                    None
                }
            },
        }
    }
}

/// コマンドをデタッチして起動する
///
/// 標準入出力は破棄し、Unixでは独立したプロセスグループで起動する。
/// 終了は待たないが、ゾンビを残さないよう終了ステータスだけを
/// バックグラウンドで回収する。
pub fn spawn_detached(cmd: &str, args: &[String]) -> MonitorResult<Option<u32>> {
    let mut command = Command::new(cmd);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(false);

    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|source| MonitorError::Spawn {
        cmd: cmd.to_string(),
        source,
    })?;
    let pid = child.id();

    let cmd = cmd.to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!(cmd = %cmd, ?pid, %status, "Revive command exited"),
            Err(e) => debug!(cmd = %cmd, ?pid, error = %e, "Failed to reap revive command"),
        }
    });

    Ok(pid)
}
