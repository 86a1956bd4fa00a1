//! 監視対象ノード型定義

use crate::common::error::{MonitorError, MonitorResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// ノードの登録設定
///
/// 登録後は変更されない。`reviveArgs` は配列のほか、
/// 空白区切りの文字列（旧JSON Lines形式）も受け付ける。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    /// ノードのRPCアドレス（host:port形式）
    pub address: String,
    /// 所属プロジェクト
    pub project: String,
    /// 所属環境
    pub environment: String,
    /// ノードを再起動するためのコマンド
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revive_cmd: Option<String>,
    /// 再起動コマンドの引数
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_revive_args"
    )]
    pub revive_args: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReviveArgsRepr {
    Tokens(Vec<String>),
    Line(String),
}

fn deserialize_revive_args<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<ReviveArgsRepr>::deserialize(deserializer)?;
    Ok(repr.map(|repr| match repr {
        ReviveArgsRepr::Tokens(tokens) => tokens,
        ReviveArgsRepr::Line(line) => split_revive_args(&line),
    }))
}

/// 空白区切りの引数文字列をトークン列に分割
pub fn split_revive_args(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

impl NodeConfig {
    /// 新しいノード設定を作成
    pub fn new(
        address: impl Into<String>,
        project: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            project: project.into(),
            environment: environment.into(),
            revive_cmd: None,
            revive_args: None,
        }
    }

    /// 再起動コマンドを設定
    pub fn with_revive(mut self, cmd: impl Into<String>, args: Vec<String>) -> Self {
        self.revive_cmd = Some(cmd.into());
        self.revive_args = if args.is_empty() { None } else { Some(args) };
        self
    }

    /// 設定の整合性を検証
    pub fn validate(&self) -> MonitorResult<()> {
        if self.address.trim().is_empty() {
            return Err(MonitorError::Validation("address is empty".to_string()));
        }

        if let Some(cmd) = &self.revive_cmd {
            if cmd.trim().is_empty() {
                return Err(MonitorError::Validation("reviveCmd is empty".to_string()));
            }
        }

        if self.revive_args.is_some() && self.revive_cmd.is_none() {
            return Err(MonitorError::Validation(
                "reviveArgs requires reviveCmd".to_string(),
            ));
        }

        Ok(())
    }

    /// JSON値からノード設定を解析し検証する
    pub fn from_value(value: serde_json::Value) -> MonitorResult<Self> {
        let config: NodeConfig = serde_json::from_value(value)
            .map_err(|e| MonitorError::Validation(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// ノードの稼働状態
///
/// レジストリが排他的に所有し、プローバーのみが更新する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    /// 登録設定
    #[serde(flatten)]
    pub config: NodeConfig,
    /// 直近のチェックで応答があったか
    pub alive: bool,
    /// 最後に受理した応答の時刻
    pub last_update: DateTime<Utc>,
    /// 最後に受理した応答のリクエストID
    pub last_response_id: u64,
    /// 連続失敗回数
    pub failure_count: u32,
    /// 最後に観測したネットワークID（`net_version`の結果）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    /// 最後に起動した復旧プロセスのPID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_process_id: Option<u32>,
}

impl NodeStatus {
    /// 登録直後の初期状態を作成
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            alive: false,
            last_update: Utc::now(),
            last_response_id: 0,
            failure_count: 0,
            network_id: None,
            last_process_id: None,
        }
    }

    /// ノードのアドレス
    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// プロジェクト／環境フィルタに一致するか
    pub fn matches(&self, project: Option<&str>, environment: Option<&str>) -> bool {
        let Some(project) = project else {
            return true;
        };
        if self.config.project != project {
            return false;
        }
        environment.map_or(true, |env| self.config.environment == env)
    }
}

/// `POST /add` のリクエストボディ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNodesRequest {
    /// 追加するノード設定
    pub nodes: Vec<NodeConfig>,
}
