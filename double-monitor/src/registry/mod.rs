//! ノード登録管理
//!
//! 監視対象ノードの状態をメモリ内で管理し、登録をSQLiteへ追記する。
//! プローバーとHTTP APIの双方がこのレジストリ経由で状態を読み書きする。

use crate::common::error::MonitorResult;
use crate::db::NodeStore;
use crate::types::node::{NodeConfig, NodeStatus};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

/// ノードレジストリ
///
/// テーブル全体を1つの `RwLock` で保護する。各更新は書き込みロック内で
/// 完結するため、読み取り側が更新途中の状態を観測することはない。
/// エントリは削除されないので、インデックスはプロセス存続中は安定している。
#[derive(Clone)]
pub struct NodeRegistry {
    nodes: Arc<RwLock<Vec<NodeStatus>>>,
    store: Option<NodeStore>,
    /// 永続化とメモリ追加の順序を揃えるための登録ロック
    registration: Arc<Mutex<()>>,
}

impl NodeRegistry {
    /// 永続化ストア付きのレジストリを作成し、記録済みノードを復元する
    pub async fn load(store: NodeStore) -> MonitorResult<Self> {
        let configs = store.load_all().await?;
        let restored = configs.len();
        let nodes = configs.into_iter().map(NodeStatus::new).collect();

        info!(count = restored, "Restored monitored nodes from storage");

        Ok(Self {
            nodes: Arc::new(RwLock::new(nodes)),
            store: Some(store),
            registration: Arc::new(Mutex::new(())),
        })
    }

    /// 永続化なしのレジストリを作成（テスト用）
    pub fn in_memory() -> Self {
        Self {
            nodes: Arc::new(RwLock::new(Vec::new())),
            store: None,
            registration: Arc::new(Mutex::new(())),
        }
    }

    /// ノードを1件登録し、そのインデックスを返す
    pub async fn register(&self, config: NodeConfig) -> MonitorResult<usize> {
        let first = self.register_all(vec![config]).await?;
        Ok(first)
    }

    /// 複数ノードをまとめて登録する
    ///
    /// 1件でも検証に失敗した場合は何も登録しない。永続化に成功した後で
    /// メモリ上のテーブルへ追加する。同じアドレスの既存エントリがあっても
    /// 上書きせず、別エントリとして追加する。
    ///
    /// 戻り値は最初に追加されたエントリのインデックス。
    pub async fn register_all(&self, configs: Vec<NodeConfig>) -> MonitorResult<usize> {
        for config in &configs {
            config.validate()?;
        }

        let _guard = self.registration.lock().await;

        if let Some(store) = &self.store {
            store.append(&configs).await?;
        }

        let mut nodes = self.nodes.write().await;
        let first = nodes.len();
        for config in configs {
            info!(
                address = %config.address,
                project = %config.project,
                environment = %config.environment,
                "Registered monitored node"
            );
            nodes.push(NodeStatus::new(config));
        }

        Ok(first)
    }

    /// 登録順のノード状態一覧を取得
    ///
    /// `project` 指定時はプロジェクトで絞り込み、さらに `environment` も
    /// 指定されていれば環境で絞り込む。
    pub async fn list(&self, project: Option<&str>, environment: Option<&str>) -> Vec<NodeStatus> {
        let nodes = self.nodes.read().await;
        nodes
            .iter()
            .filter(|node| node.matches(project, environment))
            .cloned()
            .collect()
    }

    /// 全ノードのスナップショットを取得
    pub async fn snapshot(&self) -> Vec<NodeStatus> {
        self.nodes.read().await.clone()
    }

    /// 指定インデックスのノード状態を取得
    pub async fn get(&self, index: usize) -> Option<NodeStatus> {
        self.nodes.read().await.get(index).cloned()
    }

    /// 登録ノード数
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    /// ノードが1件も登録されていないか
    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    /// 指定ノードの状態を書き込みロック内で更新する
    ///
    /// プローバー専用の更新口。インデックスが存在しなければ `None`。
    pub(crate) async fn apply<R>(
        &self,
        index: usize,
        mutation: impl FnOnce(&mut NodeStatus) -> R,
    ) -> Option<R> {
        let mut nodes = self.nodes.write().await;
        nodes.get_mut(index).map(mutation)
    }
}
