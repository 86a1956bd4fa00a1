//! ノード登録履歴のストレージ層
//!
//! 登録されたノード設定を追記のみで記録する。既存行の更新・削除は行わない。

use crate::common::error::{MonitorError, MonitorResult};
use crate::types::node::NodeConfig;
use chrono::Utc;
use sqlx::SqlitePool;
use std::path::Path;

/// ノード登録ストレージ
#[derive(Clone)]
pub struct NodeStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct NodeRow {
    address: String,
    project: String,
    environment: String,
    revive_cmd: Option<String>,
    revive_args: Option<String>,
}

impl TryFrom<NodeRow> for NodeConfig {
    type Error = MonitorError;

    fn try_from(row: NodeRow) -> Result<Self, Self::Error> {
        let revive_args = row
            .revive_args
            .map(|raw| serde_json::from_str::<Vec<String>>(&raw))
            .transpose()
            .map_err(|e| MonitorError::Database(format!("Corrupted revive_args column: {}", e)))?;

        Ok(NodeConfig {
            address: row.address,
            project: row.project,
            environment: row.environment,
            revive_cmd: row.revive_cmd,
            revive_args,
        })
    }
}

impl NodeStore {
    /// 新しいストレージインスタンスを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// ノード設定をまとめて追記する
    ///
    /// 1トランザクションで書き込むため、途中で失敗した場合は
    /// このバッチの行は一切残らない（過去のバッチには影響しない）。
    pub async fn append(&self, configs: &[NodeConfig]) -> MonitorResult<()> {
        if configs.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to begin transaction: {}", e)))?;

        let registered_at = Utc::now().to_rfc3339();
        for config in configs {
            let revive_args = config
                .revive_args
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| MonitorError::Internal(e.to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO monitored_nodes
                    (address, project, environment, revive_cmd, revive_args, registered_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&config.address)
            .bind(&config.project)
            .bind(&config.environment)
            .bind(&config.revive_cmd)
            .bind(&revive_args)
            .bind(&registered_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to append node: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to commit nodes: {}", e)))?;

        Ok(())
    }

    /// 記録済みの全ノード設定を登録順に取得
    pub async fn load_all(&self) -> MonitorResult<Vec<NodeConfig>> {
        let rows = sqlx::query_as::<_, NodeRow>(
            r#"
            SELECT address, project, environment, revive_cmd, revive_args
            FROM monitored_nodes
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MonitorError::Database(format!("Failed to load nodes: {}", e)))?;

        rows.into_iter().map(NodeConfig::try_from).collect()
    }

    /// 記録済みのノード数
    pub async fn count(&self) -> MonitorResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM monitored_nodes")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to count nodes: {}", e)))
    }
}

/// JSON Lines形式のノード設定ファイルを読み込む
///
/// 1行に1つの `NodeConfig` オブジェクト。空行は無視する。
/// 不正な行があった場合は行番号付きのエラーを返す。
pub async fn import_jsonl(path: &Path) -> MonitorResult<Vec<NodeConfig>> {
    let content = tokio::fs::read_to_string(path).await?;

    let mut configs = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
            MonitorError::Validation(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;
        let config = NodeConfig::from_value(value).map_err(|e| {
            MonitorError::Validation(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;
        configs.push(config);
    }

    Ok(configs)
}
