//! double-monitor
//!
//! ブロックチェーンノードの死活監視・自動復旧・ディスカバリーを行うデーモン

#![warn(missing_docs)]

/// 共通型定義（エラー型）
pub mod common;

/// REST APIハンドラー
pub mod api;

/// 稼働中モニターへのHTTPクライアント
pub mod client;

/// CLIインターフェース
pub mod cli;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// データベースアクセス
pub mod db;

/// モニターのディスカバリー（ポート走査・起動）
pub mod discovery;

/// ヘルスチェック監視と自動復旧
pub mod health;

/// デーモンの排他制御（シングル実行制約）
pub mod lock;

/// ロギング初期化ユーティリティ
pub mod logging;

/// モニターインスタンスのライフサイクル
pub mod monitor;

/// ノード登録管理
pub mod registry;

/// axumサーバー起動・シャットダウン
pub mod server;

/// Cooperative shutdown signal
pub mod shutdown;

/// 型定義
pub mod types;

pub use monitor::Monitor;

use registry::NodeRegistry;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// ノードレジストリ
    pub registry: NodeRegistry,
}

impl AppState {
    /// 新しいアプリケーション状態を作成
    pub fn new(registry: NodeRegistry) -> Self {
        Self { registry }
    }
}
