//! 型定義モジュール
//!
//! ドメインエンティティの型定義を提供

/// 監視対象ノード関連の型定義
pub mod node;

pub use node::{AddNodesRequest, NodeConfig, NodeStatus};
