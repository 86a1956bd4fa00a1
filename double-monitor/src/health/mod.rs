//! ヘルスチェックモニター
//!
//! 定期的にノードの稼働状況を監視し、閾値を超えて失敗したノードの復旧を試みる。

pub mod prober;
pub mod revive;

pub use prober::{LivenessProber, PingOutcome};
pub use revive::RevivalController;
