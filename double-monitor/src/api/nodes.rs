//! ノード登録API

use crate::api::error::AppError;
use crate::common::error::MonitorError;
use crate::types::node::NodeConfig;
use crate::AppState;
use axum::{body::Bytes, extract::State, Json};
use serde_json::Value;

/// `nodes` が配列でない場合のエラーメッセージ
pub const NODES_NOT_ARRAY: &str = "The field nodes is not an array.";

/// POST /add - ノードの一括登録
///
/// Content-Typeに関わらず本文をJSONとして解析する。
/// 1件でも不正なエントリがあれば何も登録しない。
pub async fn add_nodes(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<&'static str>, AppError> {
    let configs = parse_add_request(&body)?;
    let count = configs.len();

    state.registry.register_all(configs).await?;

    tracing::info!(count, "Added nodes via API");
    Ok(Json("Ok"))
}

/// `{"nodes": [...]}` 形式の本文を検証済みのノード設定列に変換
pub fn parse_add_request(body: &[u8]) -> Result<Vec<NodeConfig>, AppError> {
    let value: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(body)
            .map_err(|e| AppError::bad_request(format!("Request body is not valid JSON: {}", e)))?
    };

    let Some(Value::Array(entries)) = value.get("nodes") else {
        return Err(AppError::bad_request(NODES_NOT_ARRAY));
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            NodeConfig::from_value(entry.clone()).map_err(|e| {
                let reason = match e {
                    MonitorError::Validation(reason) => reason,
                    other => other.to_string(),
                };
                AppError::bad_request(format!("nodes[{}]: {}", index, reason))
            })
        })
        .collect()
}
