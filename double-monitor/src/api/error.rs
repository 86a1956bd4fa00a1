//! APIエラーレスポンス型
//!
//! axum用の共通エラーハンドリング

use crate::common::error::MonitorError;
use axum::{http::StatusCode, response::IntoResponse};

/// Axum用のエラーレスポンス型
///
/// 本文はプレーンテキストのエラーメッセージ。
#[derive(Debug)]
pub struct AppError(pub MonitorError);

impl From<MonitorError> for AppError {
    fn from(err: MonitorError) -> Self {
        AppError(err)
    }
}

impl AppError {
    /// 400 Bad Request として返すエラーを作成
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError(MonitorError::Validation(message.into()))
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match &self.0 {
            // 検証エラーは呼び出し側へそのまま返す
            MonitorError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            MonitorError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to persist nodes".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }
        (status, message).into_response()
    }
}
