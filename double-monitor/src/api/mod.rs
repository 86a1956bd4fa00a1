//! Status & Control API
//!
//! ノード状態の参照と実行時のノード登録を提供する。
//! 全てのレスポンスに `Server: double-monitor` ヘッダーを付与し、
//! ディスカバリーはこのヘッダーでモニターを識別する。

pub mod error;
pub mod nodes;
pub mod status;

use crate::AppState;
use axum::{
    http::{header, HeaderValue, StatusCode},
    routing::{get, post},
    Router,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

/// モニターを識別する `Server` ヘッダーの値
pub const MONITOR_SERVER_HEADER: &str = "double-monitor";

/// APIルーターを作成
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status::list_all))
        .route("/status/{project}", get(status::list_by_project))
        .route(
            "/status/{project}/{environment}",
            get(status::list_by_environment),
        )
        .route("/add", post(nodes::add_nodes))
        .fallback(not_found)
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static(MONITOR_SERVER_HEADER),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
