//! axumサーバー起動・シャットダウンハンドリング

use crate::common::error::{MonitorError, MonitorResult};
use crate::shutdown::ShutdownController;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// バインド済みのリスナーでaxumサーバーを起動し、シャットダウン要求まで処理する
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: ShutdownController,
) -> MonitorResult<()> {
    let local_addr = listener.local_addr()?;
    info!("Monitor listening on {}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
        .map_err(|e| MonitorError::Internal(format!("Server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}

/// Ctrl+C または SIGTERM を待機
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
