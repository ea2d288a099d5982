//! OS signal handling.

/// Resolves on the first interrupt. A failure to install the handler is
/// logged and the future never resolves.
pub async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for interrupt");
        std::future::pending::<()>().await;
    }
    tracing::info!("Interrupt received, shutting down");
}
