//! Shutdown signal handling.

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be registered the error is logged and the remaining
/// signal is still awaited.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            () = ctrl_c() => {}
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to wait for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
