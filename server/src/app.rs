//! Service wiring.

use crate::config::Config;
use crate::shutdown::wait_for_signal;
use anyhow::Context;
use order_mirror_core::cache::OrderCache;
use order_mirror_core::lifecycle::IngestState;
use order_mirror_ingest::{FileCheckpointStore, Ingestor};
use order_mirror_postgres::PostgresOrderStore;
use order_mirror_redpanda::RedpandaMessageSource;
use order_mirror_web::{AppState, metrics::install_recorder, router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Run the service until a shutdown signal arrives or the order stream ends.
///
/// The HTTP server only starts accepting requests once the cache is
/// recovered and the ingestor is running, and stops after the ingestor has
/// drained.
///
/// # Errors
///
/// Returns an error if a dependency is unreachable at startup or the HTTP
/// listener cannot be bound.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let metrics = install_recorder().context("Failed to install metrics recorder")?;

    let store = PostgresOrderStore::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;
    store.migrate().await.context("Failed to run migrations")?;
    let store = Arc::new(store);

    let source = RedpandaMessageSource::builder()
        .brokers(&config.stream.brokers)
        .topic(&config.stream.topic)
        .partition(config.stream.partition)
        .consumer_group(&config.stream.consumer_group)
        .build()
        .context("Failed to configure order stream")?;

    let cache = Arc::new(OrderCache::new());
    let checkpoint = Arc::new(FileCheckpointStore::new(config.checkpoint_path.clone()));
    let ingestor = Ingestor::new(store, Arc::clone(&cache), checkpoint, Arc::new(source))
        .with_retry_policy(config.retry.policy());

    let listener = TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr))?;
    tracing::info!(addr = %config.http_addr, "HTTP listener bound");

    let state = AppState::new(cache, ingestor.state()).with_metrics(metrics);
    let http = tokio::spawn(serve(listener, state, ingestor.state()));

    let result = ingestor.run(wait_for_signal()).await;

    match result {
        Ok(summary) => {
            tracing::info!(
                committed = summary.committed,
                discarded = summary.discarded,
                deferred = summary.deferred,
                last_committed = ?summary.last_committed.map(|p| p.get()),
                "Ingestor stopped"
            );
            http.await.context("HTTP server task failed")??;
            Ok(())
        }
        Err(e) => {
            http.abort();
            Err(e).context("Ingestor failed to start")
        }
    }
}

/// Serve HTTP while the ingestor is running.
async fn serve(
    listener: TcpListener,
    state: AppState,
    mut ingest_state: watch::Receiver<IngestState>,
) -> anyhow::Result<()> {
    if ingest_state.wait_for(|s| s.is_running()).await.is_err() {
        return Ok(());
    }
    tracing::info!("HTTP server accepting requests");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = ingest_state.wait_for(|s| *s == IngestState::Stopped).await;
        })
        .await
        .context("HTTP server error")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
