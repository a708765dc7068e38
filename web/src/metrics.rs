//! Prometheus recorder setup.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the global Prometheus recorder and describe the pipeline metrics.
///
/// The returned handle renders the text exposition served at `/metrics`.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    register_metrics();
    Ok(handle)
}

fn register_metrics() {
    describe_counter!(
        "order_mirror.messages.committed",
        "Messages persisted, cached and checkpointed"
    );
    describe_counter!(
        "order_mirror.messages.discarded",
        "Unprocessable messages dropped, by reason"
    );
    describe_counter!(
        "order_mirror.messages.deferred",
        "Failed attempts to persist a message"
    );
    describe_counter!(
        "order_mirror.recovery.skipped",
        "Snapshots skipped during recovery because they could not be decoded"
    );
    describe_gauge!("order_mirror.cache.orders", "Orders held in the cache");
}
