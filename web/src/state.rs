//! Application state for Axum handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use order_mirror_core::cache::OrderCache;
use order_mirror_core::lifecycle::IngestState;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared state handed to every handler.
///
/// Cheap to clone: every field is a handle.
#[derive(Clone)]
pub struct AppState {
    /// Orders mirrored by the ingestor.
    pub cache: Arc<OrderCache>,
    /// Ingestor lifecycle.
    pub ingest_state: watch::Receiver<IngestState>,
    /// Prometheus renderer, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create state over `cache`, tracking `ingest_state`.
    #[must_use]
    pub const fn new(cache: Arc<OrderCache>, ingest_state: watch::Receiver<IngestState>) -> Self {
        Self {
            cache,
            ingest_state,
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Axum requires Clone state
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
