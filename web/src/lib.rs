//! HTTP read API over the order cache.
//!
//! The web task only reads: it shares the [`OrderCache`] with the ingestor and
//! watches the ingestor's lifecycle state for readiness.
//!
//! # Routes
//!
//! ```text
//! GET /                         search form
//! GET /search?order_uid=...     pretty JSON, or a plain "not found" line
//! GET /api/orders/{order_uid}   JSON, 404 when absent
//! GET /health                   liveness
//! GET /ready                    200 while ingesting, 503 otherwise
//! GET /metrics                  Prometheus text format
//! ```
//!
//! # Example
//!
//! ```ignore
//! use order_mirror_web::{router, AppState};
//!
//! let state = AppState::new(cache, ingestor.state()).with_metrics(handle);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, router(state)).await?;
//! ```
//!
//! [`OrderCache`]: order_mirror_core::cache::OrderCache

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home::index))
        .route("/search", get(handlers::orders::search))
        .route("/api/orders/:order_uid", get(handlers::orders::get_order))
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness))
        .route("/metrics", get(handlers::health::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
