//! Order lookups against the cache.
//!
//! A missing order is not an error: the ingestor may never have seen it, may
//! still be retrying it, or may have discarded it, and callers cannot tell
//! these apart. Only a cached entry that cannot be rendered is a 500.

use crate::{AppError, AppState, WebResult};
use axum::Json;
use axum::extract::{Path, Query, State};
use order_mirror_core::model::Order;
use serde::Deserialize;

/// Text returned by `/search` when the order is not cached.
pub const NOT_FOUND_MESSAGE: &str = "Not found order with entered order_uid";

/// Query string of `/search`.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Order to look up; missing means empty.
    #[serde(default)]
    pub order_uid: String,
}

/// `GET /search?order_uid=...`
///
/// Returns the cached order as indented JSON, or [`NOT_FOUND_MESSAGE`].
///
/// # Errors
///
/// Returns a 500 [`AppError`] if the cached entry cannot be rendered.
#[allow(clippy::unused_async)]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> WebResult<String> {
    let order_uid = query.order_uid.as_str();

    match state.cache.lookup(order_uid)? {
        Some(document) => Ok(document),
        None => {
            tracing::debug!(order_uid, "Order not in cache");
            Ok(NOT_FOUND_MESSAGE.to_string())
        }
    }
}

/// `GET /api/orders/{order_uid}`
///
/// # Errors
///
/// Returns a 404 [`AppError`] if the order is not cached.
#[allow(clippy::unused_async)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> WebResult<Json<Order>> {
    state
        .cache
        .get(&order_uid)
        .map(|order| Json(Order::clone(&order)))
        .ok_or_else(|| AppError::not_found("Order", &order_uid))
}
