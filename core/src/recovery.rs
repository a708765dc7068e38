//! Rebuilding the order cache from stored snapshots.

use crate::model::Order;
use crate::store::{SnapshotSource, StoreError};
use std::sync::Arc;

/// Reads every snapshot and decodes it into an [`Order`].
///
/// A snapshot that fails to decode is logged and skipped; it does not abort
/// the rest of the scan.
pub struct RecoveryLoader<S> {
    source: Arc<S>,
}

impl<S: SnapshotSource> RecoveryLoader<S> {
    /// Create a loader over `source`.
    #[must_use]
    pub const fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Scan all snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the scan itself fails. Individual undecodable
    /// rows are not errors.
    pub async fn run(&self) -> Result<Vec<Order>, StoreError> {
        tracing::info!("Loading order snapshots");

        let rows = self.source.snapshots().await?;
        let total = rows.len();

        let orders: Vec<Order> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_str::<Order>(&row.document) {
                Ok(order) => Some(order),
                Err(e) => {
                    tracing::warn!(
                        order_uid = %row.order_uid,
                        error = %e,
                        "Skipping undecodable snapshot"
                    );
                    metrics::counter!("order_mirror.recovery.skipped").increment(1);
                    None
                }
            })
            .collect();

        tracing::info!(
            loaded = orders.len(),
            skipped = total - orders.len(),
            "Order snapshots loaded"
        );

        Ok(orders)
    }
}
