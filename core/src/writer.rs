//! Mapping a validated order onto idempotent entity writes.
//!
//! The steps run in a fixed order and stop at the first failure. Completed
//! steps are not rolled back: each one is idempotent, so a redelivery of the
//! same message finishes the job.
//!
//! ```text
//! customer ─► payment ─► for each item { item ─► order line } ─► snapshot
//! ```

use crate::model::Order;
use crate::store::{EntityStore, StoreError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One of the writes performed for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    /// Customer insert.
    Customer,
    /// Payment insert.
    Payment,
    /// Item insert for the item at this index.
    Item(usize),
    /// Order-line upsert for the item at this index.
    OrderLine(usize),
    /// Snapshot insert.
    Snapshot,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Payment => write!(f, "payment"),
            Self::Item(index) => write!(f, "item[{index}]"),
            Self::OrderLine(index) => write!(f, "order_line[{index}]"),
            Self::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Persisting an order stopped at `step`.
#[derive(Error, Debug, Clone)]
#[error("Failed to persist order '{order_uid}' at step {step}: {source}")]
pub struct WriteError {
    /// The order being persisted.
    pub order_uid: String,
    /// The step that failed; all earlier steps completed.
    pub step: WriteStep,
    /// Backend error.
    #[source]
    pub source: StoreError,
}

impl WriteError {
    /// Whether the order can never be persisted as it is.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        self.source.is_permanent()
    }
}

/// Performs the per-order write sequence against an [`EntityStore`].
pub struct EntityWriter<S> {
    store: Arc<S>,
}

impl<S> Clone for EntityWriter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: EntityStore> EntityWriter<S> {
    /// Create a writer over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Persist every entity of `order`.
    ///
    /// Does not touch the cache; the caller decides what happens next.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] naming the first step that failed.
    pub async fn persist(&self, order: &Order) -> Result<(), WriteError> {
        let fail = |step: WriteStep| {
            move |source: StoreError| WriteError {
                order_uid: order.order_uid.clone(),
                step,
                source,
            }
        };

        self.store
            .insert_customer(&order.delivery)
            .await
            .map_err(fail(WriteStep::Customer))?;

        self.store
            .insert_payment(&order.payment)
            .await
            .map_err(fail(WriteStep::Payment))?;

        for (index, item) in order.items.iter().enumerate() {
            self.store
                .insert_item(item)
                .await
                .map_err(fail(WriteStep::Item(index)))?;

            self.store
                .upsert_order_line(order, item)
                .await
                .map_err(fail(WriteStep::OrderLine(index)))?;
        }

        self.store
            .insert_snapshot(order)
            .await
            .map_err(fail(WriteStep::Snapshot))?;

        tracing::debug!(
            order_uid = %order.order_uid,
            items = order.items.len(),
            "Order persisted"
        );

        Ok(())
    }
}
