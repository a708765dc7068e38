//! Relational store contracts.
//!
//! [`EntityStore`] exposes one idempotent statement per persisted entity;
//! [`crate::writer::EntityWriter`] owns the order in which they run.
//! [`SnapshotSource`] enumerates stored snapshots for recovery.
//!
//! Implementations:
//! - `PostgresOrderStore` in `order-mirror-postgres` (production)
//! - `InMemoryOrderStore` in `order-mirror-testing` (tests)

use crate::model::{Delivery, Item, Order, Payment};
use std::future::Future;
use thiserror::Error;

/// Errors raised by a store backend.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A statement failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A document could not be encoded for storage.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The store refused the values themselves (bad data, violated
    /// constraint). Repeating the statement fails the same way.
    #[error("Rejected by store: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Whether repeating the call can never succeed.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::Serialization(_))
    }
}

/// A stored full-document snapshot, not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Order identifier (primary key).
    pub order_uid: String,
    /// The serialized order as stored.
    pub document: String,
}

/// Idempotent writes for the entities derived from one order.
///
/// Every method must be safe to repeat: repeating a call leaves the same rows
/// behind, except [`EntityStore::upsert_order_line`], which counts deliveries.
pub trait EntityStore: Send + Sync {
    /// Insert the customer unless one with the same name exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails.
    fn insert_customer(&self, customer: &Delivery) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert the payment unless its transaction id exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails.
    fn insert_payment(&self, payment: &Payment) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert the item unless its chrt id exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails.
    fn insert_item(&self, item: &Item) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Record the (order, item) line, incrementing its counter if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails.
    fn upsert_order_line(&self, order: &Order, item: &Item) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Store the full document unless a snapshot for the order exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the statement fails or the order cannot be
    /// serialized.
    fn insert_snapshot(&self, order: &Order) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Read access to every stored snapshot.
pub trait SnapshotSource: Send + Sync {
    /// Fetch all snapshot rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the scan fails.
    fn snapshots(&self) -> impl Future<Output = Result<Vec<Snapshot>, StoreError>> + Send;
}
