//! In-memory mirror of every persisted order.
//!
//! [`OrderCache`] is the only state shared between the ingestion task and the
//! lookup server. All operations take the same mutex, and entries are whole
//! `Arc<Order>` values replaced by assignment, so a reader observes either the
//! previous or the new order, never a partially written one.
//!
//! # Example
//!
//! ```
//! use order_mirror_core::cache::OrderCache;
//! use order_mirror_core::model::Order;
//!
//! let cache = OrderCache::new();
//! cache.put(Order { order_uid: "ord-1".to_string(), ..Order::default() });
//!
//! assert!(cache.get("ord-1").is_some());
//! assert!(cache.get("ord-2").is_none());
//! ```

use crate::model::Order;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// A cached order exists but could not be rendered.
#[derive(Error, Debug)]
#[error("Failed to render cached order '{order_uid}': {source}")]
pub struct CacheError {
    /// The order that failed to render.
    pub order_uid: String,
    /// Underlying serialization error.
    #[source]
    pub source: serde_json::Error,
}

/// Concurrency-safe mapping from `order_uid` to [`Order`].
#[derive(Debug, Default)]
pub struct OrderCache {
    orders: Mutex<HashMap<String, Arc<Order>>>,
}

impl OrderCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section assigns whole values, so a guard recovered from
    // a poisoned lock still holds a consistent map.
    fn orders(&self) -> MutexGuard<'_, HashMap<String, Arc<Order>>> {
        self.orders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole content with `orders`.
    ///
    /// Used once at startup with the recovered snapshots. A later order with
    /// the same `order_uid` wins.
    pub fn load(&self, orders: impl IntoIterator<Item = Order>) {
        let seeded: HashMap<String, Arc<Order>> = orders
            .into_iter()
            .map(|order| (order.order_uid.clone(), Arc::new(order)))
            .collect();
        let count = seeded.len();

        *self.orders() = seeded;

        record_size(count);
        tracing::info!(orders = count, "Order cache seeded");
    }

    /// Insert or overwrite the entry for `order.order_uid`.
    pub fn put(&self, order: Order) {
        let count = {
            let mut orders = self.orders();
            orders.insert(order.order_uid.clone(), Arc::new(order));
            orders.len()
        };
        record_size(count);
    }

    /// Insert `order` unless an entry for its `order_uid` exists.
    ///
    /// Returns `false` and keeps the cached order otherwise. Stored snapshots
    /// are write-once, so this keeps the cache equal to what recovery would
    /// load after a restart.
    pub fn insert_new(&self, order: Order) -> bool {
        let (inserted, count) = {
            let mut orders = self.orders();
            let inserted = match orders.entry(order.order_uid.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(order));
                    true
                }
            };
            (inserted, orders.len())
        };
        record_size(count);
        inserted
    }

    /// Look up an order by identifier.
    #[must_use]
    pub fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        self.orders().get(order_uid).cloned()
    }

    /// Render an order as indented JSON for presentation.
    ///
    /// `Ok(None)` means the order is not cached.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the cached order cannot be serialized.
    pub fn lookup(&self, order_uid: &str) -> Result<Option<String>, CacheError> {
        let Some(order) = self.get(order_uid) else {
            return Ok(None);
        };

        order
            .to_pretty_json()
            .map(Some)
            .map_err(|source| CacheError {
                order_uid: order_uid.to_string(),
                source,
            })
    }

    /// Number of cached orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders().len()
    }

    /// Whether the cache holds no orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders().is_empty()
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_size(count: usize) {
    metrics::gauge!("order_mirror.cache.orders").set(count as f64);
}
