//! In-memory relational store.

use order_mirror_core::model::{Delivery, Item, Order, Payment};
use order_mirror_core::store::{EntityStore, Snapshot, SnapshotSource, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Tables {
    customers: BTreeMap<String, Delivery>,
    payments: BTreeMap<String, Payment>,
    items: BTreeMap<i64, Item>,
    order_lines: BTreeMap<(String, i64), i32>,
    snapshots: BTreeMap<String, String>,
}

/// [`EntityStore`] and [`SnapshotSource`] over in-memory tables, with the
/// same conflict rules as the Postgres schema.
///
/// Outages can be injected with [`InMemoryOrderStore::set_unavailable`]
/// (every call fails until cleared), [`InMemoryOrderStore::set_writes_failing`]
/// (writes fail, snapshot reads still work) or
/// [`InMemoryOrderStore::fail_next`] (the next `n` writes fail).
/// [`InMemoryOrderStore::reject_item`] makes the store refuse one item's
/// values for good, like a violated constraint.
///
/// # Example
///
/// ```
/// use order_mirror_core::store::EntityStore;
/// use order_mirror_testing::{fixtures, InMemoryOrderStore};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryOrderStore::new();
/// let order = fixtures::sample_order("ord-1", 42);
///
/// store.upsert_order_line(&order, &order.items[0]).await.unwrap();
/// store.upsert_order_line(&order, &order.items[0]).await.unwrap();
///
/// assert_eq!(store.delivery_count("ord-1", 42), Some(2));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
    writes_failing: AtomicBool,
    failures: AtomicUsize,
    calls: AtomicUsize,
    rejected_items: Mutex<BTreeSet<i64>>,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`StoreError::ConnectionFailed`] until
    /// cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every write fail until cleared.
    pub fn set_writes_failing(&self, failing: bool) {
        self.writes_failing.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `n` writes.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Refuse every insert of the item `chrt_id` with
    /// [`StoreError::Rejected`].
    pub fn reject_item(&self, chrt_id: i64) {
        self.rejected_items.lock().unwrap().insert(chrt_id);
    }

    /// Number of calls made so far, failed ones included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Store a raw snapshot document, bypassing serialization.
    pub fn insert_raw_snapshot(&self, order_uid: &str, document: &str) {
        self.tables
            .lock()
            .unwrap()
            .snapshots
            .insert(order_uid.to_string(), document.to_string());
    }

    /// Number of customer rows.
    #[must_use]
    pub fn customer_count(&self) -> usize {
        self.tables.lock().unwrap().customers.len()
    }

    /// Number of payment rows.
    #[must_use]
    pub fn payment_count(&self) -> usize {
        self.tables.lock().unwrap().payments.len()
    }

    /// Number of item rows.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.tables.lock().unwrap().items.len()
    }

    /// Number of order-line rows.
    #[must_use]
    pub fn order_line_count(&self) -> usize {
        self.tables.lock().unwrap().order_lines.len()
    }

    /// Number of snapshot rows.
    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.tables.lock().unwrap().snapshots.len()
    }

    /// Delivery counter of the (order, item) line.
    #[must_use]
    pub fn delivery_count(&self, order_uid: &str, chrt_id: i64) -> Option<i32> {
        self.tables
            .lock()
            .unwrap()
            .order_lines
            .get(&(order_uid.to_string(), chrt_id))
            .copied()
    }

    /// Stored snapshot document for `order_uid`.
    #[must_use]
    pub fn snapshot(&self, order_uid: &str) -> Option<String> {
        self.tables.lock().unwrap().snapshots.get(order_uid).cloned()
    }

    fn check(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionFailed("store unavailable".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        self.check()?;

        if self.writes_failing.load(Ordering::SeqCst) {
            return Err(StoreError::QueryFailed("write rejected".to_string()));
        }

        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::QueryFailed("injected failure".to_string()));
        }

        Ok(())
    }
}

impl EntityStore for InMemoryOrderStore {
    async fn insert_customer(&self, customer: &Delivery) -> Result<(), StoreError> {
        self.check_write()?;
        self.tables
            .lock()
            .unwrap()
            .customers
            .entry(customer.name.clone())
            .or_insert_with(|| customer.clone());
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        self.check_write()?;
        self.tables
            .lock()
            .unwrap()
            .payments
            .entry(payment.transaction.clone())
            .or_insert_with(|| payment.clone());
        Ok(())
    }

    async fn insert_item(&self, item: &Item) -> Result<(), StoreError> {
        self.check_write()?;
        if self.rejected_items.lock().unwrap().contains(&item.chrt_id) {
            return Err(StoreError::Rejected(format!(
                "item {} violates a constraint",
                item.chrt_id
            )));
        }
        self.tables
            .lock()
            .unwrap()
            .items
            .entry(item.chrt_id)
            .or_insert_with(|| item.clone());
        Ok(())
    }

    async fn upsert_order_line(&self, order: &Order, item: &Item) -> Result<(), StoreError> {
        self.check_write()?;
        *self
            .tables
            .lock()
            .unwrap()
            .order_lines
            .entry((order.order_uid.clone(), item.chrt_id))
            .or_insert(0) += 1;
        Ok(())
    }

    async fn insert_snapshot(&self, order: &Order) -> Result<(), StoreError> {
        self.check_write()?;
        let document =
            serde_json::to_string(order).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.tables
            .lock()
            .unwrap()
            .snapshots
            .entry(order.order_uid.clone())
            .or_insert(document);
        Ok(())
    }
}

impl SnapshotSource for InMemoryOrderStore {
    async fn snapshots(&self) -> Result<Vec<Snapshot>, StoreError> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .snapshots
            .iter()
            .map(|(order_uid, document)| Snapshot {
                order_uid: order_uid.clone(),
                document: document.clone(),
            })
            .collect())
    }
}
