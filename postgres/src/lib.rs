//! `PostgreSQL` order store for order-mirror.
//!
//! Implements [`EntityStore`] and [`SnapshotSource`] over five tables:
//!
//! ```text
//! customer        name PK            insert, ignore on conflict
//! payment         transaction PK     insert, ignore on conflict
//! item            chrt_id PK         insert, ignore on conflict
//! order_line      (order_uid, chrt_id) PK, delivery_count += 1 on conflict
//! order_snapshot  order_uid PK       JSONB document, write-once
//! ```
//!
//! Statements run directly on the pool, one per call; no connection is held
//! between calls.
//!
//! # Example
//!
//! ```ignore
//! use order_mirror_postgres::PostgresOrderStore;
//!
//! let store = PostgresOrderStore::connect("postgres://localhost/orders", 5).await?;
//! store.migrate().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use order_mirror_core::model::{Delivery, Item, Order, Payment};
use order_mirror_core::store::{EntityStore, Snapshot, SnapshotSource, StoreError};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// PostgreSQL-backed order store.
#[derive(Clone, Debug)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Connect a new pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionFailed`] if the database is unreachable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::ConnectionFailed(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Use an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QueryFailed`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Whether `sqlstate` belongs to class 22 (data exception) or 23 (integrity
/// constraint violation); both fail again for the same values.
fn is_data_error(sqlstate: &str) -> bool {
    sqlstate.starts_with("22") || sqlstate.starts_with("23")
}

/// Classify a sqlx error; transport-level failures are connection errors,
/// values the database refuses are rejections.
fn store_error(context: &str, error: &sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::ConnectionFailed(format!("{context}: {error}")),
        sqlx::Error::Database(db) if db.code().is_some_and(|code| is_data_error(&code)) => {
            StoreError::Rejected(format!("{context}: {error}"))
        }
        sqlx::Error::Encode(_) => StoreError::Rejected(format!("{context}: {error}")),
        _ => StoreError::QueryFailed(format!("{context}: {error}")),
    }
}

impl EntityStore for PostgresOrderStore {
    async fn insert_customer(&self, customer: &Delivery) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO customer (name, phone, zip, city, address, region, email)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.zip)
        .bind(&customer.city)
        .bind(&customer.address)
        .bind(&customer.region)
        .bind(&customer.email)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to insert customer", &e))?;

        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payment (transaction, request_id, currency, provider, amount,
                                  payment_dt, bank, delivery_cost, goods_total, custom_fee)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (transaction) DO NOTHING",
        )
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to insert payment", &e))?;

        Ok(())
    }

    async fn insert_item(&self, item: &Item) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO item (chrt_id, track_number, price, rid, name, sale, size,
                               total_price, nm_id, brand, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (chrt_id) DO NOTHING",
        )
        .bind(item.chrt_id)
        .bind(&item.track_number)
        .bind(item.price)
        .bind(&item.rid)
        .bind(&item.name)
        .bind(item.sale)
        .bind(&item.size)
        .bind(item.total_price)
        .bind(item.nm_id)
        .bind(&item.brand)
        .bind(item.status)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to insert item", &e))?;

        Ok(())
    }

    async fn upsert_order_line(&self, order: &Order, item: &Item) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO order_line (order_uid, chrt_id, track_number, entry, customer_name,
                                     transaction, locale, internal_signature, customer_id,
                                     delivery_service, shardkey, sm_id, date_created, oof_shard)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT (order_uid, chrt_id)
             DO UPDATE SET delivery_count = order_line.delivery_count + 1",
        )
        .bind(&order.order_uid)
        .bind(item.chrt_id)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.delivery.name)
        .bind(&order.payment.transaction)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(&order.date_created)
        .bind(&order.oof_shard)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to upsert order line", &e))?;

        Ok(())
    }

    async fn insert_snapshot(&self, order: &Order) -> Result<(), StoreError> {
        let document = order
            .to_json()
            .map_err(|e| StoreError::Serialization(format!("Failed to encode order: {e}")))?;

        sqlx::query(
            "INSERT INTO order_snapshot (order_uid, document)
             VALUES ($1, $2::jsonb)
             ON CONFLICT (order_uid) DO NOTHING",
        )
        .bind(&order.order_uid)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to insert snapshot", &e))?;

        Ok(())
    }
}

impl SnapshotSource for PostgresOrderStore {
    async fn snapshots(&self) -> Result<Vec<Snapshot>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT order_uid, document::text FROM order_snapshot ORDER BY created_at")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| store_error("Failed to load snapshots", &e))?;

        Ok(rows
            .into_iter()
            .map(|(order_uid, document)| Snapshot { order_uid, document })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_and_constraint_classes_are_rejections() {
        // invalid byte sequence, character not in repertoire, not-null, FK
        for code in ["22021", "22P05", "23502", "23503"] {
            assert!(is_data_error(code), "{code}");
        }
        // deadlock, serialization failure, admin shutdown
        for code in ["40P01", "40001", "57P01"] {
            assert!(!is_data_error(code), "{code}");
        }
    }

    #[test]
    fn pool_errors_are_connection_failures() {
        let error = store_error("Failed to insert customer", &sqlx::Error::PoolTimedOut);

        assert!(matches!(error, StoreError::ConnectionFailed(_)));
        assert!(!error.is_permanent());
    }
}
