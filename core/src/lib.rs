//! # order-mirror core
//!
//! Domain types and contracts for the order ingestion pipeline.
//!
//! Orders arrive on a durable stream, are validated, written to a relational
//! store as normalized entities plus a full-document snapshot, and mirrored in
//! an in-memory cache for lookups by `order_uid`.
//!
//! ```text
//! stream ─► decode ─► validate ─► EntityWriter ─► OrderCache ─► checkpoint
//!                                      │
//!                                      ▼
//!                               relational store ─► RecoveryLoader (startup)
//! ```
//!
//! This crate holds the pure parts (model, validation, cache, write sequence,
//! recovery) and the traits the backends implement:
//!
//! - [`store::EntityStore`] / [`store::SnapshotSource`] : relational store
//! - [`checkpoint::CheckpointStore`] : last settled position
//! - [`transport::MessageSource`] : ordered, resumable subscription

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod checkpoint;
pub mod lifecycle;
pub mod model;
pub mod recovery;
pub mod store;
pub mod transport;
pub mod validation;
pub mod writer;

pub use cache::{CacheError, OrderCache};
pub use checkpoint::{CheckpointError, CheckpointStore, Position};
pub use lifecycle::IngestState;
pub use model::{DecodeError, Delivery, Item, Order, Payment};
pub use recovery::RecoveryLoader;
pub use store::{EntityStore, Snapshot, SnapshotSource, StoreError};
pub use transport::{Message, MessageSource, MessageStream, StartPosition, TransportError};
pub use validation::{validate, Validate, ValidationError};
pub use writer::{EntityWriter, WriteError, WriteStep};
