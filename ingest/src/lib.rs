//! Order ingestion for order-mirror.
//!
//! - [`Ingestor`]: drives one subscription through decode, validation,
//!   persistence, cache update and checkpointing
//! - [`FileCheckpointStore`]: checkpoint kept in a single local file
//! - [`RetryPolicy`]: backoff used while a message cannot be persisted

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod checkpoint;
pub mod ingestor;
pub mod retry;

pub use checkpoint::FileCheckpointStore;
pub use ingestor::{DiscardReason, IngestError, IngestSummary, Ingestor, Outcome};
pub use retry::RetryPolicy;
