//! # order-mirror testing
//!
//! In-memory stand-ins for the pipeline's external collaborators, plus
//! order fixtures.
//!
//! - [`InMemoryOrderStore`]: relational store with outage injection
//! - [`InMemoryCheckpointStore`]: checkpoint that records every write
//! - [`ScriptedMessageSource`]: transport replaying a fixed message list
//!
//! ## Example
//!
//! ```ignore
//! use order_mirror_testing::{fixtures, InMemoryOrderStore, ScriptedMessageSource};
//!
//! let order = fixtures::sample_order("ord-1", 42);
//! let source = ScriptedMessageSource::new("service-channel")
//!     .with_message(fixtures::message(1, &order));
//! ```

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

pub mod checkpoint;
pub mod fixtures;
pub mod store;
pub mod transport;

pub use checkpoint::{CheckpointWrite, InMemoryCheckpointStore};
pub use store::InMemoryOrderStore;
pub use transport::ScriptedMessageSource;

/// Install a fmt subscriber writing through the test harness.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_mirror=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
