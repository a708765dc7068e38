//! Durable tracking of the last settled stream position.
//!
//! The checkpoint is read once at startup to pick where the subscription
//! resumes, rewritten after every settled message, and reset to "no position"
//! on a clean shutdown.
//!
//! # Dyn Compatibility
//!
//! Like the transport, this trait returns `Pin<Box<dyn Future>>` so the
//! ingestor can hold it as `Arc<dyn CheckpointStore>`.

use std::fmt;
use std::future::Future;
use std::num::NonZeroU64;
use std::pin::Pin;
use thiserror::Error;

/// A 1-based position in the order stream.
///
/// Positions are the transport offset plus one, so zero is never a real
/// position and can encode "no position" on disk.
///
/// # Example
///
/// ```
/// use order_mirror_core::checkpoint::Position;
///
/// let position = Position::from_offset(41).unwrap();
/// assert_eq!(position.get(), 42);
/// assert_eq!(position.next_offset(), 42);
/// assert!(Position::new(0).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(NonZeroU64);

impl Position {
    /// Wrap a raw position; `0` is the sentinel and yields `None`.
    #[must_use]
    pub const fn new(value: u64) -> Option<Self> {
        match NonZeroU64::new(value) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Position of the message stored at transport offset `offset`.
    ///
    /// Returns `None` for negative offsets (logical offsets such as "end").
    #[must_use]
    pub fn from_offset(offset: i64) -> Option<Self> {
        u64::try_from(offset)
            .ok()
            .and_then(|offset| offset.checked_add(1))
            .and_then(Self::new)
    }

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Transport offset of the first message after this position.
    #[must_use]
    pub const fn next_offset(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised by a checkpoint backend.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// The backing storage could not be read or written.
    #[error("Checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("Checkpoint error: {0}")]
    Other(String),
}

/// Storage for the last settled position.
pub trait CheckpointStore: Send + Sync {
    /// Load the last recorded position.
    ///
    /// Returns `None` when nothing was recorded, the sentinel was written by a
    /// clean shutdown, or the stored value could not be understood.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the storage itself is unreadable.
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<Position>, CheckpointError>> + Send + '_>>;

    /// Durably replace the stored value with `position`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the write fails. The previous value must
    /// still load afterwards.
    fn save(&self, position: Position) -> Pin<Box<dyn Future<Output = Result<(), CheckpointError>> + Send + '_>>;

    /// Durably record "no position" (clean shutdown).
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the write fails.
    fn reset(&self) -> Pin<Box<dyn Future<Output = Result<(), CheckpointError>> + Send + '_>>;
}
