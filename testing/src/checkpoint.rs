//! In-memory checkpoint.

use order_mirror_core::checkpoint::{CheckpointError, CheckpointStore, Position};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// One write made to an [`InMemoryCheckpointStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointWrite {
    /// `save(position)`
    Save(Position),
    /// `reset()`
    Reset,
}

/// [`CheckpointStore`] held in memory, recording every write.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    current: Mutex<Option<Position>>,
    writes: Mutex<Vec<CheckpointWrite>>,
    fail_load: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryCheckpointStore {
    /// Create a store with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `position`.
    #[must_use]
    pub fn with_position(position: Position) -> Self {
        let store = Self::default();
        *store.current.lock().unwrap() = Some(position);
        store
    }

    /// Make `load` fail.
    pub fn fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    /// Make `save` and `reset` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The stored value.
    #[must_use]
    pub fn current(&self) -> Option<Position> {
        *self.current.lock().unwrap()
    }

    /// Every successful write, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<CheckpointWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// The last position saved, ignoring resets.
    #[must_use]
    pub fn last_saved(&self) -> Option<Position> {
        self.writes().into_iter().rev().find_map(|write| match write {
            CheckpointWrite::Save(position) => Some(position),
            CheckpointWrite::Reset => None,
        })
    }

    fn write(&self, write: CheckpointWrite) -> Result<(), CheckpointError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CheckpointError::Other("checkpoint unavailable".to_string()));
        }

        *self.current.lock().unwrap() = match write {
            CheckpointWrite::Save(position) => Some(position),
            CheckpointWrite::Reset => None,
        };
        self.writes.lock().unwrap().push(write);
        Ok(())
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<Position>, CheckpointError>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(CheckpointError::Other("checkpoint unreadable".to_string()));
            }
            Ok(self.current())
        })
    }

    fn save(&self, position: Position) -> Pin<Box<dyn Future<Output = Result<(), CheckpointError>> + Send + '_>> {
        Box::pin(async move { self.write(CheckpointWrite::Save(position)) })
    }

    fn reset(&self) -> Pin<Box<dyn Future<Output = Result<(), CheckpointError>> + Send + '_>> {
        Box::pin(async move { self.write(CheckpointWrite::Reset) })
    }
}
