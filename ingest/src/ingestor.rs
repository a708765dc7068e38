//! The ingestion loop.
//!
//! # Overview
//!
//! The `Ingestor` owns one subscription and processes its messages strictly
//! one at a time:
//!
//! ```text
//!            ┌──────────┐
//!  message ─►│  decode  │── error ──► discard, checkpoint
//!            └────┬─────┘
//!                 ▼
//!            ┌──────────┐
//!            │ validate │── error ──► discard, checkpoint
//!            └────┬─────┘
//!                 ▼
//!            ┌──────────┐
//!            │ persist  │── rejected ──► discard, checkpoint
//!            └────┬─────┘── other error ──► defer, back off, retry
//!                 │
//!                 ▼
//!   cache insert ─► checkpoint
//! ```
//!
//! Input errors can never succeed, so they advance the checkpoint past the
//! message. That includes values the store refuses outright
//! ([`WriteError::is_permanent`]). Other store errors keep the checkpoint
//! where it is and the same message is retried until it settles or shutdown
//! is requested.
//!
//! # Lifecycle
//!
//! `Starting ─► Running ─► Draining ─► Stopped`, published on a watch
//! channel (see [`Ingestor::state`]).

use crate::retry::RetryPolicy;
use futures::StreamExt;
use order_mirror_core::cache::OrderCache;
use order_mirror_core::checkpoint::{CheckpointStore, Position};
use order_mirror_core::lifecycle::IngestState;
use order_mirror_core::model::{DecodeError, Order};
use order_mirror_core::recovery::RecoveryLoader;
use order_mirror_core::store::{EntityStore, SnapshotSource, StoreError};
use order_mirror_core::transport::{
    Message, MessageSource, MessageStream, StartPosition, TransportError,
};
use order_mirror_core::validation::{validate, ValidationError};
use order_mirror_core::writer::{EntityWriter, WriteError};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Fatal errors raised while starting.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Stored snapshots could not be read.
    #[error("Recovery failed: {0}")]
    Recovery(#[source] StoreError),

    /// The subscription could not be opened.
    #[error("Subscription failed: {0}")]
    Subscribe(#[from] TransportError),
}

/// Why a message was dropped.
#[derive(Debug)]
pub enum DiscardReason {
    /// The payload is not an order document.
    Decode(DecodeError),
    /// The order is missing a required field.
    Validation(ValidationError),
    /// The store refuses the order's values.
    Rejected(WriteError),
}

impl DiscardReason {
    /// Metric label for this reason.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Validation(_) => "validation",
            Self::Rejected(_) => "rejected",
        }
    }
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "{e}"),
            Self::Validation(e) => write!(f, "{e}"),
            Self::Rejected(e) => write!(f, "{e}"),
        }
    }
}

/// Result of handling one message.
#[derive(Debug)]
pub enum Outcome {
    /// Persisted and cached.
    Committed(Position),
    /// Unprocessable; dropped.
    Discarded {
        /// Position of the dropped message.
        position: Position,
        /// Why it was dropped.
        reason: DiscardReason,
    },
    /// Persistence failed; the message must be handled again.
    Deferred {
        /// Position of the message.
        position: Position,
        /// The failed write.
        error: WriteError,
    },
}

impl Outcome {
    /// Whether the message is settled (the checkpoint may move past it).
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !matches!(self, Self::Deferred { .. })
    }
}

/// Counters reported when [`Ingestor::run`] returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Messages persisted and cached.
    pub committed: u64,
    /// Messages dropped as unprocessable.
    pub discarded: u64,
    /// Failed persistence attempts.
    pub deferred: u64,
    /// Position of the last committed message.
    pub last_committed: Option<Position>,
}

/// Drives the ingestion pipeline for one subscription.
///
/// # Type Parameters
///
/// - `S`: relational store, used both for writes and for recovery
///
/// # Example
///
/// ```ignore
/// let ingestor = Ingestor::new(store, cache, checkpoint, source)
///     .with_retry_policy(RetryPolicy::default());
///
/// let mut state = ingestor.state();
/// let summary = ingestor.run(wait_for_signal()).await?;
/// ```
pub struct Ingestor<S> {
    writer: EntityWriter<S>,
    recovery: RecoveryLoader<S>,
    cache: Arc<OrderCache>,
    checkpoint: Arc<dyn CheckpointStore>,
    source: Arc<dyn MessageSource>,
    retry: RetryPolicy,
    state: watch::Sender<IngestState>,
}

impl<S> Ingestor<S>
where
    S: EntityStore + SnapshotSource,
{
    /// Create an ingestor in the `Starting` state.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        cache: Arc<OrderCache>,
        checkpoint: Arc<dyn CheckpointStore>,
        source: Arc<dyn MessageSource>,
    ) -> Self {
        let (state, _) = watch::channel(IngestState::Starting);

        Self {
            writer: EntityWriter::new(Arc::clone(&store)),
            recovery: RecoveryLoader::new(store),
            cache,
            checkpoint,
            source,
            retry: RetryPolicy::default(),
            state,
        }
    }

    /// Set the backoff used for deferred messages.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Subscribe to lifecycle changes.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<IngestState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: IngestState) {
        tracing::info!(channel = self.source.channel(), state = %state, "Ingestor state changed");
        self.state.send_replace(state);
    }

    /// Recover the cache, read the checkpoint and open the subscription.
    ///
    /// A checkpoint that cannot be read degrades to starting at the newest
    /// message.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the store or the transport is unreachable.
    pub async fn start(&self) -> Result<MessageStream, IngestError> {
        self.set_state(IngestState::Starting);

        let orders = self.recovery.run().await.map_err(IngestError::Recovery)?;
        self.cache.load(orders);

        let checkpoint = match self.checkpoint.load().await {
            Ok(position) => position,
            Err(e) => {
                tracing::warn!(error = %e, "Checkpoint unreadable, starting from newest");
                None
            }
        };

        let start = StartPosition::from(checkpoint);
        match start {
            StartPosition::After(position) => {
                tracing::info!(position = %position, "Resuming after checkpoint");
            }
            StartPosition::Newest => tracing::info!("Starting from newest message"),
        }

        let stream = self.source.subscribe(start).await?;
        tracing::info!(channel = self.source.channel(), "Subscribed");

        Ok(stream)
    }

    /// Run one message through the pipeline.
    ///
    /// Settled messages (committed or discarded) move the checkpoint to their
    /// position. A checkpoint write failure is logged; the message then counts
    /// as settled in memory and is redelivered after a restart.
    pub async fn handle(&self, message: &Message) -> Outcome {
        let position = message.position;

        let outcome = match self.process(message).await {
            Ok(order) => {
                tracing::debug!(position = %position, order_uid = %order.order_uid, "Order committed");
                let order_uid = order.order_uid.clone();
                if !self.cache.insert_new(order) {
                    tracing::debug!(
                        position = %position,
                        order_uid = %order_uid,
                        "Order already cached, keeping the stored document"
                    );
                }
                metrics::counter!("order_mirror.messages.committed").increment(1);
                Outcome::Committed(position)
            }
            Err(Rejection::Discard(reason)) => {
                tracing::warn!(
                    position = %position,
                    reason = reason.label(),
                    error = %reason,
                    "Discarding message"
                );
                tracing::debug!(
                    position = %position,
                    payload = %String::from_utf8_lossy(&message.payload),
                    "Discarded payload"
                );
                metrics::counter!("order_mirror.messages.discarded", "reason" => reason.label())
                    .increment(1);
                Outcome::Discarded { position, reason }
            }
            Err(Rejection::Defer(error)) => {
                tracing::error!(position = %position, error = %error, "Failed to persist order");
                metrics::counter!("order_mirror.messages.deferred").increment(1);
                return Outcome::Deferred { position, error };
            }
        };

        if let Err(e) = self.checkpoint.save(position).await {
            tracing::error!(position = %position, error = %e, "Failed to save checkpoint");
        }

        outcome
    }

    async fn process(&self, message: &Message) -> Result<Order, Rejection> {
        let order = Order::from_slice(&message.payload)
            .map_err(|e| Rejection::Discard(DiscardReason::Decode(e)))?;

        validate(&order).map_err(|e| Rejection::Discard(DiscardReason::Validation(e)))?;

        self.writer.persist(&order).await.map_err(|e| {
            if e.is_permanent() {
                Rejection::Discard(DiscardReason::Rejected(e))
            } else {
                Rejection::Defer(e)
            }
        })?;

        Ok(order)
    }

    /// Start, process messages until `shutdown` completes or the stream
    /// ends, then drain.
    ///
    /// Shutdown is observed between messages and between attempts at a
    /// deferred message, never in the middle of a write.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if starting fails.
    pub async fn run<F>(&self, shutdown: F) -> Result<IngestSummary, IngestError>
    where
        F: Future<Output = ()>,
    {
        let mut stream = self.start().await?;
        self.set_state(IngestState::Running);

        tokio::pin!(shutdown);
        let mut summary = IngestSummary::default();

        let stalled = loop {
            let next = tokio::select! {
                biased;
                () = shutdown.as_mut() => {
                    tracing::info!("Shutdown signal received");
                    break false;
                }
                next = stream.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Error receiving message");
                    continue;
                }
                None => {
                    tracing::info!("Message stream ended");
                    break false;
                }
            };

            if !self.settle(&message, shutdown.as_mut(), &mut summary).await {
                break true;
            }
        };

        self.drain(stream, stalled).await;

        tracing::info!(
            committed = summary.committed,
            discarded = summary.discarded,
            deferred = summary.deferred,
            "Ingestor stopped"
        );
        Ok(summary)
    }

    /// Handle `message` until it settles. Returns `false` if shutdown was
    /// requested first.
    async fn settle<F>(
        &self,
        message: &Message,
        mut shutdown: Pin<&mut F>,
        summary: &mut IngestSummary,
    ) -> bool
    where
        F: Future<Output = ()>,
    {
        let mut attempt = 0;

        loop {
            match self.handle(message).await {
                Outcome::Committed(position) => {
                    summary.committed += 1;
                    summary.last_committed = Some(position);
                    return true;
                }
                Outcome::Discarded { .. } => {
                    summary.discarded += 1;
                    return true;
                }
                Outcome::Deferred { position, .. } => {
                    summary.deferred += 1;
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        position = %position,
                        attempt,
                        delay_ms = delay.as_millis(),
                        "Retrying message"
                    );

                    tokio::select! {
                        biased;
                        () = shutdown.as_mut() => {
                            tracing::info!(position = %position, "Shutdown while message unsettled");
                            return false;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn drain(&self, stream: MessageStream, stalled: bool) {
        self.set_state(IngestState::Draining);

        drop(stream);
        tracing::info!(channel = self.source.channel(), "Unsubscribed");

        if stalled {
            tracing::warn!("Keeping checkpoint so the unsettled message is redelivered");
        } else if let Err(e) = self.checkpoint.reset().await {
            tracing::error!(error = %e, "Failed to reset checkpoint");
        }

        self.set_state(IngestState::Stopped);
    }
}

enum Rejection {
    Discard(DiscardReason),
    Defer(WriteError),
}
