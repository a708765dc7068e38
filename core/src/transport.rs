//! Ordered, resumable subscription to the order stream.
//!
//! The transport is a black box that delivers messages at least once, in
//! order, each with a monotonically increasing [`Position`]. A subscription
//! can start right after a known position or at the newest message.
//!
//! Dropping the returned [`MessageStream`] unsubscribes and releases the
//! transport connection.
//!
//! # Implementations
//!
//! - `RedpandaMessageSource` in `order-mirror-redpanda` (production)
//! - `ScriptedMessageSource` in `order-mirror-testing` (tests)

use crate::checkpoint::Position;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised by the transport.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Could not connect to the transport.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Could not open the subscription.
    #[error("Subscription to '{channel}' failed: {reason}")]
    SubscriptionFailed {
        /// The channel that failed.
        channel: String,
        /// The reason for failure.
        reason: String,
    },

    /// A message could not be received.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// Where a new subscription starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Only messages published from now on.
    Newest,
    /// The first message after this position.
    After(Position),
}

impl From<Option<Position>> for StartPosition {
    fn from(position: Option<Position>) -> Self {
        position.map_or(Self::Newest, Self::After)
    }
}

/// A delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Position of this message in the stream.
    pub position: Position,
    /// Opaque payload.
    pub payload: Vec<u8>,
}

/// Stream of delivered messages.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<Message, TransportError>> + Send>>;

/// A source of ordered order-stream messages.
pub trait MessageSource: Send + Sync {
    /// Name of the channel this source reads.
    fn channel(&self) -> &str;

    /// Open a subscription starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the subscription cannot be opened.
    fn subscribe(
        &self,
        start: StartPosition,
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, TransportError>> + Send + '_>>;
}
