//! Redpanda order stream source for order-mirror.
//!
//! Implements [`MessageSource`] over one partition of a Kafka-compatible
//! topic using rdkafka.
//!
//! # Positions
//!
//! A message at Kafka offset `o` has position `o + 1`. Subscribing after
//! position `P` assigns the partition at offset `P`, which is the first
//! message the checkpoint has not settled. Subscribing at "newest" assigns
//! the partition at its end.
//!
//! # Delivery Semantics
//!
//! **At-least-once**, driven by the caller's checkpoint:
//! - The partition is assigned explicitly; no consumer-group offsets are
//!   committed (`enable.auto.commit=false`)
//! - Where to resume is decided only by the [`StartPosition`] passed in
//! - Dropping the stream stops the consumer task and releases the connection
//!
//! # Example
//!
//! ```no_run
//! use order_mirror_core::transport::{MessageSource, StartPosition};
//! use order_mirror_redpanda::RedpandaMessageSource;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = RedpandaMessageSource::builder()
//!     .brokers("localhost:9092")
//!     .topic("service-channel")
//!     .build()?;
//!
//! let mut stream = source.subscribe(StartPosition::Newest).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(message) => println!("Received position {}", message.position),
//!         Err(e) => eprintln!("Error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use order_mirror_core::checkpoint::Position;
use order_mirror_core::transport::{
    Message, MessageSource, MessageStream, StartPosition, TransportError,
};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message as _;
use rdkafka::{Offset, TopicPartitionList};
use std::future::Future;
use std::pin::Pin;

/// Kafka-compatible [`MessageSource`] reading one topic partition.
///
/// # Configuration
///
/// - `brokers`: comma-separated bootstrap servers (required)
/// - `topic`: channel to read (required)
/// - `partition`: partition to assign (default: 0)
/// - `consumer_group`: `group.id` reported to the broker (default: "order-mirror")
/// - `buffer_size`: messages buffered between the consumer task and the
///   stream (default: 100)
pub struct RedpandaMessageSource {
    brokers: String,
    topic: String,
    partition: i32,
    consumer_group: String,
    buffer_size: usize,
}

impl RedpandaMessageSource {
    /// Create a builder.
    #[must_use]
    pub fn builder() -> RedpandaMessageSourceBuilder {
        RedpandaMessageSourceBuilder::default()
    }

    /// Bootstrap servers.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// Assigned partition.
    #[must_use]
    pub const fn partition(&self) -> i32 {
        self.partition
    }

    fn create_consumer(&self) -> Result<StreamConsumer, TransportError> {
        ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.consumer_group)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| TransportError::ConnectionFailed(format!("Failed to create consumer: {e}")))
    }
}

/// Builder for [`RedpandaMessageSource`].
#[derive(Default)]
pub struct RedpandaMessageSourceBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    partition: Option<i32>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
}

impl RedpandaMessageSourceBuilder {
    /// Set the bootstrap servers (e.g. "localhost:9092").
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the topic to read.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the partition to assign.
    #[must_use]
    pub const fn partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Set the consumer group id.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set the buffer between the consumer task and the stream.
    ///
    /// A zero value is raised to 1.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size.max(1));
        self
    }

    /// Build the source.
    ///
    /// No connection is made until [`MessageSource::subscribe`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if brokers or topic are
    /// missing.
    pub fn build(self) -> Result<RedpandaMessageSource, TransportError> {
        let brokers = self
            .brokers
            .ok_or_else(|| TransportError::ConnectionFailed("Brokers not configured".to_string()))?;
        let topic = self
            .topic
            .ok_or_else(|| TransportError::ConnectionFailed("Topic not configured".to_string()))?;

        let source = RedpandaMessageSource {
            brokers,
            topic,
            partition: self.partition.unwrap_or(0),
            consumer_group: self
                .consumer_group
                .unwrap_or_else(|| "order-mirror".to_string()),
            buffer_size: self.buffer_size.unwrap_or(100),
        };

        tracing::info!(
            brokers = %source.brokers,
            topic = %source.topic,
            partition = source.partition,
            consumer_group = %source.consumer_group,
            buffer_size = source.buffer_size,
            "RedpandaMessageSource created"
        );

        Ok(source)
    }
}

/// Kafka offset at which a subscription starts.
fn start_offset(start: StartPosition) -> Result<Offset, TransportError> {
    match start {
        StartPosition::Newest => Ok(Offset::End),
        StartPosition::After(position) => i64::try_from(position.next_offset())
            .map(Offset::Offset)
            .map_err(|_| TransportError::ConnectionFailed(format!("Position {position} out of range"))),
    }
}

impl MessageSource for RedpandaMessageSource {
    fn channel(&self) -> &str {
        &self.topic
    }

    fn subscribe(
        &self,
        start: StartPosition,
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, TransportError>> + Send + '_>> {
        Box::pin(async move {
            let subscription_failed = |reason: String| TransportError::SubscriptionFailed {
                channel: self.topic.clone(),
                reason,
            };

            let consumer = self.create_consumer()?;
            let offset = start_offset(start)?;

            let mut assignment = TopicPartitionList::new();
            assignment
                .add_partition_offset(&self.topic, self.partition, offset)
                .map_err(|e| subscription_failed(format!("Invalid offset: {e}")))?;
            consumer
                .assign(&assignment)
                .map_err(|e| subscription_failed(format!("Failed to assign partition: {e}")))?;

            tracing::info!(
                topic = %self.topic,
                partition = self.partition,
                offset = ?offset,
                "Partition assigned"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(self.buffer_size);

            // The task owns the consumer; it exits once the stream is dropped.
            tokio::spawn(async move {
                use futures::StreamExt;

                let mut stream = consumer.stream();

                loop {
                    let next = tokio::select! {
                        () = tx.closed() => break,
                        next = stream.next() => next,
                    };

                    let Some(result) = next else {
                        break;
                    };

                    let delivery = match result {
                        Ok(message) => match Position::from_offset(message.offset()) {
                            Some(position) => {
                                tracing::trace!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    "Received message"
                                );
                                Ok(Message {
                                    position,
                                    payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                                })
                            }
                            None => Err(TransportError::ReceiveFailed(format!(
                                "Message without a valid offset: {}",
                                message.offset()
                            ))),
                        },
                        Err(e) => Err(TransportError::ReceiveFailed(format!(
                            "Failed to receive message: {e}"
                        ))),
                    };

                    if tx.send(delivery).await.is_err() {
                        break;
                    }
                }

                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as MessageStream)
        })
    }
}
