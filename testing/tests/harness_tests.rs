//! Tests for the in-memory test doubles.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use futures::StreamExt;
use order_mirror_core::checkpoint::{CheckpointStore, Position};
use order_mirror_core::transport::{MessageSource, StartPosition, TransportError};
use order_mirror_testing::fixtures::{message, raw_message, sample_order};
use order_mirror_testing::{CheckpointWrite, InMemoryCheckpointStore, ScriptedMessageSource};
use std::time::Duration;

fn position(value: u64) -> Position {
    Position::new(value).unwrap()
}

#[tokio::test]
async fn scripted_source_replays_in_order() {
    let source = ScriptedMessageSource::new("service-channel")
        .with_message(message(1, &sample_order("ord-1", 1)))
        .with_error(TransportError::ReceiveFailed("broken".to_string()))
        .with_message(raw_message(2, "not json"));

    let deliveries: Vec<_> = source
        .subscribe(StartPosition::Newest)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(deliveries.len(), 3);
    assert_eq!(deliveries[0].as_ref().unwrap().position, position(1));
    assert!(deliveries[1].is_err());
    assert_eq!(deliveries[2].as_ref().unwrap().payload, b"not json");
    assert_eq!(source.starts(), vec![StartPosition::Newest]);
}

#[tokio::test]
async fn scripted_source_resumes_after_position() {
    let source = ScriptedMessageSource::new("service-channel")
        .with_message(raw_message(1, "a"))
        .with_message(raw_message(2, "b"))
        .with_message(raw_message(3, "c"));

    let positions: Vec<u64> = source
        .subscribe(StartPosition::After(position(2)))
        .await
        .unwrap()
        .map(|delivery| delivery.unwrap().position.get())
        .collect()
        .await;

    assert_eq!(positions, vec![3]);
}

#[tokio::test]
async fn kept_open_source_never_ends() {
    let source = ScriptedMessageSource::new("service-channel")
        .with_message(raw_message(1, "a"))
        .keep_open();

    let mut stream = source.subscribe(StartPosition::Newest).await.unwrap();
    assert!(stream.next().await.is_some());

    let next = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
    assert!(next.is_err(), "stream should stay pending");
}

#[tokio::test]
async fn unreachable_source_fails_to_subscribe() {
    let source = ScriptedMessageSource::new("service-channel").unreachable();

    let result = source.subscribe(StartPosition::Newest).await;

    assert!(matches!(result, Err(TransportError::SubscriptionFailed { .. })));
    assert!(source.starts().is_empty());
}

#[tokio::test]
async fn checkpoint_records_writes() {
    let checkpoint = InMemoryCheckpointStore::with_position(position(7));
    assert_eq!(checkpoint.load().await.unwrap(), Some(position(7)));

    checkpoint.save(position(8)).await.unwrap();
    checkpoint.reset().await.unwrap();

    assert_eq!(
        checkpoint.writes(),
        vec![CheckpointWrite::Save(position(8)), CheckpointWrite::Reset]
    );
    assert_eq!(checkpoint.last_saved(), Some(position(8)));
    assert_eq!(checkpoint.load().await.unwrap(), None);
}

#[tokio::test]
async fn checkpoint_failures_are_injectable() {
    let checkpoint = InMemoryCheckpointStore::new();
    checkpoint.fail_load(true);
    checkpoint.fail_writes(true);

    assert!(checkpoint.load().await.is_err());
    assert!(checkpoint.save(position(1)).await.is_err());
    assert!(checkpoint.writes().is_empty());
}
