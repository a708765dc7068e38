//! End-to-end ingestion against the in-memory backends.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use order_mirror_core::checkpoint::Position;
use order_mirror_core::lifecycle::IngestState;
use order_mirror_core::model::Order;
use order_mirror_core::transport::{StartPosition, TransportError};
use order_mirror_core::writer::WriteStep;
use order_mirror_core::OrderCache;
use order_mirror_ingest::{DiscardReason, IngestError, Ingestor, Outcome, RetryPolicy};
use order_mirror_testing::fixtures::{message, raw_message, sample_order};
use order_mirror_testing::{
    init_test_tracing, CheckpointWrite, InMemoryCheckpointStore, InMemoryOrderStore,
    ScriptedMessageSource,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    store: Arc<InMemoryOrderStore>,
    cache: Arc<OrderCache>,
    checkpoint: Arc<InMemoryCheckpointStore>,
    source: Arc<ScriptedMessageSource>,
}

impl Harness {
    fn new(source: ScriptedMessageSource) -> Self {
        init_test_tracing();
        Self {
            store: Arc::new(InMemoryOrderStore::new()),
            cache: Arc::new(OrderCache::new()),
            checkpoint: Arc::new(InMemoryCheckpointStore::new()),
            source: Arc::new(source),
        }
    }

    fn ingestor(&self) -> Ingestor<InMemoryOrderStore> {
        Ingestor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            self.checkpoint.clone(),
            self.source.clone(),
        )
        .with_retry_policy(
            RetryPolicy::builder()
                .initial_delay(Duration::from_millis(5))
                .max_delay(Duration::from_millis(20))
                .build(),
        )
    }
}

fn position(value: u64) -> Position {
    Position::new(value).unwrap()
}

fn channel() -> ScriptedMessageSource {
    ScriptedMessageSource::new("service-channel")
}

#[tokio::test]
async fn well_formed_order_is_persisted_cached_and_checkpointed() {
    let order = sample_order("ord-1", 42);
    let harness = Harness::new(channel());
    let ingestor = harness.ingestor();

    let outcome = ingestor.handle(&message(1, &order)).await;

    assert!(matches!(outcome, Outcome::Committed(p) if p == position(1)));
    assert_eq!(harness.store.customer_count(), 1);
    assert_eq!(harness.store.payment_count(), 1);
    assert_eq!(harness.store.item_count(), 1);
    assert_eq!(harness.store.delivery_count("ord-1", 42), Some(1));
    assert_eq!(harness.store.snapshot_count(), 1);
    assert_eq!(
        harness.cache.lookup("ord-1").unwrap(),
        Some(order.to_pretty_json().unwrap())
    );
    assert_eq!(harness.checkpoint.current(), Some(position(1)));
}

#[tokio::test]
async fn redelivery_only_bumps_order_line_counter() {
    let order = sample_order("ord-1", 42);
    let harness = Harness::new(channel());
    let ingestor = harness.ingestor();

    ingestor.handle(&message(1, &order)).await;
    let cached = harness.cache.get("ord-1").unwrap();
    let outcome = ingestor.handle(&message(2, &order)).await;

    assert!(matches!(outcome, Outcome::Committed(p) if p == position(2)));
    assert_eq!(harness.store.delivery_count("ord-1", 42), Some(2));
    assert_eq!(harness.store.customer_count(), 1);
    assert_eq!(harness.store.payment_count(), 1);
    assert_eq!(harness.store.item_count(), 1);
    assert_eq!(harness.store.order_line_count(), 1);
    assert_eq!(harness.store.snapshot_count(), 1);
    assert_eq!(*harness.cache.get("ord-1").unwrap(), *cached);
    assert_eq!(harness.checkpoint.current(), Some(position(2)));
}

#[tokio::test]
async fn checkpoint_ends_at_last_successful_message() {
    let harness = Harness::new(channel());
    let ingestor = harness.ingestor();

    for n in 1..=5_u64 {
        let order = sample_order(&format!("ord-{n}"), i64::try_from(n).unwrap());
        ingestor.handle(&message(n * 10, &order)).await;
    }

    assert_eq!(harness.checkpoint.current(), Some(position(50)));
    assert_eq!(harness.cache.len(), 5);
}

#[tokio::test]
async fn store_outage_does_not_advance_checkpoint() {
    let harness = Harness::new(channel());
    let ingestor = harness.ingestor();

    ingestor.handle(&message(1, &sample_order("ord-1", 1))).await;
    harness.store.set_unavailable(true);
    let outcome = ingestor.handle(&message(2, &sample_order("ord-2", 2))).await;

    assert!(matches!(outcome, Outcome::Deferred { position: p, .. } if p == position(2)));
    assert!(!outcome.is_settled());
    assert_eq!(harness.checkpoint.current(), Some(position(1)));
    assert!(harness.cache.get("ord-2").is_none());
}

#[tokio::test]
async fn malformed_payload_is_discarded_and_skipped() {
    let harness = Harness::new(channel());
    let ingestor = harness.ingestor();

    let outcome = ingestor.handle(&raw_message(3, "not json")).await;

    assert!(matches!(
        outcome,
        Outcome::Discarded { reason: DiscardReason::Decode(_), .. }
    ));
    assert_eq!(harness.store.calls(), 0);
    assert_eq!(harness.checkpoint.current(), Some(position(3)));
}

#[tokio::test]
async fn invalid_order_never_reaches_the_store() {
    let harness = Harness::new(channel());
    let ingestor = harness.ingestor();

    let mut no_items = sample_order("ord-1", 1);
    no_items.items.clear();
    let mut zero_chrt = sample_order("ord-2", 0);
    zero_chrt.items[0].chrt_id = 0;
    let no_uid = sample_order("", 3);

    for (n, order) in [no_items, zero_chrt, no_uid].iter().enumerate() {
        let outcome = ingestor.handle(&message(n as u64 + 1, order)).await;
        assert!(matches!(
            outcome,
            Outcome::Discarded { reason: DiscardReason::Validation(_), .. }
        ));
    }

    assert_eq!(harness.store.calls(), 0);
    assert!(harness.cache.is_empty());
    assert_eq!(harness.checkpoint.current(), Some(position(3)));
}

#[tokio::test]
async fn nul_character_is_discarded_before_the_store() {
    let harness = Harness::new(channel());
    let ingestor = harness.ingestor();
    let mut order = sample_order("ord-1", 42);
    order.delivery.name = "Ann\0".to_string();

    let outcome = ingestor.handle(&message(1, &order)).await;

    assert!(matches!(
        outcome,
        Outcome::Discarded { reason: DiscardReason::Validation(_), .. }
    ));
    assert_eq!(harness.store.calls(), 0);
    assert_eq!(harness.checkpoint.current(), Some(position(1)));
}

#[tokio::test]
async fn store_rejection_is_discarded_and_ingestion_continues() {
    let harness = Harness::new(
        channel()
            .with_message(message(1, &sample_order("ord-1", 7)))
            .with_message(message(2, &sample_order("ord-2", 8))),
    );
    harness.store.reject_item(7);

    let summary = harness
        .ingestor()
        .run(std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(summary.discarded, 1);
    assert_eq!(summary.committed, 1);
    assert_eq!(summary.deferred, 0);
    assert_eq!(summary.last_committed, Some(position(2)));
    assert!(harness.cache.get("ord-1").is_none());
    assert!(harness.cache.get("ord-2").is_some());
    assert_eq!(
        harness.checkpoint.writes(),
        vec![
            CheckpointWrite::Save(position(1)),
            CheckpointWrite::Save(position(2)),
            CheckpointWrite::Reset,
        ]
    );
}

#[tokio::test]
async fn store_rejection_reports_the_failed_step() {
    let harness = Harness::new(channel());
    harness.store.reject_item(7);

    let outcome = harness
        .ingestor()
        .handle(&message(4, &sample_order("ord-1", 7)))
        .await;

    let Outcome::Discarded { reason: DiscardReason::Rejected(error), .. } = outcome else {
        panic!("expected a rejected discard");
    };
    assert_eq!(error.step, WriteStep::Item(0));
    assert_eq!(harness.checkpoint.current(), Some(position(4)));
}

#[tokio::test]
async fn redelivered_changes_keep_cache_equal_to_store() {
    let harness = Harness::new(channel());
    let ingestor = harness.ingestor();
    let original = sample_order("ord-1", 42);
    let mut changed = original.clone();
    changed.track_number = "CHANGED".to_string();

    ingestor.handle(&message(1, &original)).await;
    let outcome = ingestor.handle(&message(2, &changed)).await;

    assert!(matches!(outcome, Outcome::Committed(p) if p == position(2)));
    assert_eq!(*harness.cache.get("ord-1").unwrap(), original);

    let restarted = Arc::new(OrderCache::new());
    Ingestor::new(
        Arc::clone(&harness.store),
        Arc::clone(&restarted),
        harness.checkpoint.clone(),
        harness.source.clone(),
    )
    .start()
    .await
    .unwrap();

    assert_eq!(
        *restarted.get("ord-1").unwrap(),
        *harness.cache.get("ord-1").unwrap()
    );
}

#[tokio::test]
async fn startup_recovers_cache_from_snapshots() {
    let harness = Harness::new(channel());
    let first = sample_order("ord-1", 1);
    let second = sample_order("ord-2", 2);
    harness
        .store
        .insert_raw_snapshot("ord-1", &first.to_json().unwrap());
    harness
        .store
        .insert_raw_snapshot("ord-2", &second.to_json().unwrap());
    harness.store.insert_raw_snapshot("broken", "{\"order_uid\":");

    harness.ingestor().start().await.unwrap();

    assert_eq!(harness.cache.len(), 2);
    assert_eq!(*harness.cache.get("ord-1").unwrap(), first);
    assert_eq!(*harness.cache.get("ord-2").unwrap(), second);
}

#[tokio::test]
async fn recovered_cache_matches_what_was_ingested() {
    let harness = Harness::new(channel());
    let ingestor = harness.ingestor();
    let orders: Vec<Order> = (1..=3).map(|n| sample_order(&format!("ord-{n}"), n)).collect();
    for (n, order) in orders.iter().enumerate() {
        ingestor.handle(&message(n as u64 + 1, order)).await;
    }

    let restarted = Arc::new(OrderCache::new());
    Ingestor::new(
        Arc::clone(&harness.store),
        Arc::clone(&restarted),
        harness.checkpoint.clone(),
        harness.source.clone(),
    )
    .start()
    .await
    .unwrap();

    for order in &orders {
        assert_eq!(*restarted.get(&order.order_uid).unwrap(), *order);
    }
}

#[tokio::test]
async fn resumes_after_stored_checkpoint() {
    let source = channel()
        .with_message(message(1, &sample_order("ord-1", 1)))
        .with_message(message(2, &sample_order("ord-2", 2)))
        .with_message(message(3, &sample_order("ord-3", 3)));
    let mut harness = Harness::new(source);
    harness.checkpoint = Arc::new(InMemoryCheckpointStore::with_position(position(1)));

    let summary = harness.ingestor().run(std::future::pending()).await.unwrap();

    assert_eq!(harness.source.starts(), vec![StartPosition::After(position(1))]);
    assert_eq!(summary.committed, 2);
    assert_eq!(summary.last_committed, Some(position(3)));
    assert!(harness.cache.get("ord-1").is_none());
}

#[tokio::test]
async fn unreadable_checkpoint_starts_from_newest() {
    let harness = Harness::new(channel());
    harness.checkpoint.fail_load(true);

    harness.ingestor().start().await.unwrap();

    assert_eq!(harness.source.starts(), vec![StartPosition::Newest]);
}

#[tokio::test]
async fn unreachable_dependencies_are_fatal() {
    let harness = Harness::new(channel().unreachable());
    let result = harness.ingestor().run(std::future::pending()).await;
    assert!(matches!(result, Err(IngestError::Subscribe(_))));

    let harness = Harness::new(channel());
    harness.store.set_unavailable(true);
    let result = harness.ingestor().run(std::future::pending()).await;
    assert!(matches!(result, Err(IngestError::Recovery(_))));
}

#[tokio::test]
async fn clean_shutdown_resets_checkpoint() {
    let source = channel()
        .with_message(message(1, &sample_order("ord-1", 1)))
        .with_error(TransportError::ReceiveFailed("broker hiccup".to_string()))
        .with_message(raw_message(2, "{}"))
        .with_message(message(3, &sample_order("ord-3", 3)));
    let harness = Harness::new(source);
    let ingestor = harness.ingestor();
    let state = ingestor.state();

    let summary = ingestor.run(std::future::pending()).await.unwrap();

    assert_eq!(summary.committed, 2);
    assert_eq!(summary.discarded, 1);
    assert_eq!(summary.deferred, 0);
    assert_eq!(
        harness.checkpoint.writes(),
        vec![
            CheckpointWrite::Save(position(1)),
            CheckpointWrite::Save(position(2)),
            CheckpointWrite::Save(position(3)),
            CheckpointWrite::Reset,
        ]
    );
    assert_eq!(harness.checkpoint.current(), None);
    assert_eq!(*state.borrow(), IngestState::Stopped);
}

#[tokio::test]
async fn deferred_message_is_retried_until_it_settles() {
    let source = channel()
        .with_message(message(1, &sample_order("ord-1", 1)))
        .with_message(message(2, &sample_order("ord-2", 2)));
    let harness = Harness::new(source);
    harness.store.fail_next(3);

    let summary = harness.ingestor().run(std::future::pending()).await.unwrap();

    assert_eq!(summary.deferred, 3);
    assert_eq!(summary.committed, 2);
    assert_eq!(harness.checkpoint.last_saved(), Some(position(2)));
    assert_eq!(harness.store.delivery_count("ord-1", 1), Some(1));
}

#[tokio::test]
async fn shutdown_while_stalled_keeps_checkpoint() {
    let source = channel()
        .with_message(message(1, &sample_order("ord-1", 1)))
        .with_message(message(2, &sample_order("ord-2", 2)))
        .with_message(message(3, &sample_order("ord-3", 3)))
        .keep_open();
    let harness = Harness::new(source);
    let ingestor = harness.ingestor();
    let mut state = ingestor.state();

    ingestor.handle(&message(1, &sample_order("ord-1", 1))).await;
    harness.store.set_writes_failing(true);

    let summary = ingestor
        .run(tokio::time::sleep(Duration::from_millis(50)))
        .await
        .unwrap();

    assert_eq!(harness.source.starts(), vec![StartPosition::After(position(1))]);
    assert_eq!(summary.committed, 0);
    assert!(summary.deferred >= 1);
    assert_eq!(harness.checkpoint.current(), Some(position(1)));
    assert!(!harness.checkpoint.writes().contains(&CheckpointWrite::Reset));
    assert!(harness.cache.get("ord-2").is_none());
    assert!(harness.cache.get("ord-3").is_none());
    assert_eq!(*state.borrow_and_update(), IngestState::Stopped);
}

#[tokio::test]
async fn state_moves_through_lifecycle() {
    let harness = Harness::new(channel().keep_open());
    let ingestor = Arc::new(harness.ingestor());
    let mut state = ingestor.state();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

    let running = tokio::spawn({
        let ingestor = Arc::clone(&ingestor);
        async move {
            ingestor
                .run(async {
                    stopped.await.ok();
                })
                .await
        }
    });

    state.wait_for(|s| s.is_running()).await.unwrap();
    stop.send(()).unwrap();
    running.await.unwrap().unwrap();

    assert_eq!(*state.borrow(), IngestState::Stopped);
    assert_eq!(harness.checkpoint.writes(), vec![CheckpointWrite::Reset]);
}
