#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Fetch, cache and auto-placement behaviour of the sync engine against the
//! mock sheet service.

use std::sync::Arc;
use std::time::Duration;

use sheetsync_engine::cache::ManualClock;
use sheetsync_engine::event::{InMemoryEventSink, SyncEventKind, SyncEventOutcome};
use sheetsync_engine::mock::{MockCall, MockSheetService};
use sheetsync_engine::{
    EngineOptions, FetchOutcome, Field, FieldValue, SheetServiceError, SyncEngine, SyncErrorKind,
};

const HEADER: [&str; 5] = ["session_date", "x", "y", "title", "resolved"];

fn accept(_: usize) -> bool {
    true
}

fn decline(_: usize) -> bool {
    false
}

fn scenario_mock() -> Arc<MockSheetService> {
    let rows: &[&[&str]] = &[&["2025-01-01", "100", "200", "Dragon", "TRUE"]];
    Arc::new(MockSheetService::new().with_table(&HEADER, rows))
}

fn engine_with_clock(mock: &Arc<MockSheetService>, clock: &Arc<ManualClock>) -> SyncEngine {
    SyncEngine::new(mock.clone(), EngineOptions::default()).with_clock(clock.clone())
}

// ── Parsing through fetch ──

#[tokio::test]
async fn scenario_row_becomes_clean_record() {
    let mock = scenario_mock();
    let engine = SyncEngine::new(mock.clone(), EngineOptions::default());

    let outcome = engine.fetch(true, &accept).await.unwrap();
    let records = outcome.records();
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.id, "row-2");
    assert_eq!(r.row_number, 2);
    assert_eq!(r.title, "Dragon");
    assert_eq!(r.x, 100.0);
    assert_eq!(r.y, 200.0);
    assert!(r.resolved);
    assert!(r.modified_fields.is_empty());
    assert!(!engine.has_pending_changes());

    match mock.calls().as_slice() {
        [MockCall::GetValues(range)] => assert_eq!(range, "Sheet1!A:Z"),
        other => panic!("unexpected calls: {other:?}"),
    }
}

#[tokio::test]
async fn blank_titles_are_reported_as_rejected_rows() {
    let rows: &[&[&str]] = &[
        &["2025-01-01", "1", "2", "Dragon", "yes"],
        &["2025-01-02", "3", "4", "   ", "no"],
        &["2025-01-03", "5", "6", "Goblin", "0"],
    ];
    let mock = Arc::new(MockSheetService::new().with_table(&HEADER, rows));
    let engine = SyncEngine::new(mock, EngineOptions::default());

    match engine.fetch(false, &accept).await.unwrap() {
        FetchOutcome::Fetched {
            records,
            rejected_rows,
            ..
        } => {
            assert_eq!(rejected_rows, vec![3]);
            let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, vec!["row-2", "row-4"]);
        }
        other => panic!("expected a network fetch, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_title_column_is_configuration_error() {
    let rows: &[&[&str]] = &[&["1", "2"]];
    let mock = Arc::new(MockSheetService::new().with_table(&["x", "y"], rows));
    let engine = SyncEngine::new(mock, EngineOptions::default());

    let err = engine.fetch(false, &accept).await.unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::Configuration);
    assert!(!err.retryable);
    assert!(engine.records().is_empty());
    assert_eq!(engine.status().last_fetch_error, Some(err));
}

#[tokio::test]
async fn empty_table_is_configuration_error() {
    let engine = SyncEngine::new(Arc::new(MockSheetService::new()), EngineOptions::default());
    let err = engine.fetch(false, &accept).await.unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::Configuration);
}

// ── TTL cache ──

#[tokio::test]
async fn fresh_cache_skips_network() {
    let mock = scenario_mock();
    let clock = Arc::new(ManualClock::default());
    let events = Arc::new(InMemoryEventSink::new());
    let engine = engine_with_clock(&mock, &clock).with_event_sink(events.clone());

    engine.fetch(true, &accept).await.unwrap();
    clock.advance(Duration::from_secs(30));
    let second = engine.fetch(true, &accept).await.unwrap();

    assert!(matches!(second, FetchOutcome::Cached { .. }));
    assert_eq!(second.records().len(), 1);
    assert_eq!(mock.get_count(), 1);
    assert_eq!(events.of_kind(SyncEventKind::CacheHit).len(), 1);
}

#[tokio::test]
async fn stale_cache_refetches() {
    let mock = scenario_mock();
    let clock = Arc::new(ManualClock::default());
    let engine = engine_with_clock(&mock, &clock);

    engine.fetch(true, &accept).await.unwrap();
    clock.advance(Duration::from_secs(60));
    let outcome = engine.fetch(true, &accept).await.unwrap();

    assert!(matches!(outcome, FetchOutcome::Fetched { .. }));
    assert_eq!(mock.get_count(), 2);
}

#[tokio::test]
async fn refresh_ignores_ttl() {
    let mock = scenario_mock();
    let clock = Arc::new(ManualClock::default());
    let engine = engine_with_clock(&mock, &clock);

    engine.fetch(true, &accept).await.unwrap();
    engine.refresh(&accept).await.unwrap();
    assert_eq!(mock.get_count(), 2);
}

#[tokio::test]
async fn refetch_replaces_records_wholesale() {
    let mock = scenario_mock();
    let engine = SyncEngine::new(mock.clone(), EngineOptions::default());
    engine.fetch(false, &accept).await.unwrap();

    let rows: &[&[&str]] = &[
        &["2025-02-01", "5", "6", "Wyvern", "no"],
        &["2025-02-02", "7", "8", "Hydra", "no"],
    ];
    mock.set_table(&HEADER, rows);
    engine.refresh(&accept).await.unwrap();

    let titles: Vec<String> = engine.records().into_iter().map(|r| r.title).collect();
    assert_eq!(titles, vec!["Wyvern".to_string(), "Hydra".to_string()]);
}

// ── Destructive refresh confirmation ──

#[tokio::test]
async fn declined_refresh_changes_nothing() {
    let mock = scenario_mock();
    let events = Arc::new(InMemoryEventSink::new());
    let engine =
        SyncEngine::new(mock.clone(), EngineOptions::default()).with_event_sink(events.clone());
    engine.fetch(false, &accept).await.unwrap();
    engine
        .set_field("row-2", Field::X, FieldValue::Number(150.0))
        .unwrap();

    let asked = std::sync::atomic::AtomicUsize::new(0);
    let outcome = engine
        .refresh(&|pending: usize| {
            asked.store(pending, std::sync::atomic::Ordering::SeqCst);
            false
        })
        .await
        .unwrap();

    assert_eq!(outcome, FetchOutcome::Aborted);
    assert_eq!(asked.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(mock.get_count(), 1);
    assert_eq!(engine.pending_count(), 1);
    assert_eq!(engine.record("row-2").unwrap().x, 150.0);
    let fetches = events.of_kind(SyncEventKind::Fetch);
    assert_eq!(
        fetches.last().map(|e| e.outcome.clone()),
        Some(SyncEventOutcome::Aborted)
    );
}

#[tokio::test]
async fn accepted_refresh_discards_edits_before_reading() {
    let mock = scenario_mock();
    let engine = SyncEngine::new(mock.clone(), EngineOptions::default());
    engine.fetch(false, &accept).await.unwrap();
    engine
        .set_field("row-2", Field::Title, FieldValue::Text("Wyrm".into()))
        .unwrap();

    engine.refresh(&accept).await.unwrap();

    assert!(!engine.has_pending_changes());
    let r = engine.record("row-2").unwrap();
    assert_eq!(r.title, "Dragon");
    assert!(r.modified_fields.is_empty());
}

#[tokio::test]
async fn no_pending_means_no_confirmation() {
    let mock = scenario_mock();
    let engine = SyncEngine::new(mock.clone(), EngineOptions::default());
    engine.fetch(false, &decline).await.unwrap();
    let outcome = engine.refresh(&decline).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Fetched { .. }));
}

// ── Rate limiting ──

#[tokio::test]
async fn rate_limited_fetch_keeps_last_good_cache() {
    let mock = scenario_mock();
    let engine = SyncEngine::new(mock.clone(), EngineOptions::default());
    engine.fetch(false, &accept).await.unwrap();

    mock.push_get_error(SheetServiceError::Http {
        status: 429,
        message: "Quota exceeded".into(),
    });
    let err = engine.refresh(&accept).await.unwrap_err();

    assert_eq!(err.kind, SyncErrorKind::RateLimit);
    assert!(err.retryable);
    assert_eq!(err.http_status, Some(429));
    assert_eq!(engine.records().len(), 1);
    assert_eq!(engine.record("row-2").unwrap().title, "Dragon");

    let status = engine.status();
    assert!(!status.is_fetching);
    assert_eq!(status.last_fetch_error.map(|e| e.kind), Some(SyncErrorKind::RateLimit));

    engine.refresh(&accept).await.unwrap();
    assert!(engine.status().last_fetch_error.is_none());
}

#[tokio::test]
async fn network_failure_on_first_fetch_leaves_cache_empty() {
    let mock = Arc::new(MockSheetService::new().with_get_error(SheetServiceError::Network {
        message: "dns failure".into(),
    }));
    let engine = SyncEngine::new(mock, EngineOptions::default());
    let err = engine.fetch(true, &accept).await.unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::Network);
    assert!(engine.records().is_empty());
    assert!(engine.fetched_at().is_none());
}

// ── Auto-placement ──

#[tokio::test]
async fn origin_record_is_placed_from_sibling_and_pending() {
    let header = ["title", "x", "y", "location targetted"];
    let rows: &[&[&str]] = &[&["Scout", "", "", "Cave"], &["Guard", "100", "200", "Cave"]];
    let mock = Arc::new(MockSheetService::new().with_table(&header, rows));
    let engine = SyncEngine::new(mock, EngineOptions::default());

    match engine.fetch(false, &accept).await.unwrap() {
        FetchOutcome::Fetched { placed, .. } => assert_eq!(placed, 1),
        other => panic!("expected a network fetch, got {other:?}"),
    }
    let scout = engine.record("row-2").unwrap();
    assert_eq!((scout.x, scout.y), (100.0, 200.0));
    assert!(scout.modified_fields.contains(&Field::X));
    assert!(scout.modified_fields.contains(&Field::Y));
    assert_eq!(scout.original_values[&Field::X], FieldValue::Number(0.0));
    assert_eq!(engine.pending().ids(), vec!["row-2".to_string()]);
}

#[tokio::test]
async fn first_placed_sibling_wins_in_either_order() {
    let header = ["title", "x", "y", "location targeted"];

    let forward: &[&[&str]] = &[
        &["Scout", "", "", "Cave"],
        &["Guard", "100", "200", "Cave"],
        &["Miner", "300", "400", "Cave"],
    ];
    let mock = Arc::new(MockSheetService::new().with_table(&header, forward));
    let engine = SyncEngine::new(mock, EngineOptions::default());
    engine.fetch(false, &accept).await.unwrap();
    let scout = engine.record("row-2").unwrap();
    assert_eq!((scout.x, scout.y), (100.0, 200.0));

    let reversed: &[&[&str]] = &[
        &["Miner", "300", "400", "Cave"],
        &["Guard", "100", "200", "Cave"],
        &["Scout", "", "", "Cave"],
    ];
    let mock = Arc::new(MockSheetService::new().with_table(&header, reversed));
    let engine = SyncEngine::new(mock, EngineOptions::default());
    engine.fetch(false, &accept).await.unwrap();
    let scout = engine.record("row-4").unwrap();
    assert_eq!((scout.x, scout.y), (300.0, 400.0));
}

#[tokio::test]
async fn unmatched_target_location_is_left_alone() {
    let header = ["title", "x", "y", "location targeted"];
    let rows: &[&[&str]] = &[&["Scout", "", "", "Nowhere"], &["Guard", "100", "200", "Cave"]];
    let mock = Arc::new(MockSheetService::new().with_table(&header, rows));
    let engine = SyncEngine::new(mock, EngineOptions::default());
    engine.fetch(false, &accept).await.unwrap();

    let scout = engine.record("row-2").unwrap();
    assert!(scout.is_at_origin());
    assert!(!engine.has_pending_changes());
}

// ── Observability ──

#[tokio::test]
async fn status_subscribers_see_fetch_completion() {
    let engine = SyncEngine::new(scenario_mock(), EngineOptions::default());
    let mut rx = engine.subscribe();
    assert!(rx.borrow().last_fetch_time.is_none());

    engine.fetch(false, &accept).await.unwrap();
    assert!(rx.has_changed().unwrap());
    let status = rx.borrow_and_update().clone();
    assert!(status.last_fetch_time.is_some());
    assert!(!status.is_fetching);
}
