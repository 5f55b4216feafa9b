mod common;

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

use common::*;
use tron_transfer_watcher::blockchain::{accept_all, watch_addresses, Watcher, WatcherState};
use tron_transfer_watcher::config::WatcherConfig;
use tron_transfer_watcher::cursor::{Cursor, MemoryCursor, SqliteCursor};
use tron_transfer_watcher::error::{CursorError, WatcherError};
use tron_transfer_watcher::models::{Currency, ReceiptStatus, TransferEvent};
use tron_transfer_watcher::{EventStream, LedgerApi};

const WAIT: Duration = Duration::from_secs(60);

fn fast_config() -> WatcherConfig {
    WatcherConfig {
        poll_interval_ms: 10,
        ..WatcherConfig::default()
    }
}

async fn next_events(stream: &mut EventStream, count: usize) -> Vec<TransferEvent> {
    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        let event = timeout(WAIT, stream.recv())
            .await
            .expect("timed out waiting for event")
            .expect("stream closed early");
        events.push(event);
    }
    events
}

async fn drain(stream: &mut EventStream) -> Vec<TransferEvent> {
    let mut rest = Vec::new();
    while let Some(event) = timeout(WAIT, stream.recv()).await.expect("stream never closed") {
        rest.push(event);
    }
    rest
}

/// Native transfer from the token contract address to the zero address
fn seed_native_blocks(ledger: &ScriptedLedger, heights: std::ops::Range<u64>) {
    for height in heights {
        ledger.add_block(height, vec![native_tx(&format!("{}a", height), USDT_HEX, ZERO_HEX, height)]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_catches_up_in_order_and_advances_cursor() {
    let ledger = Arc::new(ScriptedLedger::new(5));
    seed_native_blocks(&ledger, 2..5);
    let cursor = MemoryCursor::new(2);

    let (handle, mut events) = Watcher::spawn(
        ledger.clone(),
        Arc::new(cursor.clone()),
        accept_all(),
        mainnet(),
        fast_config(),
    );

    let received = next_events(&mut events, 3).await;
    let heights: Vec<u64> = received.iter().map(|e| e.block).collect();
    assert_eq!(heights, vec![2, 3, 4]);

    for event in &received {
        assert_eq!(event.currency, Currency::Native("TRX".to_string()));
        assert_eq!(event.sender, USDT_ADDRESS);
        assert_eq!(event.receiver, ZERO_ADDRESS);
        assert_eq!(event.amount, event.block as u128);
    }

    wait_until(|| cursor.get() == 5, WAIT).await;

    // The head block itself waits until the head moves past it
    ledger.set_head(6);
    wait_until(|| cursor.get() == 6, WAIT).await;

    handle.stop();
    assert!(drain(&mut events).await.is_empty());
    handle.join().await.expect("watcher should stop cleanly");

    assert_eq!(*ledger.block_calls.lock().unwrap(), vec![2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_closes_stream() {
    let ledger = Arc::new(ScriptedLedger::new(0));
    let (handle, mut events) = Watcher::spawn(
        ledger.clone(),
        Arc::new(MemoryCursor::new(100)),
        accept_all(),
        mainnet(),
        fast_config(),
    );
    let state = handle.subscribe_state();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.state(), WatcherState::Idle);

    handle.stop();
    assert!(timeout(WAIT, events.recv()).await.unwrap().is_none());
    handle.join().await.unwrap();

    assert_eq!(*state.borrow(), WatcherState::Stopped);
    assert!(ledger.block_calls.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_block_is_retried_whole() {
    let ledger = Arc::new(ScriptedLedger::new(5));
    seed_native_blocks(&ledger, 2..5);
    ledger.add_block(
        3,
        vec![
            native_tx("3a", USDT_HEX, ZERO_HEX, 1),
            native_tx("3b", ZERO_HEX, USDT_HEX, 2),
        ],
    );
    ledger.fail_detail("3b", 2);
    ledger.fail_block(4, 1);

    let cursor = MemoryCursor::new(2);
    let (handle, mut events) = Watcher::spawn(
        ledger.clone(),
        Arc::new(cursor.clone()),
        accept_all(),
        mainnet(),
        fast_config(),
    );

    let received = next_events(&mut events, 4).await;
    let hashes: Vec<&str> = received.iter().map(|e| e.hash.as_str()).collect();
    assert_eq!(hashes, vec!["2a", "3a", "3b", "4a"]);

    wait_until(|| cursor.get() == 5, WAIT).await;
    handle.stop();
    assert!(drain(&mut events).await.is_empty());
    handle.join().await.unwrap();

    // 3a was looked up on every attempt at block 3 but published once
    let lookups = ledger.detail_calls.lock().unwrap();
    assert_eq!(lookups.iter().filter(|h| h.as_str() == "3a").count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cursor_never_passes_failing_block() {
    let ledger = Arc::new(ScriptedLedger::new(10));
    ledger.fail_block(3, u32::MAX);

    let cursor = MemoryCursor::new(1);
    let config = WatcherConfig {
        max_consecutive_failures: 4,
        ..fast_config()
    };
    let (handle, mut events) =
        Watcher::spawn(ledger.clone(), Arc::new(cursor.clone()), accept_all(), mainnet(), config);

    assert!(drain(&mut events).await.is_empty());
    let result = handle.join().await;

    match result {
        Err(WatcherError::RetriesExhausted { attempts, last }) => {
            assert_eq!(attempts, 4);
            assert!(matches!(*last, WatcherError::Api(_)));
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
    assert_eq!(cursor.get(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_head_failures_are_retried() {
    let ledger = Arc::new(ScriptedLedger::new(3));
    seed_native_blocks(&ledger, 2..3);
    ledger.fail_head(3);

    let cursor = MemoryCursor::new(2);
    let (handle, mut events) = Watcher::spawn(
        ledger.clone(),
        Arc::new(cursor.clone()),
        accept_all(),
        mainnet(),
        fast_config(),
    );

    let received = next_events(&mut events, 1).await;
    assert_eq!(received[0].hash, "2a");

    handle.shutdown().await.unwrap();
    assert!(drain(&mut events).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_stops_watcher() {
    let ledger = Arc::new(ScriptedLedger::new(0));
    let config = WatcherConfig {
        deadline_seconds: Some(5),
        ..fast_config()
    };
    let (handle, mut events) =
        Watcher::spawn(ledger, Arc::new(MemoryCursor::new(0)), accept_all(), mainnet(), config);

    let started = tokio::time::Instant::now();
    assert!(drain(&mut events).await.is_empty());
    handle.join().await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_stream_stops_watcher() {
    let ledger = Arc::new(ScriptedLedger::new(10));
    seed_native_blocks(&ledger, 0..10);

    let cursor = MemoryCursor::new(0);
    let (handle, events) = Watcher::spawn(
        ledger.clone(),
        Arc::new(cursor.clone()),
        accept_all(),
        mainnet(),
        fast_config(),
    );
    drop(events);

    timeout(WAIT, handle.join()).await.unwrap().unwrap();
    // The block whose event could not be delivered is not marked processed
    assert_eq!(cursor.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_unblocks_pending_send() {
    let ledger = Arc::new(ScriptedLedger::new(10));
    seed_native_blocks(&ledger, 0..10);

    let cursor = MemoryCursor::new(0);
    let (handle, mut events) = Watcher::spawn(
        ledger.clone(),
        Arc::new(cursor.clone()),
        accept_all(),
        mainnet(),
        fast_config(),
    );

    // Block 0 fills the stream, block 1 waits on a full channel
    wait_until(|| cursor.get() == 1, WAIT).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(cursor.get(), 1);

    handle.stop();
    timeout(WAIT, handle.join()).await.unwrap().unwrap();

    // The block whose send was interrupted is not marked processed
    assert_eq!(cursor.get(), 1);
    let buffered = drain(&mut events).await;
    assert_eq!(buffered.len(), 1);
    assert_eq!(buffered[0].hash, "0a");
}

#[tokio::test(start_paused = true)]
async fn test_filter_limits_published_events() {
    let ledger = Arc::new(ScriptedLedger::new(4));
    let params = mainnet();
    ledger.add_block(1, vec![native_tx("1a", ZERO_HEX, ZERO_HEX, 5)]);
    ledger.add_block(2, vec![contract_tx("2a")]);
    ledger.add_detail(
        "2a",
        receipt(
            13_000,
            ReceiptStatus::Success,
            vec![transfer_log(&params, ZERO_HEX, USDT_HEX, 1_000_000)],
        ),
    );
    ledger.add_block(3, vec![native_tx("3a", USDT_HEX, ZERO_HEX, 7)]);

    let cursor = MemoryCursor::new(1);
    let (handle, mut events) = Watcher::spawn(
        ledger.clone(),
        Arc::new(cursor.clone()),
        watch_addresses([USDT_ADDRESS]),
        params,
        fast_config(),
    );

    let received = next_events(&mut events, 2).await;
    assert_eq!(received[0].hash, "2a");
    assert_eq!(received[0].currency, Currency::Token("TRON_USDT".to_string()));
    assert_eq!(received[0].amount, 1_000_000);
    assert_eq!(received[0].fee, 13_000);
    assert_eq!(received[1].hash, "3a");

    wait_until(|| cursor.get() == 4, WAIT).await;
    handle.shutdown().await.unwrap();
    assert!(drain(&mut events).await.is_empty());

    // The rejected native transfer never reached enrichment
    assert!(!ledger.detail_calls.lock().unwrap().contains(&"1a".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_batch_cap_spreads_catch_up_over_ticks() {
    let ledger = Arc::new(ScriptedLedger::new(10));
    let cursor = MemoryCursor::new(0);
    let config = WatcherConfig {
        catch_up_batch_cap: 3,
        poll_interval_ms: 1_000,
        ..WatcherConfig::default()
    };
    let (handle, _events) =
        Watcher::spawn(ledger.clone(), Arc::new(cursor.clone()), accept_all(), mainnet(), config);

    wait_until(|| cursor.get() == 3, WAIT).await;
    assert_eq!(cursor.get(), 3);

    wait_until(|| cursor.get() == 10, WAIT).await;
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_sqlite_cursor_persists_progress() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cursor.db");

    let ledger = Arc::new(ScriptedLedger::new(8));
    let cursor = Arc::new(SqliteCursor::open(&path, "mainnet", 5).unwrap());
    let observer: Arc<dyn Cursor> = cursor.clone();

    let (handle, _events) = Watcher::spawn(ledger, cursor, accept_all(), mainnet(), fast_config());
    wait_until(|| observer.position().unwrap() == 8, WAIT).await;
    handle.shutdown().await.unwrap();

    let reopened = SqliteCursor::open(&path, "mainnet", 0).unwrap();
    assert_eq!(reopened.position().unwrap(), 8);
}

struct BrokenCursor;

impl Cursor for BrokenCursor {
    fn position(&self) -> Result<u64, CursorError> {
        Ok(0)
    }

    fn advance(&self) -> Result<(), CursorError> {
        Err(CursorError::Lock("disk gone".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_cursor_failure_is_fatal() {
    let ledger: Arc<dyn LedgerApi> = Arc::new(ScriptedLedger::new(3));
    let (handle, mut events) = Watcher::spawn(ledger, Arc::new(BrokenCursor), accept_all(), mainnet(), fast_config());

    assert!(drain(&mut events).await.is_empty());
    assert!(matches!(handle.join().await, Err(WatcherError::Cursor(CursorError::Lock(_)))));
}
