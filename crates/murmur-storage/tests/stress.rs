//! Stress tests for murmur-storage
//!
//! These tests verify storage behavior under high load, capacity limits,
//! repeated crashes, and concurrent readers.

use std::sync::Arc;
use std::time::Instant;

use futures::TryStreamExt;
use murmur_core::{Message, SenderId, Timestamp};
use murmur_storage::{
    DirectoryEvent, DirectoryJournal, MessageLog, MessageLogConfig, RingStore, SessionDirectory,
};
use tempfile::TempDir;
use tokio_test::assert_ok;

fn message(sender: u64, i: i64) -> Message {
    Message::new(
        SenderId(sender),
        Timestamp::from_micros(i),
        format!("message {} from {}", i, sender),
    )
}

async fn replay_all(log: &MessageLog) -> Vec<Message> {
    log.replay().try_collect().await.unwrap()
}

// ============================================================================
// Throughput Tests
// ============================================================================

/// Append 2,000 fsync'd messages and replay them all
#[tokio::test]
async fn test_message_log_throughput() {
    let temp = TempDir::new().unwrap();
    let mut log = MessageLog::open(MessageLogConfig::new(temp.path().join("messages.log")))
        .await
        .unwrap();
    let count: i64 = 2_000;

    let start = Instant::now();
    for i in 0..count {
        log.append(&message(1, i))
            .await
            .expect("Failed to append message");
    }
    let duration = start.elapsed();
    println!(
        "Appended {} messages in {:?} ({:.2} msgs/sec)",
        count,
        duration,
        count as f64 / duration.as_secs_f64()
    );

    let replayed = replay_all(&log).await;
    assert_eq!(replayed.len(), count as usize);
    for (i, msg) in replayed.iter().enumerate() {
        assert_eq!(msg.timestamp, Timestamp::from_micros(i as i64));
    }
}

/// Ring store under sustained overflow
#[test]
fn test_ring_store_sustained_eviction() {
    let mut ring = RingStore::new(100);
    let mut evicted = Vec::new();

    for i in 0..10_000 {
        if let Some(old) = ring.insert(message(1, i)) {
            evicted.push(old.timestamp.as_micros());
        }
    }

    assert_eq!(ring.len(), 100);
    assert_eq!(evicted.len(), 9_900);
    // Evictions come out strictly oldest first
    assert!(evicted.windows(2).all(|w| w[0] + 1 == w[1]));
    assert_eq!(
        ring.oldest().map(|m| m.timestamp),
        Some(Timestamp::from_micros(9_900))
    );
}

// ============================================================================
// Crash Recovery Tests
// ============================================================================

/// Crash after every append, at a random point in the next frame
#[tokio::test]
async fn test_repeated_torn_writes() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("messages.log");
    let mut expected = Vec::new();

    for round in 0..20i64 {
        let mut log = MessageLog::open(MessageLogConfig::new(&path)).await.unwrap();
        let msg = message(2, round);
        log.append(&msg).await.unwrap();
        expected.push(msg);
        drop(log);

        // Garbage that looks like the start of another frame
        let mut raw = std::fs::read(&path).unwrap();
        let junk_len = (round as usize % 11) + 1;
        raw.extend(std::iter::repeat_n(0xA5u8, junk_len));
        std::fs::write(&path, raw).unwrap();
    }

    let log = MessageLog::open(MessageLogConfig::new(&path)).await.unwrap();
    assert_eq!(replay_all(&log).await, expected);
}

/// Truncating inside the file header wipes nothing that was committed
#[tokio::test]
async fn test_header_only_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("messages.log");
    drop(assert_ok!(MessageLog::open(MessageLogConfig::new(&path)).await));

    let log = assert_ok!(MessageLog::open(MessageLogConfig::new(&path)).await);
    assert_eq!(log.record_count(), 0);
    assert!(replay_all(&log).await.is_empty());
}

// ============================================================================
// Concurrent Access Tests
// ============================================================================

/// Several replays run while the writer keeps appending
#[tokio::test]
async fn test_concurrent_replays_see_prefixes() {
    let temp = TempDir::new().unwrap();
    let mut log = MessageLog::open(MessageLogConfig::new(temp.path().join("messages.log")))
        .await
        .unwrap();
    for i in 0..100 {
        log.append(&message(1, i)).await.unwrap();
    }

    let mut handles = vec![];
    for _ in 0..8 {
        let stream = log.replay();
        handles.push(tokio::spawn(async move {
            let messages: Vec<Message> = stream.try_collect().await.unwrap();
            messages
        }));
    }

    for i in 100..200 {
        log.append(&message(1, i)).await.unwrap();
    }

    for handle in handles {
        let messages = handle.await.expect("Task panicked");
        assert!(messages.len() >= 100);
        // Every replay is an in-order prefix of the log
        for (i, msg) in messages.iter().enumerate() {
            assert_eq!(msg.timestamp, Timestamp::from_micros(i as i64));
        }
    }
}

/// Readers share a directory snapshot while it is rebuilt elsewhere
#[tokio::test]
async fn test_shared_directory_snapshot() {
    let temp = TempDir::new().unwrap();
    let mut journal = DirectoryJournal::open(temp.path().join("senders.log"), true)
        .await
        .unwrap();
    let mut dir = SessionDirectory::new(10);
    for i in 0..10 {
        let event = dir
            .prepare_registration(&format!("user{}", i), Timestamp::EPOCH)
            .unwrap();
        journal.append(&event).await.unwrap();
        dir.apply(&event);
    }

    let shared = Arc::new(dir);
    let mut handles = vec![];
    for i in 1..=10u64 {
        let dir = Arc::clone(&shared);
        handles.push(tokio::spawn(async move {
            dir.lookup(SenderId(i)).map(|s| s.display_name.clone())
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), Some(format!("user{}", i)));
    }

    journal
        .append(&DirectoryEvent::Deactivated { id: SenderId(1) })
        .await
        .unwrap();
    let reloaded = journal.load(10).await.unwrap();
    assert_eq!(reloaded.active_count(), 9);
    // The shared snapshot is unaffected
    assert_eq!(shared.active_count(), 10);
}

// ============================================================================
// Compaction Tests
// ============================================================================

/// Compact repeatedly while appending
#[tokio::test]
async fn test_compaction_cycles() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("messages.log");
    let mut log = MessageLog::open(MessageLogConfig::new(&path)).await.unwrap();

    let mut next = 0i64;
    for _ in 0..5 {
        for _ in 0..50 {
            log.append(&message(1, next)).await.unwrap();
            next += 1;
        }
        let cutoff = Timestamp::from_micros(next - 10);
        let result = log.compact(|m| m.timestamp >= cutoff).await.unwrap();
        assert_eq!(result.records_retained, 10);
    }

    drop(log);
    let log = MessageLog::open(MessageLogConfig::new(&path)).await.unwrap();
    let replayed = replay_all(&log).await;
    assert_eq!(replayed.len(), 10);
    assert_eq!(replayed[0].timestamp, Timestamp::from_micros(next - 10));
}
