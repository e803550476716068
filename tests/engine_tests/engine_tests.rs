//! Engine Tests
//!
//! Tests verify:
//! - Command routing and response tokens
//! - Role enforcement on primary and backup
//! - Replicated messages applied once per sequence
//! - Log replay across reopen
//! - Log dumps from the peer
//! - Concurrent writers

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use lazykv::config::{Config, Role};
use lazykv::protocol::{Command, Response, Sequence};
use lazykv::wal::{LogRecord, LogRecovery};
use lazykv::Engine;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("data.log");
    (temp_dir, log_path)
}

fn open_primary(path: &PathBuf) -> Engine {
    Engine::open_path(path).unwrap()
}

fn open_backup(path: &PathBuf) -> Engine {
    let config = Config::builder()
        .data_file(path)
        .role(Role::Backup { primary_addr: None })
        .build();
    Engine::open(config).unwrap()
}

fn insert(key: i32, value: i32) -> Command {
    Command::Insert { key, value }
}

fn replicated_insert(key: i32, value: i32, seq: u64) -> Command {
    Command::ReplicatedInsert {
        key,
        value,
        sequence: Some(Sequence { session: 1, seq }),
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_insert_get_delete() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_primary(&path);

    assert_eq!(engine.execute(insert(7, 42)).unwrap(), Response::Ok);
    assert_eq!(engine.execute(Command::Get { key: 7 }).unwrap(), Response::Value(42));
    assert_eq!(engine.execute(Command::Delete { key: 7 }).unwrap(), Response::Ok);
    assert_eq!(engine.execute(Command::Get { key: 7 }).unwrap(), Response::ErrKey);
}

#[test]
fn test_duplicate_insert_is_err_key() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_primary(&path);

    engine.execute(insert(1, 10)).unwrap();

    assert_eq!(engine.execute(insert(1, 20)).unwrap(), Response::ErrKey);
    assert_eq!(engine.get(1), Response::Value(10));
}

#[test]
fn test_delete_missing_is_err_key() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_primary(&path);

    assert_eq!(engine.execute(Command::Delete { key: 3 }).unwrap(), Response::ErrKey);
}

#[test]
fn test_only_effective_mutations_are_logged() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_primary(&path);

    engine.execute(insert(1, 10)).unwrap();
    engine.execute(insert(1, 11)).unwrap();
    engine.execute(Command::Delete { key: 2 }).unwrap();
    engine.execute(Command::Get { key: 1 }).unwrap();

    assert_eq!(engine.records_written(), 1);
    let (records, _) = LogRecovery::decode(&engine.log_contents().unwrap());
    assert_eq!(records, vec![LogRecord::Insert { key: 1, value: 10 }]);
}

// =============================================================================
// Role Tests
// =============================================================================

#[test]
fn test_backup_rejects_client_writes() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_backup(&path);

    assert_eq!(engine.execute(insert(1, 10)).unwrap(), Response::Invalid);
    assert_eq!(engine.execute(Command::Delete { key: 1 }).unwrap(), Response::Invalid);
    assert!(engine.is_empty());
    assert_eq!(engine.records_written(), 0);
}

#[test]
fn test_backup_serves_reads_and_replication() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_backup(&path);

    assert_eq!(engine.execute(Command::Get { key: 5 }).unwrap(), Response::ErrKey);
    assert_eq!(engine.execute(replicated_insert(5, 50, 1)).unwrap(), Response::Ok);
    assert_eq!(engine.execute(Command::Get { key: 5 }).unwrap(), Response::Value(50));

    let delete = Command::ReplicatedDelete {
        key: 5,
        sequence: Some(Sequence { session: 1, seq: 2 }),
    };
    assert_eq!(engine.execute(delete).unwrap(), Response::Ok);
    assert_eq!(engine.get(5), Response::ErrKey);
    assert_eq!(engine.records_written(), 2);
}

#[test]
fn test_primary_refuses_replicated_writes() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_primary(&path);

    assert_eq!(engine.execute(replicated_insert(1, 1, 1)).unwrap(), Response::Invalid);
    let delete = Command::ReplicatedDelete { key: 1, sequence: None };
    assert_eq!(engine.execute(delete).unwrap(), Response::Invalid);
    assert!(engine.is_empty());
}

// =============================================================================
// Replication Sequence Tests
// =============================================================================

#[test]
fn test_duplicate_sequence_skipped() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_backup(&path);

    engine.execute(replicated_insert(1, 10, 1)).unwrap();
    engine
        .execute(Command::ReplicatedDelete {
            key: 1,
            sequence: Some(Sequence { session: 1, seq: 2 }),
        })
        .unwrap();

    // A retried insert must not resurrect the key
    assert_eq!(engine.execute(replicated_insert(1, 10, 1)).unwrap(), Response::Ok);
    assert_eq!(engine.get(1), Response::ErrKey);
    assert_eq!(engine.records_written(), 2);
    assert_eq!(engine.last_replicated(), Some(Sequence { session: 1, seq: 2 }));
}

#[test]
fn test_duplicate_of_refused_message_is_acknowledged() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_backup(&path);

    assert_eq!(engine.execute(replicated_insert(1, 10, 1)).unwrap(), Response::Ok);
    assert_eq!(engine.execute(replicated_insert(1, 20, 2)).unwrap(), Response::ErrKey);

    // The resend is acknowledged, not re-evaluated
    assert_eq!(engine.execute(replicated_insert(1, 20, 2)).unwrap(), Response::Ok);
    assert_eq!(engine.get(1), Response::Value(10));
    assert_eq!(engine.records_written(), 1);
    assert_eq!(engine.last_replicated(), Some(Sequence { session: 1, seq: 2 }));
}

#[test]
fn test_new_session_resets_cursor() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_backup(&path);

    engine.execute(replicated_insert(1, 10, 50)).unwrap();
    let next_session = Command::ReplicatedInsert {
        key: 2,
        value: 20,
        sequence: Some(Sequence { session: 2, seq: 1 }),
    };

    assert_eq!(engine.execute(next_session).unwrap(), Response::Ok);
    assert_eq!(engine.get(2), Response::Value(20));
}

#[test]
fn test_unsequenced_replication_always_applies() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_backup(&path);

    let plain = Command::ReplicatedInsert { key: 4, value: 40, sequence: None };
    assert_eq!(engine.execute(plain.clone()).unwrap(), Response::Ok);
    assert_eq!(engine.execute(plain).unwrap(), Response::ErrKey);
    assert_eq!(engine.last_replicated(), None);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_reopen_replays_log() {
    let (_temp, path) = setup_temp_dir();

    {
        let engine = open_primary(&path);
        engine.execute(insert(1, 100)).unwrap();
        engine.execute(insert(2, 200)).unwrap();
        engine.execute(Command::Delete { key: 1 }).unwrap();
        engine.close().unwrap();
    }

    let engine = open_primary(&path);

    assert_eq!(engine.recovery().records_recovered, 3);
    assert_eq!(engine.entries(), vec![(2, 200)]);
    assert_eq!(engine.get(1), Response::ErrKey);
}

#[test]
fn test_reopen_then_write_appends() {
    let (_temp, path) = setup_temp_dir();

    {
        let engine = open_primary(&path);
        engine.execute(insert(1, 1)).unwrap();
    }
    {
        let engine = open_primary(&path);
        engine.execute(insert(2, 2)).unwrap();
    }

    let engine = open_primary(&path);
    assert_eq!(engine.entries(), vec![(1, 1), (2, 2)]);
}

#[test]
fn test_open_creates_parent_directory() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("dir").join("data.log");

    let engine = Engine::open_path(&path).unwrap();
    engine.execute(insert(1, 1)).unwrap();

    assert!(path.exists());
}

// =============================================================================
// Log Dump Tests
// =============================================================================

#[test]
fn test_log_dump_applies_and_logs() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_backup(&path);

    let dump: Vec<u8> = [
        LogRecord::Insert { key: 1, value: 10 },
        LogRecord::Insert { key: 2, value: 20 },
        LogRecord::Delete { key: 1 },
    ]
    .iter()
    .flat_map(|r| r.encode())
    .collect();

    let response = engine.execute(Command::LogDump { bytes: dump }).unwrap();

    assert_eq!(response, Response::Ok);
    assert_eq!(engine.entries(), vec![(2, 20)]);
    assert_eq!(engine.records_written(), 3);
}

#[test]
fn test_log_dump_on_top_of_existing_state() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_primary(&path);
    engine.execute(insert(1, 99)).unwrap();

    let dump: Vec<u8> = [
        LogRecord::Insert { key: 1, value: 10 },
        LogRecord::Insert { key: 3, value: 30 },
    ]
    .iter()
    .flat_map(|r| r.encode())
    .collect();

    let result = engine.apply_log_dump(&dump).unwrap();

    assert_eq!(result.records_recovered, 2);
    // Existing key keeps its value; only key 3 took effect and was logged
    assert_eq!(engine.entries(), vec![(1, 99), (3, 30)]);
    assert_eq!(engine.records_written(), 2);
}

#[test]
fn test_log_dump_skips_corrupt_stride() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_primary(&path);

    let mut dump = vec![0xEE; 16];
    dump.extend_from_slice(&LogRecord::Insert { key: 8, value: 80 }.encode());

    let result = engine.apply_log_dump(&dump).unwrap();

    assert_eq!(result.records_corrupted, 1);
    assert_eq!(engine.get(8), Response::Value(80));
}

#[test]
fn test_sync_with_peer_without_peer_is_noop() {
    let (_temp, path) = setup_temp_dir();
    let engine = open_primary(&path);
    engine.execute(insert(1, 1)).unwrap();

    engine.sync_with_peer().unwrap();

    assert!(engine.gateway().is_none());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_log_matches_state() {
    let (_temp, path) = setup_temp_dir();
    let engine = Arc::new(open_primary(&path));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for round in 0..200 {
                    let key = round % 20;
                    if (round + t) % 3 == 0 {
                        engine.execute(Command::Delete { key }).unwrap();
                    } else {
                        engine.execute(insert(key, key * 10)).unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // Replaying the log must reproduce the live state exactly
    let live = engine.entries();
    drop(engine);

    let reopened = open_primary(&path);
    assert_eq!(reopened.entries(), live);
}
