//! LazyList Tests
//!
//! Tests verify:
//! - Basic insert/find/delete
//! - Duplicate inserts keep the first value
//! - Delete-then-find and delete of absent keys
//! - Boundary keys next to the sentinels
//! - Commit hooks (success and failure)
//! - Concurrent access patterns keep the list ordered

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use lazykv::LazyList;

fn assert_strictly_ascending(list: &LazyList) {
    let entries = list.entries();
    for pair in entries.windows(2) {
        assert!(
            pair[0].0 < pair[1].0,
            "keys out of order or duplicated: {:?} then {:?}",
            pair[0],
            pair[1]
        );
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_list_is_empty() {
    let list = LazyList::new();
    assert_eq!(list.size(), 0);
    assert!(list.is_empty());
    assert!(list.entries().is_empty());
}

#[test]
fn test_insert_and_find() {
    let list = LazyList::new();

    assert!(list.insert(7, 42));

    assert_eq!(list.find(7), Some(42));
    assert_eq!(list.size(), 1);
}

#[test]
fn test_find_nonexistent_key() {
    let list = LazyList::new();
    list.insert(1, 10);
    list.insert(3, 30);

    assert_eq!(list.find(2), None);
    assert_eq!(list.find(0), None);
    assert_eq!(list.find(4), None);
}

#[test]
fn test_entries_are_sorted() {
    let list = LazyList::new();
    for key in [5, -3, 12, 0, 7, -20, 1] {
        assert!(list.insert(key, key * 10));
    }

    assert_eq!(
        list.entries(),
        vec![(-20, -200), (-3, -30), (0, 0), (1, 10), (5, 50), (7, 70), (12, 120)]
    );
}

#[test]
fn test_duplicate_insert_keeps_original_value() {
    let list = LazyList::new();

    assert!(list.insert(5, 100));
    assert!(!list.insert(5, 200));

    assert_eq!(list.find(5), Some(100));
    assert_eq!(list.size(), 1);
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_then_find() {
    let list = LazyList::new();
    list.insert(1, 10);
    list.insert(2, 20);

    assert!(list.delete(1));

    assert_eq!(list.find(1), None);
    assert_eq!(list.find(2), Some(20));
    assert_eq!(list.size(), 1);
}

#[test]
fn test_delete_absent_key_leaves_list_unchanged() {
    let list = LazyList::new();
    list.insert(1, 10);
    list.insert(3, 30);
    let before = list.entries();

    assert!(!list.delete(2));
    assert!(!list.delete(100));

    assert_eq!(list.entries(), before);
}

#[test]
fn test_delete_twice() {
    let list = LazyList::new();
    list.insert(9, 90);

    assert!(list.delete(9));
    assert!(!list.delete(9));
}

#[test]
fn test_reinsert_after_delete() {
    let list = LazyList::new();
    list.insert(4, 1);
    list.delete(4);

    assert!(list.insert(4, 2));
    assert_eq!(list.find(4), Some(2));
}

// =============================================================================
// Boundary Tests
// =============================================================================

#[test]
fn test_extreme_keys_are_ordinary_keys() {
    let list = LazyList::new();

    assert!(list.insert(i32::MIN, -1));
    assert!(list.insert(i32::MAX, 1));
    assert!(list.insert(0, 0));

    assert_eq!(list.find(i32::MIN), Some(-1));
    assert_eq!(list.find(i32::MAX), Some(1));
    assert_eq!(list.entries().first(), Some(&(i32::MIN, -1)));
    assert_eq!(list.entries().last(), Some(&(i32::MAX, 1)));

    assert!(list.delete(i32::MAX));
    assert!(list.delete(i32::MIN));
    assert_eq!(list.entries(), vec![(0, 0)]);
}

// =============================================================================
// Commit Hook Tests
// =============================================================================

#[test]
fn test_insert_hook_runs_only_on_success() {
    let list = LazyList::new();
    let calls = AtomicUsize::new(0);

    let inserted = list
        .insert_with(1, 10, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        })
        .unwrap();
    assert!(inserted);

    let inserted = list
        .insert_with(1, 20, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        })
        .unwrap();
    assert!(!inserted);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_insert_hook_leaves_list_unchanged() {
    let list = LazyList::new();

    let result = list.insert_with(3, 30, || Err("disk full"));

    assert_eq!(result, Err("disk full"));
    assert_eq!(list.find(3), None);
    assert!(list.is_empty());
}

#[test]
fn test_failed_delete_hook_keeps_key() {
    let list = LazyList::new();
    list.insert(3, 30);

    let result = list.delete_with(3, || Err("disk full"));

    assert_eq!(result, Err("disk full"));
    assert_eq!(list.find(3), Some(30));
}

#[test]
fn test_delete_hook_not_called_for_absent_key() {
    let list = LazyList::new();

    let result = list.delete_with(3, || -> Result<(), &str> { panic!("hook must not run") });

    assert_eq!(result, Ok(false));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_disjoint_inserts() {
    let list = Arc::new(LazyList::new());
    for key in [-1_000, 1_000_000] {
        list.insert(key, 0);
    }

    let threads = 8;
    let per_thread = 200;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let list = Arc::clone(&list);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // Interleave key ranges so neighbouring nodes belong to other threads
                for i in 0..per_thread {
                    let key = (i * threads + t) as i32;
                    assert!(list.insert(key, key * 2));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(list.size(), threads * per_thread + 2);
    assert_strictly_ascending(&list);
    for key in 0..(threads * per_thread) as i32 {
        assert_eq!(list.find(key), Some(key * 2));
    }
}

#[test]
fn test_concurrent_duplicate_inserts_single_winner() {
    let list = Arc::new(LazyList::new());
    let winners = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let list = Arc::clone(&list);
            let winners = Arc::clone(&winners);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for key in 0..100 {
                    if list.insert(key, t) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(winners.load(Ordering::SeqCst), 100);
    assert_eq!(list.size(), 100);
    assert_strictly_ascending(&list);
}

#[test]
fn test_concurrent_insert_delete_same_keys() {
    let list = Arc::new(LazyList::new());
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|t| {
            let list = Arc::clone(&list);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..2_000 {
                    let key = ((round * 7 + t * 13) % 64) as i32;
                    if (round + t) % 2 == 0 {
                        list.insert(key, key);
                    } else {
                        list.delete(key);
                    }
                    // Readers never see a value that was not written for the key
                    if let Some(value) = list.find(key) {
                        assert_eq!(value, key);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_strictly_ascending(&list);
    for (key, value) in list.entries() {
        assert_eq!(key, value);
        assert!((0..64).contains(&key));
    }
}

#[test]
fn test_concurrent_successful_ops_match_final_state() {
    // Each thread owns a key range; every successful op is tracked so the
    // final list can be compared against a sequential model.
    let list = Arc::new(LazyList::new());
    let threads = 4;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                let mut model = BTreeMap::new();
                for round in 0..500 {
                    let key = t * 1_000 + (round % 50);
                    if round % 3 == 2 {
                        if list.delete(key) {
                            assert!(model.remove(&key).is_some());
                        } else {
                            assert!(!model.contains_key(&key));
                        }
                    } else if list.insert(key, round) {
                        assert!(model.insert(key, round).is_none());
                    } else {
                        assert!(model.contains_key(&key));
                    }
                }
                model
            })
        })
        .collect();

    let mut expected = BTreeMap::new();
    for handle in handles {
        expected.extend(handle.join().unwrap());
    }

    let expected: Vec<(i32, i32)> = expected.into_iter().collect();
    assert_eq!(list.entries(), expected);
}

#[test]
fn test_readers_during_deletes() {
    let list = Arc::new(LazyList::new());
    for key in 0..1_000 {
        list.insert(key, key);
    }

    let writer = {
        let list = Arc::clone(&list);
        thread::spawn(move || {
            for key in 0..1_000 {
                assert!(list.delete(key));
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                for _ in 0..5 {
                    for key in 0..1_000 {
                        if let Some(value) = list.find(key) {
                            assert_eq!(value, key);
                        }
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(list.is_empty());
}
