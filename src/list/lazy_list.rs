//! Lazy list implementation
//!
//! Sorted singly-linked list bounded by two permanent sentinels, with
//! optimistic traversal, lock coupling and validate-then-mutate updates.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use parking_lot::Mutex;

use super::NodeState;

/// Head sentinel key, below every `i32`
const HEAD_KEY: i64 = i64::MIN;

/// Tail sentinel key, above every `i32`
const TAIL_KEY: i64 = i64::MAX;

/// A single mapping in the list
///
/// `next` and `state` are only written while `lock` is held; readers may
/// load them at any time.
struct Node {
    key: i64,
    value: i32,
    next: Atomic<Node>,
    state: AtomicU8,
    lock: Mutex<()>,
}

impl Node {
    fn new(key: i64, value: i32, next: Atomic<Node>) -> Self {
        Self {
            key,
            value,
            next,
            state: AtomicU8::new(NodeState::Live as u8),
            lock: Mutex::new(()),
        }
    }

    fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn is_live(&self) -> bool {
        self.state() == NodeState::Live
    }

    fn mark_deleted(&self) {
        self.state
            .store(NodeState::LogicallyDeleted as u8, Ordering::Release);
    }
}

/// Concurrent ordered set of `i32 -> i32` mappings
///
/// ## Concurrency:
/// - `find`: no locks, follows links from the head
/// - `insert`/`delete`: unlocked scan to `pred`/`curr`, then lock `pred`
///   and `curr` (in that order), validate, mutate, unlock in reverse order
/// - Validation fails when either node was deleted or `pred.next` moved;
///   the whole operation then restarts from the head
/// - All methods use `&self`
pub struct LazyList {
    /// Head sentinel; never removed
    head: Atomic<Node>,
}

impl LazyList {
    /// Create an empty list (head and tail sentinels only)
    pub fn new() -> Self {
        let tail = Atomic::new(Node::new(TAIL_KEY, 0, Atomic::null()));
        let head = Atomic::new(Node::new(HEAD_KEY, 0, tail));
        Self { head }
    }

    /// Look up a key without taking any locks
    ///
    /// Returns the value if a live node with this key is reachable.
    pub fn find(&self, key: i32) -> Option<i32> {
        let key = i64::from(key);
        let guard = &epoch::pin();

        // SAFETY: the head is never null and every node before the tail has a
        // non-null `next`. The tail key exceeds every `i32`, so the loop never
        // follows the tail's null link. Nodes stay allocated while pinned.
        let mut curr = unsafe { self.head.load(Ordering::Acquire, guard).deref() };
        while curr.key < key {
            curr = unsafe { curr.next.load(Ordering::Acquire, guard).deref() };
        }

        (curr.key == key && curr.is_live()).then_some(curr.value)
    }

    /// Insert a mapping if the key is absent
    ///
    /// Returns `false` (leaving the existing value untouched) when the key is
    /// already present.
    pub fn insert(&self, key: i32, value: i32) -> bool {
        match self.insert_with(key, value, || Ok::<(), Infallible>(())) {
            Ok(inserted) => inserted,
            Err(never) => match never {},
        }
    }

    /// Insert a mapping, running `commit` once the insert is known to succeed
    ///
    /// `commit` runs with both node locks held, after validation and before
    /// the new node is linked. If it fails, the list is unchanged and the
    /// error is returned.
    pub fn insert_with<E, F>(&self, key: i32, value: i32, commit: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        let key = i64::from(key);
        let guard = &epoch::pin();

        loop {
            let (pred, curr) = Self::locate(&self.head, key, guard);
            // SAFETY: `locate` only returns non-null pointers, protected by `guard`.
            let (pred_ref, curr_ref) = unsafe { (pred.deref(), curr.deref()) };

            let _pred_lock = pred_ref.lock.lock();
            let _curr_lock = curr_ref.lock.lock();

            if !Self::validate(pred_ref, curr, guard) {
                continue;
            }

            if curr_ref.key == key {
                return Ok(false);
            }

            commit()?;

            let node = Owned::new(Node::new(key, value, Atomic::from(curr)));
            pred_ref.next.store(node, Ordering::Release);
            return Ok(true);
        }
    }

    /// Remove a key
    ///
    /// Returns `true` only if a live node with this key was removed.
    pub fn delete(&self, key: i32) -> bool {
        match self.delete_with(key, || Ok::<(), Infallible>(())) {
            Ok(deleted) => deleted,
            Err(never) => match never {},
        }
    }

    /// Remove a key, running `commit` once the delete is known to succeed
    ///
    /// Same hook contract as [`LazyList::insert_with`]: runs under both
    /// locks, before the node is marked; on failure nothing changes.
    pub fn delete_with<E, F>(&self, key: i32, commit: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        let key = i64::from(key);
        let guard = &epoch::pin();

        loop {
            let (pred, curr) = Self::locate(&self.head, key, guard);
            // SAFETY: `locate` only returns non-null pointers, protected by `guard`.
            let (pred_ref, curr_ref) = unsafe { (pred.deref(), curr.deref()) };

            let _pred_lock = pred_ref.lock.lock();
            let _curr_lock = curr_ref.lock.lock();

            if !Self::validate(pred_ref, curr, guard) {
                continue;
            }

            if curr_ref.key != key {
                return Ok(false);
            }

            commit()?;

            // Logical removal first, then unlink.
            curr_ref.mark_deleted();
            let succ = curr_ref.next.load(Ordering::Acquire, guard);
            pred_ref.next.store(succ, Ordering::Release);

            // SAFETY: `curr` is no longer reachable from the head. Threads
            // that reached it earlier are pinned, so destruction waits for them.
            unsafe { guard.defer_destroy(curr) };
            return Ok(true);
        }
    }

    /// Number of live mappings
    ///
    /// Advisory: the count can be stale if mutations run concurrently.
    pub fn size(&self) -> usize {
        let mut count = 0;
        self.for_each_live(|_, _| count += 1);
        count
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Live mappings in ascending key order (advisory snapshot)
    pub fn entries(&self) -> Vec<(i32, i32)> {
        let mut entries = Vec::new();
        self.for_each_live(|key, value| entries.push((key, value)));
        entries
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Unlocked scan for adjacent `pred`/`curr` with `pred.key < key <= curr.key`
    fn locate<'g>(
        head: &Atomic<Node>,
        key: i64,
        guard: &'g Guard,
    ) -> (Shared<'g, Node>, Shared<'g, Node>) {
        let mut pred = head.load(Ordering::Acquire, guard);
        // SAFETY: same traversal argument as `find`; `key` is always inside
        // the sentinel range, so the scan stops at or before the tail.
        let mut curr = unsafe { pred.deref() }.next.load(Ordering::Acquire, guard);
        while unsafe { curr.deref() }.key < key {
            pred = curr;
            curr = unsafe { curr.deref() }.next.load(Ordering::Acquire, guard);
        }
        (pred, curr)
    }

    /// Both nodes live and still adjacent; caller holds both locks
    fn validate(pred: &Node, curr: Shared<'_, Node>, guard: &Guard) -> bool {
        // SAFETY: `curr` came from `locate` under the same guard.
        let curr_ref = unsafe { curr.deref() };
        pred.is_live() && curr_ref.is_live() && pred.next.load(Ordering::Acquire, guard) == curr
    }

    fn for_each_live(&self, mut f: impl FnMut(i32, i32)) {
        let guard = &epoch::pin();

        // SAFETY: see `find`.
        let head = unsafe { self.head.load(Ordering::Acquire, guard).deref() };
        let mut curr = unsafe { head.next.load(Ordering::Acquire, guard).deref() };
        while curr.key != TAIL_KEY {
            if curr.is_live() {
                // Non-sentinel keys always originate from an `i32`.
                f(curr.key as i32, curr.value);
            }
            curr = unsafe { curr.next.load(Ordering::Acquire, guard).deref() };
        }
    }
}

impl Default for LazyList {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LazyList {
    fn drop(&mut self) {
        // SAFETY: `&mut self` guarantees no traversal is in flight. Unlinked
        // nodes were handed to the epoch collector and are not reachable here.
        unsafe {
            let guard = epoch::unprotected();
            let mut curr = self.head.load(Ordering::Relaxed, guard);
            while !curr.is_null() {
                let next = curr.deref().next.load(Ordering::Relaxed, guard);
                drop(curr.into_owned());
                curr = next;
            }
        }
    }
}
