//! Timer heap for deadline management.
//!
//! A small min-heap of `(deadline, key)` pairs. Cancellation is lazy:
//! the scheduler drops a cancelled key's job and simply skips the stale
//! heap entry when it surfaces.

use crate::types::Time;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Identifies a scheduled timer so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey(pub(crate) u64);

#[derive(Debug, Clone, Eq, PartialEq)]
struct TimerEntry {
    deadline: Time,
    seq: u64,
    key: TimerKey,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first).
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of timers ordered by deadline.
#[derive(Debug, Default)]
pub(crate) struct TimerHeap {
    heap: BinaryHeap<TimerEntry>,
    next_seq: u64,
}

impl TimerHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Adds a timer with the given deadline.
    pub fn insert(&mut self, key: TimerKey, deadline: Time) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(TimerEntry { deadline, seq, key });
    }

    /// Returns the earliest entry, if any.
    ///
    /// May report an entry whose key was already cancelled; callers
    /// resolve liveness against their own job table and discard stale
    /// entries with [`pop`](Self::pop).
    pub fn peek(&self) -> Option<(TimerKey, Time)> {
        self.heap.peek().map(|e| (e.key, e.deadline))
    }

    /// Removes and returns the earliest entry, if any.
    pub fn pop(&mut self) -> Option<(TimerKey, Time)> {
        self.heap.pop().map(|e| (e.key, e.deadline))
    }

    /// Pops all keys whose deadline is `<= now`, in deadline order.
    pub fn pop_due(&mut self, now: Time) -> Vec<TimerKey> {
        let mut due = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                due.push(entry.key);
            }
        }
        due
    }
}
