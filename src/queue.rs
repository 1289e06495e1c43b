//! Deadline-ordered timer queue with lazy deletion
//!
//! Uses std::collections::BinaryHeap with a HashMap keyed by timer id.
//! The HashMap is the source of truth; removal and re-insertion leave
//! stale keys in the heap that are discarded on peek/pop. The queue is
//! always ascending by deadline, with equal deadlines kept stable in
//! insertion order via a per-queue sequence counter.

use crate::timer::TimerHandle;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

/// Key for the heap. Uses (deadline, seq, id) for stable ordering.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Key {
    deadline: Instant,
    seq: u64,
    id: u64,
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap is a max-heap, so the ordering is reversed for min-heap
// behavior.
impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.deadline.cmp(&other.deadline) {
            Ordering::Equal => match self.seq.cmp(&other.seq) {
                Ordering::Equal => self.id.cmp(&other.id),
                o => o,
            },
            o => o,
        }
        .reverse()
    }
}

/// The set of live timers, ordered ascending by deadline.
pub(crate) struct DeadlineQueue {
    heap: BinaryHeap<Key>,
    live: HashMap<u64, (Instant, u64, TimerHandle)>, // id -> (deadline, seq, handle)
    next_seq: u64,
}

impl DeadlineQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Insert a timer at its current deadline (the caller arms it first).
    /// Inserting a timer that is already live replaces its entry at the
    /// new deadline; the old heap key becomes stale.
    pub(crate) fn insert(&mut self, timer: TimerHandle) {
        let deadline = timer.deadline();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Key {
            deadline,
            seq,
            id: timer.id(),
        });
        self.live.insert(timer.id(), (deadline, seq, timer));
    }

    /// Remove a timer by id. Returns the handle if it was live; an absent
    /// id (already fired, already removed) is a no-op returning None.
    pub(crate) fn remove(&mut self, id: u64) -> Option<TimerHandle> {
        self.live.remove(&id).map(|(_, _, t)| t)
    }

    /// Identity-based membership test: is this timer still scheduled.
    pub(crate) fn contains(&self, id: u64) -> bool {
        self.live.contains_key(&id)
    }

    /// Peek the earliest deadline without removing. None if empty.
    pub(crate) fn peek_deadline(&mut self) -> Option<Instant> {
        self.clean_top();
        self.heap.peek().map(|k| k.deadline)
    }

    /// Pop the timer with the earliest deadline. None if empty.
    pub(crate) fn pop(&mut self) -> Option<TimerHandle> {
        loop {
            let k = self.heap.pop()?;
            let current = match self.live.get(&k.id) {
                Some((deadline, seq, _)) => *deadline == k.deadline && *seq == k.seq,
                None => false,
            };
            if !current {
                continue; // stale entry
            }
            return self.live.remove(&k.id).map(|(_, _, t)| t);
        }
    }

    /// Remove stale entries from the top of the heap.
    fn clean_top(&mut self) {
        while let Some(k) = self.heap.peek() {
            let current = match self.live.get(&k.id) {
                Some((deadline, seq, _)) => *deadline == k.deadline && *seq == k.seq,
                None => false,
            };
            if current {
                break;
            }
            self.heap.pop();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
