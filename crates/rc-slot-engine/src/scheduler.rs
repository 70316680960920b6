//! Virtual-clock task scheduler
//!
//! Replaces timer callbacks with explicit tasks. Each task has a handle that
//! can be cancelled; due tasks pop in (due time, insertion) order.

use std::collections::BTreeMap;

/// Handle to a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

/// Deterministic scheduler over a millisecond virtual clock
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    now_ms: u64,
    next_seq: u64,
    queue: BTreeMap<(u64, u64), T>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_seq: 0,
            queue: BTreeMap::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Schedule `task` to run `delay_ms` from now
    pub fn schedule(&mut self, delay_ms: u64, task: T) -> TaskHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue
            .insert((self.now_ms.saturating_add(delay_ms), seq), task);
        TaskHandle(seq)
    }

    /// Cancel a pending task. Returns the task if it had not run yet.
    pub fn cancel(&mut self, handle: TaskHandle) -> Option<T> {
        let key = self.queue.keys().find(|(_, seq)| *seq == handle.0).copied()?;
        self.queue.remove(&key)
    }

    /// Drop every pending task
    pub fn cancel_all(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        count
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Due time of the earliest task
    pub fn next_due(&self) -> Option<u64> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    /// Pop the earliest task due at or before `until`, moving the clock to
    /// its due time.
    pub fn pop_due(&mut self, until: u64) -> Option<(TaskHandle, T)> {
        let (&(due, seq), _) = self.queue.iter().next()?;
        if due > until {
            return None;
        }
        let task = self.queue.remove(&(due, seq))?;
        self.now_ms = self.now_ms.max(due);
        Some((TaskHandle(seq), task))
    }

    /// Move the clock forward without running anything
    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }
}
