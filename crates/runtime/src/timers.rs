//! Deterministic queue of deferred continuations.
//!
//! This is how cooperative work yields: a step that is not finished
//! schedules its resumption at `now + delay` and returns. The host pops due
//! entries each frame and hands them back to their owners.
//!
//! Key properties:
//! - Total ordering on `(due, id)`; equal due times fire in scheduling order.
//! - Ids are never reused, so a stale id can be recognised by its owner.
//! - Cancellation removes the entry without perturbing the others.

use foundation::time::Time;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq)]
struct Key {
    due: Time,
    id: TimerId,
}

impl Key {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.due
            .0
            .total_cmp(&other.due.0)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[derive(Debug)]
struct Entry<T> {
    key: Key,
    payload: T,
}

#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn schedule(&mut self, due: Time, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push(Entry {
            key: Key { due, id },
            payload,
        });
        id
    }

    /// Returns `true` if the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.entries.iter().position(|e| e.key.id == id) {
            Some(idx) => {
                self.entries.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// Pops the earliest entry whose due time is `<= now`.
    pub fn pop_due(&mut self, now: Time) -> Option<(TimerId, T)> {
        let idx = self.earliest()?;
        if self.entries[idx].key.due.0 > now.0 {
            return None;
        }
        let entry = self.entries.swap_remove(idx);
        Some((entry.key.id, entry.payload))
    }

    fn earliest(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            match best {
                None => best = Some(idx),
                Some(b) => {
                    if entry.key.cmp(&self.entries[b].key).is_lt() {
                        best = Some(idx);
                    }
                }
            }
        }
        best
    }
}
