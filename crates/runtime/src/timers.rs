//! Deterministic one-shot timer queue.
//!
//! Key properties:
//! - Total ordering on `(deadline, id)`; timers armed for the same instant
//!   fire in arming order.
//! - Cancellation removes the entry immediately, so a cancelled timer can
//!   never fire later in the same turn.
//! - No wall clock: callers pass `now` in.
//!
//! Vec-backed: each owner only ever holds a handful of timers.

use foundation::time::Time;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug)]
struct Entry<T> {
    id: TimerId,
    deadline: Time,
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

    /// Arms a timer firing `delay_s` seconds after `now`.
    pub fn arm(&mut self, now: Time, delay_s: f64, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push(Entry {
            id,
            deadline: now.after(delay_s),
            payload,
        });
        id
    }

    /// Returns `true` if the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn deadline(&self, id: TimerId) -> Option<Time> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.deadline)
    }

    pub fn next_deadline(&self) -> Option<Time> {
        self.entries
            .iter()
            .map(|e| e.deadline)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Pops the earliest timer whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Time) -> Option<(TimerId, T)> {
        let mut best_idx: Option<usize> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.deadline.total_cmp(&now).is_gt() {
                continue;
            }
            match best_idx {
                None => best_idx = Some(idx),
                Some(best) => {
                    let b = &self.entries[best];
                    let earlier = entry
                        .deadline
                        .total_cmp(&b.deadline)
                        .then_with(|| entry.id.cmp(&b.id))
                        .is_lt();
                    if earlier {
                        best_idx = Some(idx);
                    }
                }
            }
        }

        let idx = best_idx?;
        let entry = self.entries.swap_remove(idx);
        Some((entry.id, entry.payload))
    }
}
