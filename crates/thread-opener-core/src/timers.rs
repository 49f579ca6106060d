#![forbid(unsafe_code)]

//! Deadline-ordered queue of deferred continuations.
//!
//! The core never sleeps. Work that must happen "later" is queued here with an
//! absolute deadline on the host's monotonic clock; the host asks for
//! [`TimerQueue::next_deadline`], arranges a single wake-up, and drains due
//! work with [`TimerQueue::take_due`].

use core::time::Duration;
use std::collections::BTreeMap;

/// Deadline-ordered queue. Ties fire in scheduling order.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    /// Keyed by deadline, then scheduling sequence.
    entries: BTreeMap<(Duration, u64), T>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` to fire once `deadline` is reached.
    pub fn schedule(&mut self, deadline: Duration, task: T) {
        self.entries.insert((deadline, self.next_seq), task);
        self.next_seq += 1;
    }

    /// Remove every task whose deadline is `<= now`, earliest first.
    pub fn take_due(&mut self, now: Duration) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(entry) = self.entries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            due.push(entry.remove());
        }
        due
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::TimerQueue;
    use core::time::Duration;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn due_tasks_fire_in_deadline_then_schedule_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(30), "late");
        queue.schedule(ms(10), "first");
        queue.schedule(ms(10), "second");
        assert_eq!(queue.next_deadline(), Some(ms(10)));
        assert_eq!(queue.take_due(ms(20)), vec!["first", "second"]);
        assert_eq!(queue.take_due(ms(29)), Vec::<&str>::new());
        assert_eq!(queue.take_due(ms(30)), vec!["late"]);
        assert_eq!(queue.next_deadline(), None);
    }
}
