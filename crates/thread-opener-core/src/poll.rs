#![forbid(unsafe_code)]

//! Bounded "try now, then watch until found or timed out" primitive.
//!
//! A poll is a predicate/action pair over an externally mutating document.
//! [`BoundedPoll::await_condition`] runs it once synchronously; if it does not
//! succeed, the poll subscribes to document-mutation batches and is retried on
//! every batch until it succeeds. Every subscription carries a deadline, so a
//! page that never renders the awaited element cannot keep an observer alive.
//!
//! The host owns the real mutation observer and keeps it connected exactly
//! while [`BoundedPoll::observer_count`] is non-zero.

use core::time::Duration;
use std::collections::BTreeMap;

use tracing::{debug, info, trace};

/// Identity of one pending subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollId(u64);

impl core::fmt::Display for PollId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of starting a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStart {
    /// The synchronous attempt succeeded; nothing was subscribed.
    Satisfied,
    /// The attempt failed; the poll now waits for mutations until its deadline.
    Subscribed(PollId),
}

/// How a subscribed poll ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollExit<T> {
    Satisfied { id: PollId, task: T },
    TimedOut { id: PollId, task: T },
}

#[derive(Debug, Clone)]
struct PendingPoll<T> {
    task: T,
    deadline: Duration,
}

/// Registry of pending bounded polls carrying task payload `T`.
#[derive(Debug, Clone)]
pub struct BoundedPoll<T> {
    pending: BTreeMap<PollId, PendingPoll<T>>,
    next_id: u64,
}

impl<T> Default for BoundedPoll<T> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> BoundedPoll<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try `attempt` now; subscribe with a deadline of `now + timeout` if it fails.
    pub fn await_condition(
        &mut self,
        mut task: T,
        now: Duration,
        timeout: Duration,
        mut attempt: impl FnMut(&mut T) -> bool,
    ) -> PollStart {
        if attempt(&mut task) {
            return PollStart::Satisfied;
        }
        let id = PollId(self.next_id);
        self.next_id += 1;
        let deadline = now.saturating_add(timeout);
        self.pending.insert(id, PendingPoll { task, deadline });
        debug!(poll_id = %id, deadline_ms = deadline.as_millis() as u64, "poll subscribed");
        PollStart::Subscribed(id)
    }

    /// Re-run every live poll after a batch of document mutations.
    ///
    /// Polls whose deadline is already behind `now` are unsubscribed as timed
    /// out without another attempt.
    pub fn on_mutations(
        &mut self,
        now: Duration,
        mut attempt: impl FnMut(PollId, &mut T) -> bool,
    ) -> Vec<PollExit<T>> {
        let mut exits = self.expire(now);
        let ids: Vec<PollId> = self.pending.keys().copied().collect();
        for id in ids {
            let Some(poll) = self.pending.get_mut(&id) else {
                continue;
            };
            trace!(poll_id = %id, "poll retry on mutation batch");
            if attempt(id, &mut poll.task) {
                if let Some(poll) = self.pending.remove(&id) {
                    debug!(poll_id = %id, "poll satisfied");
                    exits.push(PollExit::Satisfied { id, task: poll.task });
                }
            }
        }
        exits
    }

    /// Unsubscribe every poll whose deadline is `<= now`.
    pub fn expire(&mut self, now: Duration) -> Vec<PollExit<T>> {
        let expired: Vec<PollId> = self
            .pending
            .iter()
            .filter(|(_, poll)| poll.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| {
                let poll = self.pending.remove(&id)?;
                info!(poll_id = %id, "poll abandoned: condition not met before deadline");
                Some(PollExit::TimedOut { id, task: poll.task })
            })
            .collect()
    }

    /// Number of live mutation subscriptions.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether any pending poll carries a task matching `predicate`.
    pub fn any_pending(&self, mut predicate: impl FnMut(&T) -> bool) -> bool {
        self.pending.values().any(|poll| predicate(&poll.task))
    }

    /// Earliest deadline among live polls.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.values().map(|poll| poll.deadline).min()
    }
}
