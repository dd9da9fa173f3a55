//! Replay buffer for requests waiting on a token refresh.
//!
//! One queue is shared by every manager that uses the same credential. Besides
//! the FIFO it carries the latch that says whether a refresh round is running,
//! so concurrent 401s fold into a single round. Entries and latch share one
//! lock: joining a round and draining it cannot interleave.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::completion::Completion;
use crate::manager::ManagerInner;
use crate::request::NetworkRequest;

/// A request parked until the next refresh round settles.
pub struct WaitingEntry {
    pub(crate) request: Arc<dyn NetworkRequest>,
    pub(crate) completion: Completion,
    pub(crate) origin: Weak<ManagerInner>,
}

impl WaitingEntry {
    pub fn url(&self) -> &str {
        self.request.url()
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    pub fn is_pending(&self) -> bool {
        !self.completion.is_settled()
    }
}

impl fmt::Debug for WaitingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitingEntry")
            .field("url", &self.request.url())
            .field("completion", &self.completion)
            .finish()
    }
}

/// Queue type shared between request managers.
pub type ReplayQueue = WaitingQueue<WaitingEntry>;

/// Identifies the refresh round that currently owns the latch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RoundToken(u64);

impl RoundToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct Latch {
    token: RoundToken,
    claimed_at: Instant,
}

#[derive(Debug)]
struct QueueState<T> {
    entries: VecDeque<T>,
    latch: Option<Latch>,
    next_round: u64,
}

/// Unbounded FIFO safe for many producers; no deduplication, no priorities.
#[derive(Debug)]
pub struct WaitingQueue<T> {
    state: Mutex<QueueState<T>>,
}

impl<T> WaitingQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: VecDeque::new(),
                latch: None,
                next_round: 1,
            }),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn enqueue(&self, entry: T) {
        let mut state = self.lock();
        state.entries.push_back(entry);
        debug!(queued = state.entries.len(), "waiting queue: enqueued");
    }

    /// Appends `entry` and claims the latch if no round owns it. A latch held
    /// for at least `stale_after` is taken over; the old round is superseded.
    /// Returns the token of the round the caller must now run.
    pub fn enqueue_and_claim(&self, entry: T, stale_after: Option<Duration>) -> Option<RoundToken> {
        let mut state = self.lock();
        state.entries.push_back(entry);
        debug!(queued = state.entries.len(), "waiting queue: enqueued");

        if let Some(latch) = &state.latch {
            let held = latch.claimed_at.elapsed();
            if !stale_after.is_some_and(|limit| held >= limit) {
                return None;
            }
            warn!(
                round = latch.token.id(),
                held_ms = u64::try_from(held.as_millis()).unwrap_or(u64::MAX),
                "refresh round never settled; superseding it"
            );
        }

        let token = RoundToken(state.next_round);
        state.next_round += 1;
        state.latch = Some(Latch {
            token,
            claimed_at: Instant::now(),
        });
        Some(token)
    }

    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        let entry = state.entries.pop_front();
        match entry {
            Some(_) => debug!(queued = state.entries.len(), "waiting queue: dequeued"),
            None => debug!("waiting queue: empty"),
        }
        entry
    }

    /// Removes every entry at once, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.lock().entries.drain(..).collect()
    }

    /// Takes every entry and frees the latch in one step, if `token` still owns it.
    pub fn drain_and_release(&self, token: RoundToken) -> Option<Vec<T>> {
        let mut state = self.lock();
        if !state.owns_latch(token) {
            return None;
        }
        state.latch = None;
        Some(state.entries.drain(..).collect())
    }

    /// Frees the latch, leaving entries queued, if `token` still owns it.
    pub fn release(&self, token: RoundToken) -> bool {
        let mut state = self.lock();
        if !state.owns_latch(token) {
            return false;
        }
        state.latch = None;
        true
    }

    /// Keeps only the entries for which `keep` returns `true`, preserving order.
    pub fn retain<F>(&self, keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        let mut state = self.lock();
        state.entries.retain(keep);
        debug!(queued = state.entries.len(), "waiting queue: pruned");
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().latch.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> QueueState<T> {
    fn owns_latch(&self, token: RoundToken) -> bool {
        self.latch.as_ref().is_some_and(|latch| latch.token == token)
    }
}

impl<T> Default for WaitingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
