use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::completion::Completion;
use crate::errors::NetworkError;
use crate::queue::{RoundToken, WaitingEntry};
use crate::request::{NetworkRequest, RefreshOutcome};
use crate::telemetry::RefreshTelemetry;

use super::RequestManager;

enum RoundOutcome {
    Reported(RefreshOutcome),
    TimedOut(Duration),
    /// The capability dropped its callback without reporting.
    Abandoned,
}

/// One execution of the refresh capability. Settles at most once, whether
/// from the capability's callback, the optional timeout, or the callback
/// being dropped.
struct RefreshRound {
    manager: RequestManager,
    token: RoundToken,
    trigger: Completion,
    telemetry: RefreshTelemetry,
    settled: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Carried by the callback handed to the capability.
struct ReportGuard {
    round: Option<Arc<RefreshRound>>,
}

impl ReportGuard {
    fn report(mut self, outcome: RefreshOutcome) {
        if let Some(round) = self.round.take() {
            round.settle(RoundOutcome::Reported(outcome));
        }
    }
}

impl Drop for ReportGuard {
    fn drop(&mut self) {
        if let Some(round) = self.round.take() {
            round.settle(RoundOutcome::Abandoned);
        }
    }
}

impl RequestManager {
    /// Parks the request and starts a refresh round unless one is running.
    pub(super) fn handle_token_refresh(
        &self,
        request: Arc<dyn NetworkRequest>,
        completion: Completion,
    ) {
        let queue = &self.inner.queue;
        let claimed = queue.enqueue_and_claim(
            WaitingEntry {
                request: Arc::clone(&request),
                completion: completion.clone(),
                origin: Arc::downgrade(&self.inner),
            },
            self.inner.refresh_stale_after,
        );
        info!(
            "request to '{}' waiting for token refresh (queued={})",
            request.url(),
            queue.len()
        );

        let Some(token) = claimed else {
            debug!("token refresh already running; request will be replayed");
            return;
        };

        let telemetry = RefreshTelemetry::new(request.url());
        let Some(remaining) = self.inner.take_attempt() else {
            queue.release(token);
            telemetry.emit_exhausted(self.inner.max_attempts);
            completion.complete(Err(NetworkError::AttemptsExhausted));
            queue.retain(WaitingEntry::is_pending);
            return;
        };
        telemetry.emit_start(remaining, queue.len());

        let round = Arc::new(RefreshRound {
            manager: self.clone(),
            token,
            trigger: completion,
            telemetry,
            settled: AtomicBool::new(false),
            timer: Mutex::new(None),
        });

        if let Some(timeout) = self.inner.refresh_timeout {
            let timed = Arc::clone(&round);
            let timer = self.inner.runtime.spawn(async move {
                tokio::time::sleep(timeout).await;
                timed.settle(RoundOutcome::TimedOut(timeout));
            });
            *round.timer.lock().unwrap_or_else(PoisonError::into_inner) = Some(timer);
        }

        let guard = ReportGuard { round: Some(round) };
        request
            .auth()
            .refresh_token(Box::new(move |outcome| guard.report(outcome)));
    }

    /// Re-fires each entry, oldest first, through the manager that queued it.
    fn replay(&self, waiting: Vec<WaitingEntry>) {
        for entry in waiting {
            let WaitingEntry {
                request,
                completion,
                origin,
            } = entry;
            if completion.is_settled() {
                debug!("skipping replay of answered request to '{}'", request.url());
                continue;
            }
            let manager = origin
                .upgrade()
                .map(RequestManager::from_inner)
                .unwrap_or_else(|| self.clone());
            info!("token refreshed; replaying request to '{}'", request.url());
            manager.dispatch(request, completion);
        }
    }
}

impl RefreshRound {
    fn settle(&self, outcome: RoundOutcome) {
        if self.settled.swap(true, Ordering::AcqRel) {
            debug!(round_id = %self.telemetry.round_id(), "refresh round already settled");
            return;
        }
        if let Some(timer) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            timer.abort();
        }

        let queue = &self.manager.inner.queue;
        match outcome {
            RoundOutcome::Reported(RefreshOutcome::Refreshed) => {
                let Some(waiting) = queue.drain_and_release(self.token) else {
                    return self.superseded();
                };
                self.telemetry.emit_success(waiting.len());
                self.manager.replay(waiting);
            }
            RoundOutcome::Reported(RefreshOutcome::Failed) => {
                if !queue.release(self.token) {
                    return self.superseded();
                }
                self.trigger.complete(Err(NetworkError::RefreshFailed));
                queue.retain(WaitingEntry::is_pending);
                self.telemetry.emit_failure(queue.len());
            }
            RoundOutcome::Reported(RefreshOutcome::Aborted) => {
                let Some(waiting) = queue.drain_and_release(self.token) else {
                    return self.superseded();
                };
                self.telemetry.emit_aborted(waiting.len());
                for entry in waiting {
                    entry.completion.complete(Err(NetworkError::Aborted));
                }
            }
            RoundOutcome::TimedOut(timeout) => {
                let Some(waiting) = queue.drain_and_release(self.token) else {
                    return self.superseded();
                };
                self.telemetry.emit_timeout(timeout, waiting.len());
                for entry in waiting {
                    entry.completion.complete(Err(NetworkError::RefreshFailed));
                }
            }
            RoundOutcome::Abandoned => {
                if !queue.release(self.token) {
                    return self.superseded();
                }
                self.telemetry.emit_abandoned(queue.len());
            }
        }
    }

    /// A later round took over the latch; its waiters are no longer ours.
    fn superseded(&self) {
        debug!(
            round_id = %self.telemetry.round_id(),
            round = self.token.id(),
            "refresh round was superseded; outcome ignored"
        );
    }
}
