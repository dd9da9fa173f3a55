use std::time::{Duration, SystemTime};

use tracing::{Level, event};
use uuid::Uuid;

/// Structured events for one refresh round.
#[derive(Clone, Debug)]
pub struct RefreshTelemetry {
    round_id: Uuid,
    context: String,
}

impl RefreshTelemetry {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            round_id: Uuid::new_v4(),
            context: context.into(),
        }
    }

    pub fn round_id(&self) -> Uuid {
        self.round_id
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn emit_start(&self, attempts_remaining: u32, waiting: usize) {
        event!(
            Level::INFO,
            round_id = %self.round_id,
            context = %self.context,
            timestamp = ?SystemTime::now(),
            attempts_remaining,
            waiting,
            "refresh.start"
        );
    }

    pub fn emit_success(&self, replaying: usize) {
        event!(
            Level::INFO,
            round_id = %self.round_id,
            context = %self.context,
            timestamp = ?SystemTime::now(),
            replaying,
            "refresh.success"
        );
    }

    pub fn emit_failure(&self, waiting: usize) {
        event!(
            Level::ERROR,
            round_id = %self.round_id,
            context = %self.context,
            timestamp = ?SystemTime::now(),
            waiting,
            "refresh.failure"
        );
    }

    pub fn emit_aborted(&self, dropped: usize) {
        event!(
            Level::WARN,
            round_id = %self.round_id,
            context = %self.context,
            timestamp = ?SystemTime::now(),
            dropped,
            "refresh.aborted"
        );
    }

    pub fn emit_timeout(&self, timeout: Duration, waiting: usize) {
        event!(
            Level::ERROR,
            round_id = %self.round_id,
            context = %self.context,
            timestamp = ?SystemTime::now(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            waiting,
            "refresh.timeout"
        );
    }

    pub fn emit_exhausted(&self, max_attempts: u32) {
        event!(
            Level::WARN,
            round_id = %self.round_id,
            context = %self.context,
            timestamp = ?SystemTime::now(),
            max_attempts,
            "refresh.exhausted"
        );
    }

    /// The capability dropped its callback; waiters stay queued.
    pub fn emit_abandoned(&self, waiting: usize) {
        event!(
            Level::WARN,
            round_id = %self.round_id,
            context = %self.context,
            timestamp = ?SystemTime::now(),
            waiting,
            "refresh.abandoned"
        );
    }
}
