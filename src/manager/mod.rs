//! Request manager: one in-flight request per instance, bounded token refresh,
//! and replay of requests that queued up while a refresh was running.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::completion::Completion;
use crate::config::Config;
use crate::decode::{body_preview, decode_json};
use crate::errors::{Error, FireResult, NetworkError};
use crate::queue::ReplayQueue;
use crate::request::{Assembly, NetworkRequest, assemble};
use crate::transport::{ReqwestTransport, Transport, TransportError, TransportResponse};

mod refresh;

/// Cheap to clone; clones share the in-flight slot and the attempt budget.
#[derive(Clone)]
pub struct RequestManager {
    inner: Arc<ManagerInner>,
}

pub(crate) struct ManagerInner {
    transport: Arc<dyn Transport>,
    queue: Arc<ReplayQueue>,
    runtime: Handle,
    max_attempts: u32,
    refresh_timeout: Option<Duration>,
    refresh_stale_after: Option<Duration>,
    next_task_id: AtomicU64,
    state: Mutex<ManagerState>,
}

struct ManagerState {
    in_flight: Option<InFlight>,
    attempts_remaining: u32,
}

struct InFlight {
    task_id: u64,
    handle: JoinHandle<()>,
    completion: Completion,
    url: String,
}

impl InFlight {
    fn cancel(self) {
        self.handle.abort();
        if self.completion.complete(Err(NetworkError::Aborted)) {
            info!(
                call_id = %self.completion.call_id(),
                "cancelled in-flight request to '{}'", self.url
            );
        }
    }
}

impl ManagerInner {
    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Releases the in-flight slot if `task_id` still owns it.
    fn finish_task(&self, task_id: u64) -> bool {
        let mut state = self.lock_state();
        match &state.in_flight {
            Some(current) if current.task_id == task_id => {
                state.in_flight = None;
                true
            }
            _ => false,
        }
    }

    fn take_attempt(&self) -> Option<u32> {
        let mut state = self.lock_state();
        if state.attempts_remaining == 0 {
            return None;
        }
        state.attempts_remaining -= 1;
        Some(state.attempts_remaining)
    }

    fn reset_attempts(&self) {
        self.lock_state().attempts_remaining = self.max_attempts;
    }
}

impl RequestManager {
    /// Must be called from within a tokio runtime; transport calls run on it.
    pub fn new(
        transport: Arc<dyn Transport>,
        queue: Arc<ReplayQueue>,
        config: &Config,
    ) -> Result<Self, Error> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("RequestManager requires a tokio runtime: {e}")))?;
        Ok(Self {
            inner: Arc::new(ManagerInner {
                transport,
                queue,
                runtime,
                max_attempts: config.max_attempts,
                refresh_timeout: config.refresh_timeout(),
                refresh_stale_after: config.refresh_stale_after(),
                next_task_id: AtomicU64::new(1),
                state: Mutex::new(ManagerState {
                    in_flight: None,
                    attempts_remaining: config.max_attempts,
                }),
            }),
        })
    }

    pub fn with_max_attempts(
        transport: Arc<dyn Transport>,
        queue: Arc<ReplayQueue>,
        max_attempts: u32,
    ) -> Result<Self, Error> {
        let config = Config {
            max_attempts,
            ..Config::default()
        };
        Self::new(transport, queue, &config)
    }

    /// Builds a manager over a `ReqwestTransport` configured from `config`.
    pub fn from_config(config: &Config, queue: Arc<ReplayQueue>) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(config)?;
        Self::new(Arc::new(transport), queue, config)
    }

    fn from_inner(inner: Arc<ManagerInner>) -> Self {
        Self { inner }
    }

    pub fn max_attempts(&self) -> u32 {
        self.inner.max_attempts
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.inner.lock_state().attempts_remaining
    }

    pub fn has_task_in_flight(&self) -> bool {
        self.inner.lock_state().in_flight.is_some()
    }

    pub fn queue(&self) -> Arc<ReplayQueue> {
        Arc::clone(&self.inner.queue)
    }

    /// Fires `request`; `callback` receives at most one result. A caller parked
    /// behind a refresh that never reports stays queued until a later round.
    /// Returns the call id used in log events.
    pub fn fire<F>(&self, request: Arc<dyn NetworkRequest>, callback: F) -> Uuid
    where
        F: FnOnce(FireResult) + Send + 'static,
    {
        let completion = Completion::new(callback);
        let call_id = completion.call_id();
        self.dispatch(request, completion);
        call_id
    }

    pub async fn fire_async(&self, request: Arc<dyn NetworkRequest>) -> FireResult {
        let (tx, rx) = oneshot::channel();
        self.fire(request, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(NetworkError::Aborted))
    }

    pub async fn fire_json<T: DeserializeOwned>(
        &self,
        request: Arc<dyn NetworkRequest>,
    ) -> Result<T, NetworkError> {
        let body = self.fire_async(request).await?;
        decode_json(&body)
    }

    /// Cancels the live transport task, answering its caller with `Aborted`.
    /// No-op when nothing is running.
    pub fn cancel_current_task_if_running(&self) {
        let current = self.inner.lock_state().in_flight.take();
        if let Some(task) = current {
            task.cancel();
        }
    }

    pub(crate) fn dispatch(&self, request: Arc<dyn NetworkRequest>, completion: Completion) {
        if completion.is_settled() {
            debug!(call_id = %completion.call_id(), "request already answered; not firing");
            return;
        }
        let url = request.url().to_string();
        debug!(
            call_id = %completion.call_id(),
            method = %request.method(),
            url = %url,
            "request.fire"
        );

        let outgoing = match assemble(request.as_ref()) {
            Ok(Assembly::Ready(outgoing)) => outgoing,
            Ok(Assembly::NeedsToken) => {
                info!("no token for '{}'; refreshing before sending", url);
                self.cancel_current_task_if_running();
                self.handle_token_refresh(request, completion);
                return;
            }
            Err(err) => {
                warn!("request to '{}' not sent: {}", url, err);
                completion.complete(Err(err));
                return;
            }
        };
        debug!("request body: {}", body_preview(outgoing.body.as_deref()));

        let task_id = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed);
        // Swap under the lock so concurrent fires cannot both keep a live task.
        let previous = {
            let mut state = self.inner.lock_state();
            let manager = self.clone();
            let transport = Arc::clone(&self.inner.transport);
            let task_completion = completion.clone();
            let handle = self.inner.runtime.spawn(async move {
                let outcome = transport.send(outgoing).await;
                manager.on_transport_outcome(task_id, request, task_completion, outcome);
            });
            state.in_flight.replace(InFlight {
                task_id,
                handle,
                completion,
                url,
            })
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    fn on_transport_outcome(
        &self,
        task_id: u64,
        request: Arc<dyn NetworkRequest>,
        completion: Completion,
        outcome: Result<TransportResponse, TransportError>,
    ) {
        if !self.inner.finish_task(task_id) {
            debug!(task_id, "transport result for a replaced task dropped");
            return;
        }

        let response = match outcome {
            Ok(response) => response,
            Err(TransportError::Cancelled) => {
                debug!(task_id, "transport reported cancellation");
                return;
            }
            Err(err) => {
                warn!("request to '{}' failed: {}", request.url(), err);
                completion.complete(Err(NetworkError::NoConnectivity));
                return;
            }
        };

        let TransportResponse { head, body } = response;
        let Some(body) = body else {
            warn!("request to '{}' returned no data", request.url());
            completion.complete(Err(NetworkError::NoConnectivity));
            return;
        };

        let status = head.status;
        if status == StatusCode::UNAUTHORIZED && request.auth().needs_authentication() {
            warn!(
                "request to '{}' rejected with 401; queueing for token refresh",
                head.url
            );
            self.handle_token_refresh(request, completion);
            return;
        }

        if !(status.is_success() || status == StatusCode::NOT_MODIFIED) {
            error!(
                "server responded with error code {} to {} '{}': body='{}'",
                status.as_u16(),
                request.method(),
                head.url,
                body_preview(Some(body.as_slice()))
            );
            completion.complete(Err(NetworkError::ServerError { status, body }));
            return;
        }

        if let Some(cached) = request.cached_data_if_fresh(&head, &body) {
            debug!("serving cached data for '{}' (status={})", head.url, status);
            completion.complete(Ok(cached));
            return;
        }

        if !request.is_response_valid(&head, &body, self, &completion) {
            debug!("response for '{}' deferred to its descriptor", head.url);
            return;
        }

        self.inner.reset_attempts();
        debug!(
            "response ok: status={} url='{}' body='{}'",
            status.as_u16(),
            head.url,
            body_preview(Some(body.as_slice()))
        );
        completion.complete(Ok(body));
    }
}

impl fmt::Debug for RequestManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("RequestManager")
            .field("max_attempts", &self.inner.max_attempts)
            .field("attempts_remaining", &state.attempts_remaining)
            .field("in_flight", &state.in_flight.as_ref().map(|t| t.url.as_str()))
            .finish()
    }
}
