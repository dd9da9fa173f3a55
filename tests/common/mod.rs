#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use bearer_dispatch::request::RefreshCallback;
use bearer_dispatch::{
    FireResult, NetworkRequest, OAuthHandler, OutgoingRequest, RefreshOutcome, RequestDescriptor,
    RequestManager, ResponseHead, Transport, TransportError, TransportResponse,
};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use tokio::sync::oneshot;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// What the scripted transport does with one request.
pub enum Reply {
    Status(u16, Vec<u8>),
    Delayed(Duration, u16, Vec<u8>),
    /// Never resolves; only cancellation ends it.
    Hang,
    Offline,
    NoBody(u16),
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Reply::Status(200, body.as_bytes().to_vec())
    }

    pub fn status(status: u16) -> Self {
        Reply::Status(status, Vec::new())
    }
}

type Responder = Box<dyn Fn(&OutgoingRequest) -> Reply + Send + Sync>;

/// Records every submitted request and answers through a closure.
pub struct ScriptedTransport {
    sent: Mutex<Vec<OutgoingRequest>>,
    responder: Responder,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&OutgoingRequest) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    /// 401 for `Bearer stale` (or no token), 200 echoing the path otherwise.
    pub fn rejecting_stale_tokens() -> Arc<Self> {
        Self::new(|req| match req.header("authorization") {
            Some("Bearer stale") | None => Reply::status(401),
            Some(_) => Reply::ok(req.url.path()),
        })
    }

    pub fn sent(&self) -> Vec<OutgoingRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent_paths(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|req| req.url.path().to_string())
            .collect()
    }
}

fn response(request: &OutgoingRequest, status: u16, body: Option<Vec<u8>>) -> TransportResponse {
    TransportResponse {
        head: ResponseHead {
            url: request.url.clone(),
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
        },
        body,
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<TransportResponse, TransportError> {
        self.sent.lock().unwrap().push(request.clone());
        match (self.responder)(&request) {
            Reply::Status(status, body) => Ok(response(&request, status, Some(body))),
            Reply::Delayed(delay, status, body) => {
                tokio::time::sleep(delay).await;
                Ok(response(&request, status, Some(body)))
            }
            Reply::Hang => {
                std::future::pending::<()>().await;
                Err(TransportError::Cancelled)
            }
            Reply::Offline => Err(TransportError::Connect("connection refused".into())),
            Reply::NoBody(status) => Ok(response(&request, status, None)),
        }
    }
}

/// How `TestAuth` answers a refresh request.
#[derive(Clone, Debug)]
pub enum RefreshMode {
    Succeed(String),
    Fail,
    Abort,
    /// Keep the callback until `release` is called.
    Hold,
    /// Drop the callback without ever calling it.
    Drop,
}

pub struct TestAuth {
    token: Mutex<Option<String>>,
    mode: Mutex<RefreshMode>,
    held: Mutex<Vec<RefreshCallback>>,
    refreshes: AtomicUsize,
}

impl TestAuth {
    pub fn new(initial: Option<&str>, mode: RefreshMode) -> Arc<Self> {
        Arc::new(Self {
            token: Mutex::new(initial.map(str::to_string)),
            mode: Mutex::new(mode),
            held: Mutex::new(Vec::new()),
            refreshes: AtomicUsize::new(0),
        })
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn set_mode(&self, mode: RefreshMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn held(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    /// Completes held refreshes, installing `token` first when given.
    pub fn release(&self, outcome: RefreshOutcome, token: Option<&str>) {
        if let Some(token) = token {
            *self.token.lock().unwrap() = Some(token.to_string());
        }
        let held: Vec<RefreshCallback> = self.held.lock().unwrap().drain(..).collect();
        for callback in held {
            callback(outcome);
        }
    }
}

impl OAuthHandler for TestAuth {
    fn needs_authentication(&self) -> bool {
        true
    }

    fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    fn refresh_token(&self, on_done: RefreshCallback) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.lock().unwrap().clone();
        match mode {
            RefreshMode::Succeed(token) => {
                *self.token.lock().unwrap() = Some(token);
                on_done(RefreshOutcome::Refreshed);
            }
            RefreshMode::Fail => on_done(RefreshOutcome::Failed),
            RefreshMode::Abort => on_done(RefreshOutcome::Aborted),
            RefreshMode::Hold => self.held.lock().unwrap().push(on_done),
            RefreshMode::Drop => drop(on_done),
        }
    }
}

/// Polls `condition` on the runtime until it holds or a second passes.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// Fires through `manager` and hands back a receiver for the single result.
pub fn fire(
    manager: &RequestManager,
    request: Arc<dyn NetworkRequest>,
) -> oneshot::Receiver<FireResult> {
    let (tx, rx) = oneshot::channel();
    manager.fire(request, move |result| {
        let _ = tx.send(result);
    });
    rx
}

pub fn authed_get(path: &str, auth: &Arc<TestAuth>) -> Arc<RequestDescriptor> {
    Arc::new(
        RequestDescriptor::get(format!("https://api.example.com{path}")).with_auth(auth.clone()),
    )
}
