use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::runtime::Handle;
use tracing::{debug, error, info};

use crate::errors::Error;

use super::auth::{OAuthHandler, RefreshCallback, RefreshOutcome};

/// What a refresher produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenRefresh {
    Token(String),
    /// The refresh was abandoned, e.g. the user dismissed a login prompt.
    Aborted,
    Failed(String),
}

type RefreshFuture = Pin<Box<dyn Future<Output = TokenRefresh> + Send>>;
type Refresher = Arc<dyn Fn() -> RefreshFuture + Send + Sync>;

/// Shared bearer credential: one token, one refresher, any number of descriptors.
#[derive(Clone)]
pub struct BearerAuth {
    token: Arc<RwLock<Option<String>>>,
    refresher: Refresher,
    runtime: Handle,
}

impl BearerAuth {
    /// Must be called from within a tokio runtime; the refresher runs on it.
    pub fn new<F, Fut>(initial: Option<String>, refresher: F) -> Result<Self, Error>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TokenRefresh> + Send + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("BearerAuth requires a tokio runtime: {e}")))?;
        Ok(Self {
            token: Arc::new(RwLock::new(initial)),
            refresher: Arc::new(move || Box::pin(refresher()) as RefreshFuture),
            runtime,
        })
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Forgets the current token so the next fire refreshes first.
    pub fn invalidate(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth")
            .field("has_token", &self.token().is_some())
            .finish()
    }
}

impl OAuthHandler for BearerAuth {
    fn needs_authentication(&self) -> bool {
        true
    }

    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn refresh_token(&self, on_done: RefreshCallback) {
        let refresh = (self.refresher)();
        let token = Arc::clone(&self.token);
        self.runtime.spawn(async move {
            debug!("bearer refresh started");
            let outcome = match refresh.await {
                TokenRefresh::Token(value) => {
                    info!("bearer token refreshed (len={})", value.len());
                    *token.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
                    RefreshOutcome::Refreshed
                }
                TokenRefresh::Aborted => {
                    info!("bearer token refresh aborted");
                    RefreshOutcome::Aborted
                }
                TokenRefresh::Failed(reason) => {
                    error!("bearer token refresh failed: {}", reason);
                    RefreshOutcome::Failed
                }
            };
            on_done(outcome);
        });
    }
}
