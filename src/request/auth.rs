/// How a refresh round ended, as reported by the credential capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    Aborted,
    Failed,
}

pub type RefreshCallback = Box<dyn FnOnce(RefreshOutcome) + Send + 'static>;

/// Authentication capability attached to a request descriptor.
///
/// `refresh_token` may call `on_done` synchronously or later from another
/// task. Dropping `on_done` without calling it ends the round; requests that
/// waited on it stay queued for the next one.
pub trait OAuthHandler: Send + Sync {
    fn needs_authentication(&self) -> bool;
    fn token(&self) -> Option<String>;
    fn refresh_token(&self, on_done: RefreshCallback);
}

/// Capability for requests that do not carry credentials.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAuth;

impl OAuthHandler for NoAuth {
    fn needs_authentication(&self) -> bool {
        false
    }

    fn token(&self) -> Option<String> {
        None
    }

    fn refresh_token(&self, _on_done: RefreshCallback) {}
}
