//! Single-shot delivery of a fire result.
//!
//! A `Completion` may be cloned into the waiting queue, the in-flight slot and a
//! descriptor's validation hook at the same time. Whichever path settles first
//! delivers the result; every later attempt is dropped.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::errors::FireResult;

pub type Callback = Box<dyn FnOnce(FireResult) + Send + 'static>;

#[derive(Clone)]
pub struct Completion {
    call_id: Uuid,
    callback: Arc<Mutex<Option<Callback>>>,
}

impl Completion {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(FireResult) + Send + 'static,
    {
        Self {
            call_id: Uuid::new_v4(),
            callback: Arc::new(Mutex::new(Some(Box::new(callback)))),
        }
    }

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    pub fn is_settled(&self) -> bool {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Delivers `result` unless the call was already answered.
    /// Returns `true` when this invocation delivered it.
    pub fn complete(&self, result: FireResult) -> bool {
        // Taken under the lock, invoked outside it: callbacks may fire again.
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match callback {
            Some(callback) => {
                callback(result);
                true
            }
            None => {
                debug!(call_id = %self.call_id, "completion already settled; result dropped");
                false
            }
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("call_id", &self.call_id)
            .field("settled", &self.is_settled())
            .finish()
    }
}
