//! Observer slots for decoded inbound events.
//!
//! Each event kind has at most one registered handler. Handlers run
//! synchronously on the receive task, in line with message processing: a
//! handler that blocks stalls the receive loop, so handlers must return
//! promptly and hand long work off to another task.

use std::sync::{Arc, RwLock};

use dglab_codec::{Envelope, StatusCode};

type MessageHandler = Arc<dyn Fn(&Envelope) + Send + Sync>;
type BindHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(StatusCode, &str) + Send + Sync>;

/// Routes inbound events to the registered handlers.
#[derive(Default)]
pub struct Dispatcher {
    on_message: RwLock<Option<MessageHandler>>,
    on_bind: RwLock<Option<BindHandler>>,
    on_error: RwLock<Option<ErrorHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler for every decoded inbound envelope, called after type-specific
    /// processing.
    pub fn set_on_message<F>(&self, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        store(&self.on_message, Arc::new(handler));
    }

    /// Handler for bind confirmations, called with `(client_id, target_id)`.
    pub fn set_on_bind<F>(&self, handler: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        store(&self.on_bind, Arc::new(handler));
    }

    /// Handler for bind rejections and server errors, called with the status
    /// code and its description.
    pub fn set_on_error<F>(&self, handler: F)
    where
        F: Fn(StatusCode, &str) + Send + Sync + 'static,
    {
        store(&self.on_error, Arc::new(handler));
    }

    /// Remove every registered handler.
    pub fn clear(&self) {
        clear(&self.on_message);
        clear(&self.on_bind);
        clear(&self.on_error);
    }

    pub(crate) fn message(&self, envelope: &Envelope) {
        if let Some(handler) = load(&self.on_message) {
            handler(envelope);
        }
    }

    pub(crate) fn bind(&self, client_id: &str, target_id: &str) {
        if let Some(handler) = load(&self.on_bind) {
            handler(client_id, target_id);
        }
    }

    pub(crate) fn error(&self, code: StatusCode, message: &str) {
        if let Some(handler) = load(&self.on_error) {
            handler(code, message);
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("on_message", &load(&self.on_message).is_some())
            .field("on_bind", &load(&self.on_bind).is_some())
            .field("on_error", &load(&self.on_error).is_some())
            .finish()
    }
}

// The handler is cloned out of the slot before it runs, so a handler may
// re-register handlers without deadlocking.
fn load<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>) -> Option<Arc<T>> {
    slot.read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

fn store<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>, handler: Arc<T>) {
    *slot.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handler);
}

fn clear<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>) {
    *slot.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
}
