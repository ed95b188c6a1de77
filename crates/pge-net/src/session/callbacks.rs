//! Application hooks invoked by session loops.
//!
//! Each event kind has exactly one slot holding an optional hook. Setting a
//! slot replaces whatever was there; there is no multi-subscriber fan-out.
//! Hooks run on the session's tick loop, so they should return quickly.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Result;
use crate::error::NetworkError;
use crate::logging::targets;
use crate::transport::Endpoint;

/// Produces the payload sent to one endpoint on a tick.
pub type SendHook<T> = dyn Fn(&Endpoint) -> T + Send + Sync;
/// Receives a decoded payload and the endpoint it came from.
pub type ReceiveHook<T> = dyn Fn(&T, &Endpoint) + Send + Sync;
/// Notified when an endpoint connects or disconnects.
pub type EndpointHook = dyn Fn(&Endpoint) + Send + Sync;
/// Notified of recoverable errors inside a session loop.
pub type ErrorHook = dyn Fn(&NetworkError) + Send + Sync;

/// Names a callback slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    /// Payload producer, called once per endpoint per tick.
    Send,
    /// Called for every decoded application payload.
    Received,
    /// Called when a new endpoint is first heard from.
    Connected,
    /// Called when an endpoint is dropped for silence.
    Disconnected,
    /// Called for recoverable loop errors.
    Error,
}

impl CallbackKind {
    /// Short lowercase name of the slot.
    pub fn name(&self) -> &'static str {
        match self {
            CallbackKind::Send => "send",
            CallbackKind::Received => "received",
            CallbackKind::Connected => "connected",
            CallbackKind::Disconnected => "disconnected",
            CallbackKind::Error => "error",
        }
    }
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single optional hook.
///
/// The hook is cloned out of the slot before it runs, so a hook may set or
/// clear slots (including its own) without deadlocking.
pub struct CallbackSlot<F: ?Sized> {
    hook: Mutex<Option<Arc<F>>>,
}

impl<F: ?Sized> CallbackSlot<F> {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self {
            hook: Mutex::new(None),
        }
    }

    /// Install `hook`, replacing any previous one.
    pub fn set(&self, hook: Arc<F>) {
        *self.hook.lock() = Some(hook);
    }

    /// Remove the hook.
    pub fn clear(&self) {
        *self.hook.lock() = None;
    }

    /// The current hook, if any.
    pub fn get(&self) -> Option<Arc<F>> {
        self.hook.lock().clone()
    }

    /// Whether a hook is installed.
    pub fn is_set(&self) -> bool {
        self.hook.lock().is_some()
    }
}

impl<F: ?Sized> Default for CallbackSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for CallbackSlot<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSlot")
            .field("is_set", &self.is_set())
            .finish()
    }
}

impl CallbackSlot<ErrorHook> {
    /// Hand `error` to the hook, if one is installed.
    ///
    /// A panicking error hook is logged and otherwise ignored.
    pub(crate) fn report(&self, error: &NetworkError) {
        if let Some(hook) = self.get()
            && let Err(e) = guarded(CallbackKind::Error, || hook(error))
        {
            tracing::warn!(target: targets::NET, error = %e, "error hook failed");
        }
    }
}

/// The hook slots of a server session.
pub struct ServerCallbacks<T> {
    pub(crate) on_send: CallbackSlot<SendHook<T>>,
    pub(crate) on_receive: CallbackSlot<ReceiveHook<T>>,
    pub(crate) on_connect: CallbackSlot<EndpointHook>,
    pub(crate) on_disconnect: CallbackSlot<EndpointHook>,
    pub(crate) on_error: CallbackSlot<ErrorHook>,
}

impl<T> ServerCallbacks<T> {
    /// Create a registry with every slot empty.
    pub fn new() -> Self {
        Self {
            on_send: CallbackSlot::new(),
            on_receive: CallbackSlot::new(),
            on_connect: CallbackSlot::new(),
            on_disconnect: CallbackSlot::new(),
            on_error: CallbackSlot::new(),
        }
    }

    /// Clear the slot named by `kind`.
    pub fn unset(&self, kind: CallbackKind) {
        match kind {
            CallbackKind::Send => self.on_send.clear(),
            CallbackKind::Received => self.on_receive.clear(),
            CallbackKind::Connected => self.on_connect.clear(),
            CallbackKind::Disconnected => self.on_disconnect.clear(),
            CallbackKind::Error => self.on_error.clear(),
        }
    }

    /// Whether the slot named by `kind` holds a hook.
    pub fn is_set(&self, kind: CallbackKind) -> bool {
        match kind {
            CallbackKind::Send => self.on_send.is_set(),
            CallbackKind::Received => self.on_receive.is_set(),
            CallbackKind::Connected => self.on_connect.is_set(),
            CallbackKind::Disconnected => self.on_disconnect.is_set(),
            CallbackKind::Error => self.on_error.is_set(),
        }
    }
}

impl<T> Default for ServerCallbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ServerCallbacks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCallbacks")
            .field("on_send", &self.on_send)
            .field("on_receive", &self.on_receive)
            .field("on_connect", &self.on_connect)
            .field("on_disconnect", &self.on_disconnect)
            .field("on_error", &self.on_error)
            .finish()
    }
}

/// Run `f`, turning a panic into [`NetworkError::Callback`].
pub(crate) fn guarded<R>(kind: CallbackKind, f: impl FnOnce() -> R) -> Result<R> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| NetworkError::Callback {
        kind: kind.name(),
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
