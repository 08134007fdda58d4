//! The channel contract (§6) and a loopback implementation used by tests and the demo
//! app.
//!
//! A channel is "a record with up to three functions" in the design: `sendSync`,
//! `sendAsync`, `receive`. The third function does not need a trait of its own here:
//! `receive` is realized as [`crate::session::Session::receive`], which a transport
//! driver calls directly whenever a message arrives, instead of the session installing
//! a callback into the channel.

use std::rc::Rc;

pub mod memory;

/// A blocking send that waits for a reply.
///
/// Corresponds to `sendSync(msg) -> reply` in §6.
pub trait SendSync {
    /// Sends `msg` and blocks until a reply arrives, or returns `None` if the peer sent
    /// no reply at all (distinct from a reply the codec failed to decode, which is an
    /// error).
    fn send_sync(&self, msg: String) -> Option<String>;
}

/// A non-blocking send.
///
/// Corresponds to `sendAsync(msg)` in §6.
pub trait SendAsync {
    /// Sends `msg` without waiting for anything.
    fn send_async(&self, msg: String);
}

/// A channel binding: up to one synchronous and one asynchronous send transport.
///
/// At least one must be present for an endpoint to originate calls (§6). A channel with
/// neither is legal for an endpoint that only ever receives.
#[derive(Clone, Default)]
pub struct Channel {
    sync: Option<Rc<dyn SendSync>>,
    r#async: Option<Rc<dyn SendAsync>>,
}

impl Channel {
    /// Builds a channel from whichever transports are available.
    pub fn new(sync: Option<Rc<dyn SendSync>>, r#async: Option<Rc<dyn SendAsync>>) -> Self {
        Self { sync, r#async }
    }

    /// A channel with only a synchronous transport.
    pub fn sync_only(sync: Rc<dyn SendSync>) -> Self {
        Self {
            sync: Some(sync),
            r#async: None,
        }
    }

    /// A channel with only an asynchronous transport.
    pub fn async_only(r#async: Rc<dyn SendAsync>) -> Self {
        Self {
            sync: None,
            r#async: Some(r#async),
        }
    }

    /// Whether this channel can perform a blocking send.
    pub fn has_sync(&self) -> bool {
        self.sync.is_some()
    }

    /// Whether this channel can perform a non-blocking send.
    pub fn has_async(&self) -> bool {
        self.r#async.is_some()
    }

    pub(crate) fn send_sync(&self, msg: String) -> Option<String> {
        self.sync.as_ref().and_then(|s| s.send_sync(msg))
    }

    pub(crate) fn send_async(&self, msg: String) {
        if let Some(a) = &self.r#async {
            a.send_async(msg);
        }
    }
}

/// The raw transport-level context surfaced to host functions while they execute
/// (§4.5, "A `currentContext` slot exposes the raw transport event").
///
/// The core does not interpret this value; it is opaque payload supplied by whatever
/// drove the inbound message into [`crate::session::Session::receive`].
#[derive(Clone, Default)]
pub struct Context(pub Option<Rc<dyn std::any::Any>>);

impl Context {
    /// No context (the common case: a call originated locally rather than in response
    /// to an inbound transport event).
    pub fn none() -> Self {
        Self(None)
    }

    /// Wraps an arbitrary value as context.
    pub fn new(value: Rc<dyn std::any::Any>) -> Self {
        Self(Some(value))
    }

    /// Downcasts the context to a concrete type, if present and of that type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|v| v.downcast_ref::<T>())
    }
}
