//! The crate's error taxonomy.
//!
//! Every error that a caller of this crate can observe is folded into [`Error`]. Remote
//! errors (§7 "Remote errors" of the design) are deliberately *not* part of this enum:
//! they cross the wire as plain strings and are re-raised as
//! [`ErrorKind::Remote`], which only carries that string.

use {std::fmt::Debug, thiserror::Error};

/// An error produced by this crate.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(#[from] pub(crate) ErrorKind);

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self(kind)
    }

    /// Returns the kind of this error, for callers that want to match on specific
    /// failures instead of just displaying them.
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }
}

/// The specific failure behind an [`Error`].
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// No host object is registered under this id.
    #[error("no host object is registered under id {0}")]
    UnknownHostObject(String),
    /// No host function is registered under this id.
    #[error("no host function is registered under id {0}")]
    UnknownHostFunction(String),
    /// No host class is registered under this id.
    #[error("no host class is registered under id {0}")]
    UnknownHostClass(String),
    /// The peer has no descriptor for this class id.
    #[error("no remote descriptor for class {0}")]
    UnknownRemoteClass(String),
    /// A class was constructed but exposes no constructor.
    #[error("class {0} has no exposed constructor")]
    NoConstructor(String),
    /// A `method_call`/`prop_get`/`prop_set` named a property that does not resolve to a
    /// callable function and has no matching event pair.
    #[error("{0} is not a function")]
    NotAFunction(String),
    /// Emitted an outgoing `sync` call but the channel has no synchronous transport and
    /// no fallback is possible (fallback already exhausted because `void` cannot be
    /// remapped).
    #[error("the channel has no synchronous transport")]
    NoSyncTransport,
    /// Emitted an outgoing call but the channel has no means to send at all.
    #[error("the channel has no send transport")]
    NoSendTransport,
    /// A sync call got no reply from the channel.
    #[error("no reply was received for a synchronous call")]
    MissingSyncReply,
    /// An inbound message is missing the wire marker and was ignored; surfaced only to
    /// callers that explicitly decode a raw message outside the receive handler.
    #[error("message is missing the rpc marker")]
    MissingMarker,
    /// A sync reply carried `success:false`; the remote error message is preserved here.
    /// Also the shape produced by a rejected/failed deferred call.
    #[error("{0}")]
    Remote(String),
    /// Attempted to invoke a proxy after it has been disposed.
    #[error("the proxy has been disposed")]
    Disposed,
    /// A reply arrived whose `callId` does not match any in-flight deferred call.
    #[error("no in-flight call with id {0}")]
    UnknownCallId(String),
    /// A wire value could not be decoded into the shape the descriptor expected.
    #[error("failed to decode a wire value: {0}")]
    Codec(String),
    /// Serializing a value to send it failed; the session continues (§7).
    #[error("failed to encode a value: {0}")]
    Encode(String),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
