//! The identifier-generator contract (§6) and the default monotonic generator.
//!
//! The unique-identifier generator itself is named as an external collaborator in the
//! design: a nullary function returning a fresh unique string, called whenever the codec
//! auto-registers a function, promise, or class instance that has no prior id. A
//! [`Session`](crate::session::Session) can be built without supplying one, in which case
//! [`MonotonicIdGenerator`] is used, mirroring how `wl-proxy`'s `SimpleProxy` ships a
//! ready-to-use default instead of forcing every caller to supply every collaborator.

use std::cell::Cell;


/// Produces fresh, endpoint-unique string ids.
///
/// Implementations must never return the same value twice for the lifetime of the
/// endpoint that owns them.
pub trait IdGenerator {
    /// Returns a fresh id.
    fn next_id(&self) -> String;
}

/// The default [`IdGenerator`]: a process-local monotonic counter with a short prefix.
///
/// This satisfies the uniqueness requirement within one endpoint; it makes no promises
/// across endpoints, which the design does not require (ids are only unique *within one
/// endpoint*, per §3 "Identifiers").
pub struct MonotonicIdGenerator {
    prefix: &'static str,
    next: Cell<u64>,
}

impl MonotonicIdGenerator {
    /// Creates a generator that yields `"{prefix}{n}"` for increasing `n`.
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: Cell::new(0),
        }
    }
}

impl Default for MonotonicIdGenerator {
    fn default() -> Self {
        Self::new("o")
    }
}

impl IdGenerator for MonotonicIdGenerator {
    fn next_id(&self) -> String {
        let id = self.next.get();
        self.next.set(id + 1);
        format!("{}{id}", self.prefix)
    }
}
