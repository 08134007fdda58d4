//! The weak proxy registry (§4.2).
//!
//! Proxies are held weakly so that the registry never keeps a disposed object alive.
//! There is no garbage collector to hook a finalizer into, so the design's own allowance
//! is taken at face value: "a reference-counted handle plus an explicit dispose API
//! satisfies the contract." [`DisposeGuard`] is that explicit dispose path — it rides
//! along inside a proxy and fires exactly once, whether the caller disposes the proxy
//! explicitly or simply drops the last `Rc` to it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

#[cfg(test)]
mod tests;

struct Entry<T> {
    proxy: Weak<T>,
    on_dispose: Option<Box<dyn Fn(&str)>>,
}

/// A registry of live proxies of one kind (objects, functions, or classes), keyed by
/// the id the peer assigned them.
pub struct ProxyRegistry<T> {
    entries: RefCell<HashMap<String, Entry<T>>>,
}

impl<T> Default for ProxyRegistry<T> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl<T> ProxyRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a proxy under `id`, held weakly. `on_dispose`, if given, runs exactly
    /// once when the proxy is disposed, whether via [`Self::notify_dispose`] or by the
    /// caller dropping its last strong reference and the registry subsequently noticing
    /// the slot is dead.
    pub fn register(&self, id: impl Into<String>, proxy: &Rc<T>, on_dispose: Option<Box<dyn Fn(&str)>>) {
        self.entries.borrow_mut().insert(
            id.into(),
            Entry {
                proxy: Rc::downgrade(proxy),
                on_dispose,
            },
        );
    }

    /// Returns whether `id` names a live entry, evicting it first if its proxy has
    /// already been dropped.
    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Looks up a live proxy by id, upgrading the weak reference. A dead entry (its
    /// last strong reference already dropped without going through
    /// [`Self::notify_dispose`]) is evicted as a side effect.
    pub fn get(&self, id: &str) -> Option<Rc<T>> {
        let upgraded = self.entries.borrow().get(id).and_then(|e| e.proxy.upgrade());
        if upgraded.is_none() {
            self.entries.borrow_mut().remove(id);
        }
        upgraded
    }

    /// Removes `id` without running its dispose callback. Used when the peer reports
    /// the backing host object already died (an `obj_died` notice), so there is nothing
    /// left to notify.
    pub fn delete(&self, id: &str) -> bool {
        self.entries.borrow_mut().remove(id).is_some()
    }

    /// Removes `id` and runs its dispose callback, if any. Idempotent: a second call
    /// for the same id is a no-op because the entry is already gone.
    pub fn notify_dispose(&self, id: &str) {
        if let Some(entry) = self.entries.borrow_mut().remove(id)
            && let Some(cb) = entry.on_dispose
        {
            cb(id);
        }
    }

    /// The number of entries still tracked, live or not. Exposed for tests; not part of
    /// the registry's behavioral contract.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Runs a dispose callback exactly once, either when [`Self::dispose`] is called
/// explicitly or when this guard is dropped (e.g. as part of a proxy struct that no
/// longer has any strong references).
///
/// This is the "explicit dispose API" half of the registry's weak-reference contract:
/// a proxy embeds one of these, and it is what actually evicts the proxy's entry from
/// its owning [`ProxyRegistry`] and runs any caller-supplied `on_dispose` hook. Unlike
/// `wl-proxy`'s `run_on_drop::on_drop` guards — which run unconditionally unless
/// `forget()`-ed, fitting a "clean up only on an early-return error path" shape — a
/// proxy needs the opposite default: fire on drop *and* allow firing early, exactly
/// once either way. A plain `Cell` tracking whether the action already ran covers that.
pub struct DisposeGuard {
    action: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl DisposeGuard {
    /// Builds a guard around an arbitrary cleanup action, run the first time it fires,
    /// whether via [`Self::dispose`] or via `Drop`.
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: RefCell::new(Some(Box::new(action))),
        }
    }

    /// Builds a guard that removes `id` from `registry` and runs its `on_dispose` hook
    /// the first time it fires. The usual way a proxy wires itself up to its owning
    /// [`ProxyRegistry`].
    pub fn for_registry<T: 'static>(registry: Rc<ProxyRegistry<T>>, id: String) -> Self {
        Self::new(move || registry.notify_dispose(&id))
    }

    /// Disposes early, before this guard would otherwise be dropped. Idempotent.
    pub fn dispose(&self) {
        if let Some(action) = self.action.borrow_mut().take() {
            action();
        }
    }

    /// Whether [`Self::dispose`] has already run, explicitly or via `Drop`.
    pub fn is_disposed(&self) -> bool {
        self.action.borrow().is_none()
    }
}

impl Drop for DisposeGuard {
    fn drop(&mut self) {
        self.dispose();
    }
}
