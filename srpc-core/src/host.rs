//! Host-side entries: the local objects, functions, and classes an endpoint has
//! registered for its peer to reach (§3, "Entity kinds").
//!
//! A host target is stamped with its own id the first time it crosses the boundary, so
//! that re-serializing the same `Rc` later reuses the id instead of minting a second one
//! (§3, "A host target is stamped with its own id so re-serializations are idempotent").
//! Since an arbitrary `Rc<dyn HostObject>` cannot carry extra fields of our choosing,
//! the stamp is kept in a side table keyed by the `Rc`'s pointer identity, the same
//! trick a `WeakMap<object, id>` would play in a dynamic host environment.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::descriptor::{ClassDescriptor, FunctionDescriptor, ObjectDescriptor};
use crate::error::{Error, ErrorKind};
use crate::session::Session;
use crate::value::Json;

#[cfg(test)]
mod tests;

/// A decoded, live value flowing through host calls and proxy calls alike: either a
/// plain JSON scalar/array/object, a handle to the peer's object/function (a proxy), a
/// handle to one of this endpoint's own host entries sent back to it (§4.3, "Identity
/// preservation rule"), or a still-unsettled local promise (§3, "Promises appear on the
/// wire as class-instance objects with the reserved classId `Promise`").
#[derive(Clone)]
pub enum Value {
    Plain(Json),
    Proxy(Rc<crate::proxy::ProxyObject>),
    ProxyFn(Rc<crate::proxy::ProxyFunction>),
    HostObject(Rc<dyn HostObject>),
    HostFunction(HostFn),
    Deferred(Rc<Deferred>),
}

impl Value {
    pub fn plain(v: impl Into<Json>) -> Self {
        Value::Plain(v.into())
    }

    /// Best-effort conversion to plain JSON, used when a value must be treated as an
    /// opaque scalar (e.g. a reply's top-level `success` flag).
    pub fn as_plain(&self) -> Option<&Json> {
        match self {
            Value::Plain(j) => Some(j),
            _ => None,
        }
    }
}

/// A host function: a plain closure invoked with already-decoded arguments.
///
/// Modeled as a callback rather than a trait so that ordinary closures can be
/// registered directly, matching how the design treats "functions" as first-class
/// values rather than requiring an interface implementation.
pub type HostFn = Rc<dyn Fn(Vec<Value>) -> Result<Value, Error>>;

/// A listener resolved from a `method_call` rewritten to `add_<event>`/`remove_<event>`
/// (§4.1, §4.4). Carries the id the listener was registered under on the sender's side
/// so a [`HostObject`] can match a later `remove_<event>` call against the same
/// listener that a prior `add_<event>` installed, the way comparing function identity
/// would in a dynamic host environment.
pub struct Listener {
    id: String,
    call: HostFn,
}

impl Listener {
    pub fn new(id: impl Into<String>, call: HostFn) -> Self {
        Self { id: id.into(), call }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Value, Error> {
        (self.call)(args)
    }
}

/// A host-side promise (§3, §4.3 "Promise symmetry", §9 "Dynamic dispatch"): the
/// statically typed stand-in for a value the host does not have yet. Settling it
/// either runs watchers registered locally (if it never crossed the boundary) or
/// triggers the `fn_reply` the design requires once it has been auto-registered by the
/// codec (§4.3, "their eventual settlement is delivered as an `fn_reply`").
pub struct Deferred {
    state: RefCell<DeferredState>,
}

enum DeferredState {
    Pending(Vec<Box<dyn FnOnce(Result<Value, String>)>>),
    Settled(Result<Value, String>),
}

impl Default for Deferred {
    fn default() -> Self {
        Self {
            state: RefCell::new(DeferredState::Pending(Vec::new())),
        }
    }
}

impl Deferred {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn resolve(self: &Rc<Self>, value: Value) {
        self.settle(Ok(value));
    }

    pub fn reject(self: &Rc<Self>, message: impl Into<String>) {
        self.settle(Err(message.into()));
    }

    fn settle(&self, result: Result<Value, String>) {
        let watchers = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(&mut *state, DeferredState::Settled(result.clone())) {
                DeferredState::Pending(watchers) => watchers,
                // Settling twice is a no-op; the first settlement already ran the watchers.
                DeferredState::Settled(settled) => {
                    *state = DeferredState::Settled(settled);
                    return;
                }
            }
        };
        for watcher in watchers {
            watcher(result.clone());
        }
    }

    /// Registers a watcher that fires exactly once: immediately, if this promise has
    /// already settled, or when [`Self::resolve`]/[`Self::reject`] is next called.
    pub fn on_settle(self: &Rc<Self>, watcher: Box<dyn FnOnce(Result<Value, String>)>) {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            DeferredState::Pending(watchers) => watchers.push(watcher),
            DeferredState::Settled(result) => {
                let result = result.clone();
                drop(state);
                watcher(result);
            }
        }
    }
}

/// A host object: something exposing properties, methods, and events to the peer.
pub trait HostObject {
    fn descriptor(&self) -> ObjectDescriptor;
    /// The `classId` this instance was constructed under, if any (§3, §4.3). Plain
    /// objects that were never produced by a [`HostClass`] constructor return `None`,
    /// which the codec encodes as an empty `classId`.
    fn class_id(&self) -> Option<String> {
        None
    }
    fn get(&self, prop: &str) -> Result<Value, Error>;
    fn set(&self, prop: &str, value: Value) -> Result<(), Error>;
    fn call_method(&self, name: &str, args: Vec<Value>) -> Result<Value, Error>;
    fn add_listener(&self, _event: &str, _listener: Listener) -> Result<(), Error> {
        Ok(())
    }
    fn remove_listener(&self, _event: &str, _listener: Listener) -> Result<(), Error> {
        Ok(())
    }
}

/// A host class: a constructor plus a static surface, identified by `classId`.
pub trait HostClass {
    fn descriptor(&self) -> ClassDescriptor;
    fn construct(&self, args: Vec<Value>) -> Result<Rc<dyn HostObject>, Error>;
    fn statics(&self) -> Rc<dyn HostObject>;
}

fn ptr_key<T: ?Sized>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

/// The id-keyed maps an endpoint keeps for its own host entries, plus the
/// pointer-identity side tables used to stamp auto-registered targets idempotently.
#[derive(Default)]
pub struct HostRegistry {
    objects: RefCell<HashMap<String, Rc<dyn HostObject>>>,
    functions: RefCell<HashMap<String, (HostFn, FunctionDescriptor)>>,
    classes: RefCell<HashMap<String, Rc<dyn HostClass>>>,
    deferreds: RefCell<HashMap<String, Rc<Deferred>>>,
    object_ids: RefCell<HashMap<usize, String>>,
    function_ids: RefCell<HashMap<usize, String>>,
    deferred_ids: RefCell<HashMap<usize, String>>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `object` under `id` explicitly (the top-level registration case).
    pub fn register_object(&self, id: impl Into<String>, object: Rc<dyn HostObject>) {
        let id = id.into();
        self.object_ids.borrow_mut().insert(ptr_key(&object), id.clone());
        self.objects.borrow_mut().insert(id, object);
    }

    /// Registers a top-level function under `id` with the default (`async`) return
    /// behavior. Use [`Self::register_function_with_descriptor`] to declare `sync` or
    /// `void` instead.
    pub fn register_function(&self, id: impl Into<String>, function: HostFn) {
        let id = id.into();
        let descriptor = FunctionDescriptor::bare(id.clone());
        self.register_function_with_descriptor(id, function, descriptor);
    }

    /// Registers a top-level function under `id` with an explicit descriptor, so its
    /// declared return behavior (§3, "Descriptors") survives the descriptor exchange
    /// and the call engine can negotiate the right call mode for it.
    pub fn register_function_with_descriptor(&self, id: impl Into<String>, function: HostFn, descriptor: FunctionDescriptor) {
        let id = id.into();
        self.function_ids.borrow_mut().insert(ptr_key(&function), id.clone());
        self.functions.borrow_mut().insert(id, (function, descriptor));
    }

    pub fn register_class(&self, id: impl Into<String>, class: Rc<dyn HostClass>) {
        self.classes.borrow_mut().insert(id.into(), class);
    }

    /// Returns the id already stamped on `object`, if any.
    pub fn id_of_object(&self, object: &Rc<dyn HostObject>) -> Option<String> {
        self.object_ids.borrow().get(&ptr_key(object)).cloned()
    }

    pub fn id_of_function(&self, function: &HostFn) -> Option<String> {
        self.function_ids.borrow().get(&ptr_key(function)).cloned()
    }

    /// Registers `object` under a freshly generated id unless it already has one,
    /// returning the (possibly pre-existing) id. This is the codec's auto-registration
    /// path for values crossing the boundary without prior explicit registration.
    pub fn ensure_object(&self, object: Rc<dyn HostObject>, id_gen: &dyn crate::ids::IdGenerator) -> String {
        if let Some(id) = self.id_of_object(&object) {
            return id;
        }
        let id = id_gen.next_id();
        self.register_object(id.clone(), object);
        id
    }

    pub fn ensure_function(&self, function: HostFn, id_gen: &dyn crate::ids::IdGenerator) -> String {
        if let Some(id) = self.id_of_function(&function) {
            return id;
        }
        let id = id_gen.next_id();
        self.register_function(id.clone(), function);
        id
    }

    /// Registers `deferred` under a freshly generated id unless it already has one, and
    /// arms it so its eventual settlement emits the `fn_reply` the peer is waiting for
    /// (§4.3, "Promise symmetry"). Holds only a [`Weak`] reference to `session` in the
    /// settlement watcher so a promise that never settles does not pin the session
    /// alive (§9, "Cycles and weak references").
    pub fn ensure_deferred(&self, deferred: Rc<Deferred>, session: &Weak<Session>, id_gen: &dyn crate::ids::IdGenerator) -> String {
        if let Some(id) = self.deferred_ids.borrow().get(&ptr_key(&deferred)).cloned() {
            return id;
        }
        let id = id_gen.next_id();
        self.deferred_ids.borrow_mut().insert(ptr_key(&deferred), id.clone());
        let watcher_session = session.clone();
        let watcher_id = id.clone();
        deferred.on_settle(Box::new(move |result| {
            if let Some(session) = watcher_session.upgrade() {
                session.settle_promise(&watcher_id, result);
            }
        }));
        self.deferreds.borrow_mut().insert(id.clone(), deferred);
        id
    }

    pub fn object(&self, id: &str) -> Result<Rc<dyn HostObject>, Error> {
        self.objects
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::UnknownHostObject(id.to_string())))
    }

    pub fn function(&self, id: &str) -> Result<HostFn, Error> {
        self.functions
            .borrow()
            .get(id)
            .map(|(f, _)| f.clone())
            .ok_or_else(|| Error::new(ErrorKind::UnknownHostFunction(id.to_string())))
    }

    /// The descriptor a host function was registered with, used to validate declared
    /// function-typed argument positions before invoking it (§4.1, "resolve an argument
    /// descriptor by positional index").
    pub fn function_descriptor(&self, id: &str) -> Option<FunctionDescriptor> {
        self.functions.borrow().get(id).map(|(_, d)| d.clone())
    }

    pub fn class(&self, id: &str) -> Result<Rc<dyn HostClass>, Error> {
        self.classes
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::UnknownHostClass(id.to_string())))
    }

    /// All currently registered host objects, id paired with their descriptor. Used to
    /// build the outgoing descriptor table (§4.5, "Descriptor exchange").
    pub(crate) fn all_object_descriptors(&self) -> Vec<(String, ObjectDescriptor)> {
        self.objects
            .borrow()
            .iter()
            .map(|(id, o)| (id.clone(), o.descriptor()))
            .collect()
    }

    pub(crate) fn all_function_descriptors(&self) -> Vec<(String, FunctionDescriptor)> {
        self.functions
            .borrow()
            .iter()
            .map(|(id, (_, d))| (id.clone(), d.clone()))
            .collect()
    }

    pub(crate) fn all_class_descriptors(&self) -> Vec<(String, ClassDescriptor)> {
        self.classes
            .borrow()
            .iter()
            .map(|(id, c)| (id.clone(), c.descriptor()))
            .collect()
    }

    /// Removes a host object entry, e.g. on explicit takedown or after the owning
    /// endpoint decides it should no longer be reachable.
    pub fn delete_object(&self, id: &str) -> bool {
        if let Some(obj) = self.objects.borrow_mut().remove(id) {
            self.object_ids.borrow_mut().remove(&ptr_key(&obj));
            true
        } else {
            false
        }
    }

    pub fn delete_function(&self, id: &str) -> bool {
        if let Some((f, _)) = self.functions.borrow_mut().remove(id) {
            self.function_ids.borrow_mut().remove(&ptr_key(&f));
            true
        } else {
            false
        }
    }
}
