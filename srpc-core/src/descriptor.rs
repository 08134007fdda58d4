//! The descriptor model (§4.1): the declarative shape of an exposed entity.
//!
//! Descriptors are pure data — no behavior is attached to them here. The three lookup
//! helpers the design calls out (`resolve function by name`, `resolve argument by
//! index`, `resolve event by name`) live on [`ObjectDescriptor`] and
//! [`FunctionDescriptor`] respectively, since every caller needs exactly that lookup and
//! the design requires every implementation to reproduce it identically.

use std::collections::BTreeMap;


/// How a function reports its result, per §3 ("Descriptors").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnBehavior {
    /// No reply is sent; the caller gets nothing back.
    Void,
    /// A blocking call; the caller gets an immediate reply.
    Sync,
    /// A deferred call; the caller gets a value once the peer replies.
    #[default]
    Async,
}

/// Describes one positional argument.
///
/// Arguments may be declared sparsely: only positions that need special handling (most
/// commonly, "this argument is itself a function") need an entry, keyed by `idx`.
#[derive(Debug, Clone, Default)]
pub struct ArgDescriptor {
    /// The zero-based position this descriptor applies to.
    pub idx: usize,
    /// Marks this argument as itself a function crossing the boundary.
    pub is_function: bool,
    /// The nested descriptor for this argument, if it is itself a described object
    /// (used to decode a `prop_set` payload, for instance). The wire's `_rpc_type` tag
    /// already self-describes a plain object's shape on decode, so this is carried for
    /// descriptor consumers that want to introspect the declared shape rather than to
    /// drive decoding itself — the same narrowing `codec` documents for why a decoded
    /// [`crate::host::Value`] does not need an arbitrary tree of tagged values nested
    /// inside a plain object.
    pub nested: Option<Box<ObjectDescriptor>>,
}

/// Describes one exposed function: a free function, method, getter, or setter.
#[derive(Debug, Clone, Default)]
pub struct FunctionDescriptor {
    /// The name this function is exposed under.
    pub name: String,
    /// How results are returned. Defaults to [`ReturnBehavior::Async`] per §3.
    pub returns: ReturnBehavior,
    /// Per-argument sub-descriptors, keyed by position. Most functions need none of
    /// these; they are only present for positions that require special treatment.
    pub args: Vec<ArgDescriptor>,
}

impl FunctionDescriptor {
    /// A bare descriptor carrying only a name, used as the fallback described in §4.1
    /// when a function descriptor cannot be resolved by name.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            returns: ReturnBehavior::default(),
            args: Vec::new(),
        }
    }

    /// Resolves the descriptor for the argument at `idx`, if one was declared. Used by
    /// `call::dispatch` to validate a position declared `is_function` against what
    /// actually decoded there, and to locate an event's listener argument by its
    /// declared `idx` instead of always assuming position zero (§4.4, "Incoming").
    pub fn arg(&self, idx: usize) -> Option<&ArgDescriptor> {
        self.args.iter().find(|a| a.idx == idx)
    }
}

/// Describes one event: a host-side `addEventListener`/`removeEventListener` pair
/// exposed on the wire as `add_<name>`/`remove_<name>` methods (§4.1).
#[derive(Debug, Clone)]
pub struct EventDescriptor {
    /// The event name (without the `add_`/`remove_` prefix).
    pub name: String,
    /// The descriptor for the listener argument, used to decode it on the host side.
    pub listener: Option<ArgDescriptor>,
}

impl EventDescriptor {
    /// The wire method name used to add a listener for this event.
    pub fn add_method(&self) -> String {
        format!("add_{}", self.name)
    }

    /// The wire method name used to remove a listener for this event.
    pub fn remove_method(&self) -> String {
        format!("remove_{}", self.name)
    }
}

/// Behavior for one proxied property: whether reads/writes are forwarded synchronously
/// or asynchronously. `None` means the descriptor defers to the call-mode negotiation
/// rules in §4.4 instead of declaring an explicit behavior.
#[derive(Debug, Clone, Default)]
pub struct ProxiedProperty {
    pub name: String,
    pub getter: Option<FunctionDescriptor>,
    pub setter: Option<FunctionDescriptor>,
}

/// Describes an exposed object: its functions, readonly snapshot properties, proxied
/// (live) properties, and events.
#[derive(Debug, Clone, Default)]
pub struct ObjectDescriptor {
    pub functions: Vec<FunctionDescriptor>,
    pub readonly_properties: Vec<String>,
    pub proxied_properties: Vec<ProxiedProperty>,
    pub events: Vec<EventDescriptor>,
}

impl ObjectDescriptor {
    /// Resolves a function descriptor by name, falling back to a bare `{name}`
    /// descriptor per §4.1 if none was declared.
    pub fn function(&self, name: &str) -> FunctionDescriptor {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .cloned()
            .unwrap_or_else(|| FunctionDescriptor::bare(name))
    }

    /// Resolves a function descriptor by name only if one was explicitly declared,
    /// without falling back to a bare descriptor. Used by the call engine to decide
    /// whether a `method_call` should be treated as a plain member access instead of an
    /// event-pair rewrite (§4.4, "Incoming").
    pub fn declared_function(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Resolves an event descriptor by event name.
    pub fn event(&self, name: &str) -> Option<&EventDescriptor> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Resolves an event descriptor from a wire method name (`add_<name>` /
    /// `remove_<name>`), returning the event and whether it was an add or a remove.
    pub fn event_for_method(&self, method: &str) -> Option<(&EventDescriptor, bool)> {
        if let Some(name) = method.strip_prefix("add_")
            && let Some(e) = self.event(name)
        {
            return Some((e, true));
        }
        if let Some(name) = method.strip_prefix("remove_")
            && let Some(e) = self.event(name)
        {
            return Some((e, false));
        }
        None
    }

    /// Resolves a proxied property by name.
    pub fn proxied_property(&self, name: &str) -> Option<&ProxiedProperty> {
        self.proxied_properties.iter().find(|p| p.name == name)
    }
}

/// Describes an exposed class: an optional constructor, a static surface, and an
/// instance surface, identified by a stable `classId` used in wire tags (§3, §4.3).
#[derive(Debug, Clone, Default)]
pub struct ClassDescriptor {
    pub class_id: String,
    pub ctor: Option<FunctionDescriptor>,
    pub statics: ObjectDescriptor,
    pub instance: ObjectDescriptor,
}

/// The full set of descriptors an endpoint is willing to publish, keyed by id, as
/// exchanged by `get_descriptors`/`descriptors` (§4.5, §6).
#[derive(Debug, Clone, Default)]
pub struct DescriptorTable {
    pub objects: BTreeMap<String, ObjectDescriptor>,
    pub functions: BTreeMap<String, FunctionDescriptor>,
    pub classes: BTreeMap<String, ClassDescriptor>,
}

/// A hook that can walk a descriptor just before it is shipped to the peer, e.g. to
/// capture `readonlyProperties` snapshot values from the live target (§4.1,
/// "Processing hooks").
pub trait DescriptorProcessor {
    /// Called with the object descriptor and its backing target's readonly snapshot
    /// values are expected to already have been captured into `props` by the caller;
    /// implementations may further rewrite the descriptor (e.g. strip members the
    /// current peer isn't allowed to see).
    fn process_object(&self, descriptor: &mut ObjectDescriptor) {
        let _ = descriptor;
    }
}
