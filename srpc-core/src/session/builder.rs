use std::rc::Rc;

use crate::descriptor::DescriptorProcessor;
use crate::ids::{IdGenerator, MonotonicIdGenerator};
use crate::session::Session;

/// A builder for a [`Session`].
///
/// This type can be constructed with [`Session::builder`].
pub struct SessionBuilder {
    id_gen: Option<Box<dyn IdGenerator>>,
    id_prefix: &'static str,
    eager_descriptor_push: bool,
    trace_wire: bool,
    descriptor_processor: Option<Rc<dyn DescriptorProcessor>>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            id_gen: None,
            id_prefix: "o",
            eager_descriptor_push: false,
            trace_wire: false,
            descriptor_processor: None,
        }
    }
}

impl SessionBuilder {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Builds the session.
    ///
    /// The identifier generator is chosen as follows:
    ///
    /// - If [`Self::with_id_generator`] was used, that generator is used.
    /// - Otherwise, a [`MonotonicIdGenerator`] is created, prefixed with whatever
    ///   [`Self::with_id_prefix`] set (empty by default).
    pub fn build(self) -> Rc<Session> {
        let id_gen = self
            .id_gen
            .unwrap_or_else(|| Box::new(MonotonicIdGenerator::new(self.id_prefix)));
        Session::new(
            id_gen,
            self.eager_descriptor_push,
            self.trace_wire,
            self.descriptor_processor,
        )
    }

    /// Supplies a custom identifier generator instead of the default monotonic one.
    pub fn with_id_generator(mut self, id_gen: Box<dyn IdGenerator>) -> Self {
        self.id_gen = Some(id_gen);
        self
    }

    /// Sets the prefix used by the default [`MonotonicIdGenerator`]. Has no effect if
    /// [`Self::with_id_generator`] was also used.
    pub fn with_id_prefix(mut self, prefix: &'static str) -> Self {
        self.id_prefix = prefix;
        self
    }

    /// Pushes this endpoint's descriptor table to the peer as soon as a channel is
    /// bound, instead of waiting for the peer to pull it with `get_descriptors` (§4.5,
    /// "Descriptor exchange").
    pub fn eager_descriptor_push(mut self, eager: bool) -> Self {
        self.eager_descriptor_push = eager;
        self
    }

    /// Logs every message sent and received at `trace` level (§4.6, "Logging").
    pub fn trace_wire(mut self, trace: bool) -> Self {
        self.trace_wire = trace;
        self
    }

    /// Installs a hook that walks each object descriptor just before it is shipped to
    /// the peer, run over every object's and every class's static/instance surface in
    /// the descriptor table (§4.1, "Processing hooks").
    pub fn with_descriptor_processor(mut self, processor: Rc<dyn DescriptorProcessor>) -> Self {
        self.descriptor_processor = Some(processor);
        self
    }
}
