//! The session controller (§4.5): channel binding, descriptor exchange, correlation of
//! deferred calls, and the lookup APIs that turn a remote id into a live proxy.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

#[cfg(feature = "logging")]
use log::{debug, trace, warn};
#[cfg(feature = "logging")]
use error_reporter::Report;

use crate::channel::{Channel, Context};
use crate::codec;
use crate::descriptor::{ClassDescriptor, DescriptorProcessor, DescriptorTable, FunctionDescriptor, ObjectDescriptor};
use crate::error::{Error, ErrorKind};
use crate::host::{HostRegistry, Value};
use crate::ids::{IdGenerator, MonotonicIdGenerator};
use crate::proxy::{ProxyClass, ProxyFunction, ProxyObject};
use crate::registry::ProxyRegistry;

pub mod builder;
pub mod message;
#[cfg(test)]
mod tests;

pub use builder::SessionBuilder;
use message::{CallAction, CallType, Envelope, WireMessage, MARKER};

type SettleFn = Box<dyn FnOnce(Result<Value, String>)>;

/// The "static:" prefix used on the wire to address a class's static surface instead of
/// an instance, since the core has no prototype chain to decorate (§4.5, "Lookup
/// APIs").
pub(crate) fn static_target_id(class_id: &str) -> String {
    format!("static:{class_id}")
}

pub(crate) fn class_id_of_static_target(obj_id: &str) -> Option<&str> {
    obj_id.strip_prefix("static:")
}

/// One endpoint of the RPC core: its channel, its host registries, its proxy
/// registries, and its view of the peer's descriptors.
pub struct Session {
    channel: RefCell<Channel>,
    pub host: HostRegistry,
    pub(crate) proxy_objects: Rc<ProxyRegistry<ProxyObject>>,
    pub(crate) proxy_functions: Rc<ProxyRegistry<ProxyFunction>>,
    proxy_classes: RefCell<HashMap<String, Rc<ProxyClass>>>,
    remote: RefCell<DescriptorTable>,
    pending: RefCell<HashMap<String, SettleFn>>,
    pending_pulls: RefCell<Vec<Box<dyn FnOnce(bool)>>>,
    next_call_id: Cell<u64>,
    id_gen: Box<dyn IdGenerator>,
    current_context: RefCell<Context>,
    eager_descriptor_push: bool,
    trace_wire: bool,
    descriptor_processor: Option<Rc<dyn DescriptorProcessor>>,
}

impl Session {
    /// Starts building a session. See [`SessionBuilder`] for the options it accepts.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    fn new(
        id_gen: Box<dyn IdGenerator>,
        eager_descriptor_push: bool,
        trace_wire: bool,
        descriptor_processor: Option<Rc<dyn DescriptorProcessor>>,
    ) -> Rc<Self> {
        Rc::new(Self {
            channel: RefCell::new(Channel::default()),
            host: HostRegistry::new(),
            proxy_objects: Rc::new(ProxyRegistry::new()),
            proxy_functions: Rc::new(ProxyRegistry::new()),
            proxy_classes: RefCell::new(HashMap::new()),
            remote: RefCell::new(DescriptorTable::default()),
            pending: RefCell::new(HashMap::new()),
            pending_pulls: RefCell::new(Vec::new()),
            next_call_id: Cell::new(0),
            id_gen,
            current_context: RefCell::new(Context::none()),
            eager_descriptor_push,
            trace_wire,
            descriptor_processor,
        })
    }

    /// A weak handle to this session, for collaborators (e.g. a [`crate::host::Deferred`]
    /// watcher) that must not keep it alive (§9, "Cycles and weak references").
    pub fn downgrade(self: &Rc<Self>) -> Weak<Self> {
        Rc::downgrade(self)
    }

    /// Binds (or rebinds) the channel this session sends and receives through.
    pub fn bind_channel(&self, channel: Channel) {
        *self.channel.borrow_mut() = channel;
        if self.eager_descriptor_push {
            self.push_descriptors();
        }
    }

    pub(crate) fn channel(&self) -> Channel {
        self.channel.borrow().clone()
    }

    pub(crate) fn id_gen(&self) -> &dyn IdGenerator {
        self.id_gen.as_ref()
    }

    pub(crate) fn current_context(&self) -> Context {
        self.current_context.borrow().clone()
    }

    pub(crate) fn next_call_id(&self) -> String {
        let id = self.next_call_id.get();
        self.next_call_id.set(id + 1);
        id.to_string()
    }

    fn send_on(&self, channel: &Channel, call_type: CallType, message: WireMessage) -> Option<String> {
        let envelope = Envelope::wrap(message);
        let raw = match serde_json::to_string(&envelope) {
            Ok(raw) => raw,
            Err(_e) => {
                #[cfg(feature = "logging")]
                warn!("failed to encode outgoing message: {}", Report::new(_e));
                return None;
            }
        };
        #[cfg(feature = "logging")]
        if self.trace_wire {
            trace!("send: {raw}");
        }
        match call_type {
            CallType::Sync => channel.send_sync(raw),
            _ => {
                channel.send_async(raw);
                None
            }
        }
    }

    /// The transport-level receive callback (§6, "receive"). A channel implementation
    /// calls this directly whenever a message arrives, rather than the session
    /// installing its own callback into the channel, since Rust closures cannot borrow
    /// `self` across an arbitrary external registration the way a GC'd language can.
    pub fn receive(self: &Rc<Self>, raw: &str, reply: Channel, context: Context) -> Option<String> {
        #[cfg(feature = "logging")]
        if self.trace_wire {
            trace!("recv: {raw}");
        }
        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(e) => e,
            Err(_e) => {
                #[cfg(feature = "logging")]
                debug!("ignoring unparsable message: {}", Report::new(_e));
                return None;
            }
        };
        if envelope.rpc_marker != MARKER {
            #[cfg(feature = "logging")]
            debug!("ignoring message missing the rpc marker");
            return None;
        }
        *self.current_context.borrow_mut() = context;
        let result = self.handle(envelope.message, &reply);
        *self.current_context.borrow_mut() = Context::none();
        result
    }

    fn handle(self: &Rc<Self>, message: WireMessage, reply: &Channel) -> Option<String> {
        match message {
            WireMessage::GetDescriptors { call_type } => {
                let wire = self.local_descriptor_table_wire();
                match call_type {
                    // The sender is blocked on `send_sync` waiting for our return value
                    // to come back as its reply, so answer in place rather than pushing
                    // a separate message on the reply channel (§4.5, "pull prefers
                    // synchronous transport").
                    CallType::Sync => {
                        let envelope = Envelope::wrap(WireMessage::Descriptors(wire));
                        serde_json::to_string(&envelope).ok()
                    }
                    CallType::Void | CallType::Async => {
                        self.send_on(reply, CallType::Async, WireMessage::Descriptors(wire));
                        None
                    }
                }
            }
            WireMessage::Descriptors(table) => {
                self.adopt_remote_descriptors(table);
                for cb in self.pending_pulls.borrow_mut().drain(..) {
                    cb(true);
                }
                None
            }
            WireMessage::ObjDied { obj_id } => {
                self.host.delete_object(&obj_id);
                self.host.delete_function(&obj_id);
                None
            }
            WireMessage::Call {
                call_type,
                obj_id,
                prop,
                args,
                call_id,
                call_action,
            } => self.handle_call(call_type, obj_id, prop, args, call_id, call_action, reply),
            WireMessage::FnReply {
                call_type: _,
                success,
                result,
                call_id,
            } => {
                self.handle_reply(success, result, call_id);
                None
            }
        }
    }

    fn handle_call(
        self: &Rc<Self>,
        call_type: CallType,
        obj_id: Option<String>,
        prop: Option<String>,
        args: Vec<crate::value::WireValue>,
        call_id: Option<String>,
        call_action: CallAction,
        reply: &Channel,
    ) -> Option<String> {
        let obj_id = obj_id.unwrap_or_default();
        let decoded_args: Result<Vec<Value>, Error> = args.into_iter().map(|w| codec::decode(w, self)).collect();
        let outcome =
            decoded_args.and_then(|args| crate::call::dispatch(self, call_action, &obj_id, prop.as_deref(), args));
        match call_type {
            CallType::Void => None,
            CallType::Sync => {
                let (success, result) = self.encode_outcome(outcome);
                let reply_msg = WireMessage::FnReply {
                    call_type: CallType::Sync,
                    success,
                    result,
                    call_id: None,
                };
                let envelope = Envelope::wrap(reply_msg);
                serde_json::to_string(&envelope).ok()
            }
            // A host function may itself return a still-pending [`Deferred`] instead of
            // an already-known value (§4.4, "async: coerce the result into a deferred;
            // on settlement, ... reply asynchronously"). Hold the reply open until it
            // settles rather than encoding it now.
            CallType::Async => match outcome {
                Ok(Value::Deferred(deferred)) => {
                    let session = self.clone();
                    let reply = reply.clone();
                    deferred.on_settle(Box::new(move |result| {
                        let (success, result) = match result {
                            Ok(value) => match codec::encode(&value, &session) {
                                Ok(w) => (true, w),
                                Err(e) => (false, crate::value::WireValue::scalar(e.to_string())),
                            },
                            Err(message) => (false, crate::value::WireValue::scalar(message)),
                        };
                        session.send_on(
                            &reply,
                            CallType::Async,
                            WireMessage::FnReply {
                                call_type: CallType::Async,
                                success,
                                result,
                                call_id,
                            },
                        );
                    }));
                    None
                }
                other => {
                    let (success, result) = self.encode_outcome(other);
                    self.send_on(
                        reply,
                        CallType::Async,
                        WireMessage::FnReply {
                            call_type: CallType::Async,
                            success,
                            result,
                            call_id,
                        },
                    );
                    None
                }
            },
        }
    }

    fn encode_outcome(self: &Rc<Self>, outcome: Result<Value, Error>) -> (bool, crate::value::WireValue) {
        match outcome {
            Ok(value) => match codec::encode(&value, self) {
                Ok(w) => (true, w),
                Err(e) => (false, crate::value::WireValue::scalar(e.to_string())),
            },
            Err(e) => (false, crate::value::WireValue::scalar(e.to_string())),
        }
    }

    fn handle_reply(self: &Rc<Self>, success: bool, result: crate::value::WireValue, call_id: Option<String>) {
        let Some(call_id) = call_id else {
            #[cfg(feature = "logging")]
            warn!("dropping fn_reply with no call id");
            return;
        };
        let Some(settle) = self.pending.borrow_mut().remove(&call_id) else {
            #[cfg(feature = "logging")]
            debug!("dropping fn_reply for unknown call id {call_id}");
            return;
        };
        if success {
            match codec::decode(result, self) {
                Ok(value) => settle(Ok(value)),
                Err(e) => settle(Err(e.to_string())),
            }
        } else {
            let message = match &result {
                crate::value::WireValue::Plain(crate::value::Json::String(s)) => s.clone(),
                other => format!("{other:?}"),
            };
            settle(Err(message));
        }
    }

    /// Registers a resolve/reject continuation for an outgoing async call and returns
    /// the call id it was registered under.
    pub(crate) fn register_pending(&self, settle: SettleFn) -> String {
        let id = self.next_call_id();
        self.pending.borrow_mut().insert(id.clone(), settle);
        id
    }

    /// Registers a resolve/reject continuation under a caller-chosen id rather than a
    /// freshly minted call id. Used by [`crate::proxy::ProxyObject::then`] to hook a
    /// `Promise`-classed proxy's own id into the same correlation map that ordinary
    /// deferred calls use, since a promise's settlement arrives as an `fn_reply` keyed
    /// by that same id (§4.3, "Promise symmetry").
    pub(crate) fn adopt_pending(&self, id: String, settle: SettleFn) {
        self.pending.borrow_mut().insert(id, settle);
    }

    /// Sends a message on the async transport if there is one, falling back to the sync
    /// transport otherwise. Used for notifications with no caller waiting on a
    /// particular reply path: promise settlement and `obj_died` (§9, "`obj_died` is
    /// sent on the async transport regardless of the original call's channel; if only
    /// sync transport is available, the notice falls back to sync").
    fn notify(&self, message: WireMessage) {
        let channel = self.channel();
        if channel.has_async() {
            self.send_on(&channel, CallType::Async, message);
        } else if channel.has_sync() {
            self.send_on(&channel, CallType::Sync, message);
        }
    }

    /// Sends the `fn_reply` that settles a promise this endpoint created and handed to
    /// the peer (§4.3, "Promise symmetry").
    pub(crate) fn settle_promise(self: &Rc<Self>, promise_id: &str, result: Result<Value, String>) {
        let (success, result) = match result {
            Ok(value) => match codec::encode(&value, self) {
                Ok(w) => (true, w),
                Err(e) => (false, crate::value::WireValue::scalar(e.to_string())),
            },
            Err(message) => (false, crate::value::WireValue::scalar(message)),
        };
        self.notify(WireMessage::FnReply {
            call_type: CallType::Async,
            success,
            result,
            call_id: Some(promise_id.to_string()),
        });
    }

    /// Tells the peer a proxy on this side disposed of its target, so it can drop the
    /// corresponding host entry (§4.2, "`obj_died`"), ignoring whatever call mode
    /// originally produced the object.
    pub(crate) fn notify_obj_died(self: &Rc<Self>, obj_id: &str) {
        self.notify(WireMessage::ObjDied {
            obj_id: obj_id.to_string(),
        });
    }

    pub(crate) fn send_call(
        &self,
        channel: &Channel,
        call_type: CallType,
        call_action: CallAction,
        obj_id: Option<String>,
        prop: Option<String>,
        args: Vec<crate::value::WireValue>,
        call_id: Option<String>,
    ) -> Option<String> {
        self.send_on(
            channel,
            call_type,
            WireMessage::Call {
                call_type,
                obj_id,
                prop,
                args,
                call_id,
                call_action,
            },
        )
    }

    /// Pulls the peer's descriptors. Prefers a synchronous round trip; falls back to
    /// sending the request asynchronously and invoking `on_done` once a `descriptors`
    /// push is received (§4.5, "Descriptor exchange").
    pub fn pull_descriptors(self: &Rc<Self>, on_done: Option<Box<dyn FnOnce(bool)>>) -> Option<bool> {
        let channel = self.channel();
        if channel.has_sync() {
            let reply = self.send_on(
                &channel,
                CallType::Sync,
                WireMessage::GetDescriptors { call_type: CallType::Sync },
            );
            let ok = reply
                .and_then(|raw| serde_json::from_str::<Envelope>(&raw).ok())
                .map(|e| {
                    if let WireMessage::Descriptors(table) = e.message {
                        self.adopt_remote_descriptors(table);
                        true
                    } else {
                        false
                    }
                })
                .unwrap_or(false);
            if let Some(cb) = on_done {
                cb(ok);
            }
            Some(ok)
        } else if channel.has_async() {
            if let Some(cb) = on_done {
                self.pending_pulls.borrow_mut().push(cb);
            }
            self.send_on(
                &channel,
                CallType::Async,
                WireMessage::GetDescriptors { call_type: CallType::Async },
            );
            None
        } else {
            if let Some(cb) = on_done {
                cb(false);
            }
            Some(false)
        }
    }

    /// Pushes this endpoint's descriptor table to the peer without being asked.
    pub fn push_descriptors(&self) {
        let channel = self.channel();
        let wire = self.local_descriptor_table_wire();
        if channel.has_async() {
            self.send_on(&channel, CallType::Async, WireMessage::Descriptors(wire));
        } else if channel.has_sync() {
            self.send_on(&channel, CallType::Sync, WireMessage::Descriptors(wire));
        }
    }

    /// Runs the configured [`DescriptorProcessor`] over an object descriptor, if one was
    /// installed (§4.1, "Processing hooks"). A no-op otherwise.
    fn process_object(&self, mut descriptor: ObjectDescriptor) -> ObjectDescriptor {
        if let Some(processor) = &self.descriptor_processor {
            processor.process_object(&mut descriptor);
        }
        descriptor
    }

    fn local_descriptor_table_wire(&self) -> message::DescriptorTableWire {
        message::DescriptorTableWire {
            objects: self
                .host
                .all_object_descriptors()
                .into_iter()
                .map(|(id, d)| (id, message::object_to_wire(&self.process_object(d))))
                .collect(),
            functions: self
                .host
                .all_function_descriptors()
                .into_iter()
                .map(|(id, descriptor)| (id, message::function_to_wire(&descriptor)))
                .collect(),
            classes: self
                .host
                .all_class_descriptors()
                .into_iter()
                .map(|(id, mut d)| {
                    d.statics = self.process_object(d.statics);
                    d.instance = self.process_object(d.instance);
                    (id, message::class_to_wire(&d))
                })
                .collect(),
        }
    }

    fn adopt_remote_descriptors(&self, wire: message::DescriptorTableWire) {
        let mut table = self.remote.borrow_mut();
        for (id, o) in wire.objects {
            table.objects.insert(id, message::wire_to_object(&o));
        }
        for (id, f) in wire.functions {
            table.functions.insert(id, message::wire_to_function(&f));
        }
        for (id, c) in wire.classes {
            table.classes.insert(id, message::wire_to_class(&c));
        }
    }

    pub(crate) fn remote_object_descriptor(&self, id: &str) -> Option<ObjectDescriptor> {
        self.remote.borrow().objects.get(id).cloned()
    }

    pub(crate) fn remote_function_descriptor(&self, id: &str) -> Option<FunctionDescriptor> {
        self.remote.borrow().functions.get(id).cloned()
    }

    pub(crate) fn remote_class_descriptor(&self, class_id: &str) -> Option<ClassDescriptor> {
        self.remote.borrow().classes.get(class_id).cloned()
    }

    /// Consults the weak proxy registry, then the remote descriptor cache, to return
    /// the (possibly freshly materialized) proxy object for `id` (§4.5, "Lookup APIs").
    pub fn get_proxy_object(self: &Rc<Self>, id: &str, class_id: &str) -> Rc<ProxyObject> {
        self.get_proxy_object_with_snapshot(id, class_id, HashMap::new())
    }

    /// Like [`Self::get_proxy_object`], but seeds a freshly materialized proxy with the
    /// `readonlyProperties` snapshot carried by the wire message that introduced it
    /// (§3). Has no effect if the id already has a live proxy, since the snapshot is
    /// only ever captured once, at first sight.
    pub(crate) fn get_proxy_object_with_snapshot(
        self: &Rc<Self>,
        id: &str,
        class_id: &str,
        snapshot: HashMap<String, Value>,
    ) -> Rc<ProxyObject> {
        if let Some(existing) = self.proxy_objects.get(id) {
            return existing;
        }
        let descriptor = self
            .remote_object_descriptor(id)
            .or_else(|| self.remote_class_descriptor(class_id).map(|c| c.instance))
            .unwrap_or_default();
        let proxy = ProxyObject::new(self.clone(), id.to_string(), class_id.to_string(), descriptor, snapshot);
        let weak = self.downgrade();
        self.proxy_objects.register(
            id.to_string(),
            &proxy,
            Some(Box::new(move |id| {
                if let Some(session) = weak.upgrade() {
                    session.notify_obj_died(id);
                }
            })),
        );
        proxy
    }

    pub fn get_proxy_function(self: &Rc<Self>, id: &str) -> Rc<ProxyFunction> {
        if let Some(existing) = self.proxy_functions.get(id) {
            return existing;
        }
        let descriptor = self.remote_function_descriptor(id).unwrap_or_else(|| FunctionDescriptor::bare(id));
        let proxy = ProxyFunction::new(self.clone(), id.to_string(), descriptor);
        let weak = self.downgrade();
        self.proxy_functions.register(
            id.to_string(),
            &proxy,
            Some(Box::new(move |id| {
                if let Some(session) = weak.upgrade() {
                    session.notify_obj_died(id);
                }
            })),
        );
        proxy
    }

    /// Synthesizes (and caches) the constructor/statics surface for a remote class.
    pub fn get_proxy_class(self: &Rc<Self>, class_id: &str) -> Result<Rc<ProxyClass>, Error> {
        if let Some(existing) = self.proxy_classes.borrow().get(class_id) {
            return Ok(existing.clone());
        }
        let descriptor = self
            .remote_class_descriptor(class_id)
            .ok_or_else(|| Error::new(ErrorKind::UnknownRemoteClass(class_id.to_string())))?;
        let proxy = ProxyClass::new(self.clone(), descriptor);
        self.proxy_classes.borrow_mut().insert(class_id.to_string(), proxy.clone());
        Ok(proxy)
    }
}
