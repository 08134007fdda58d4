//! Proxy types (§4.4 "Outgoing", §4.5 "Lookup APIs"): locally synthesized stand-ins for
//! a peer's host entities.
//!
//! Each proxy carries a [`DisposeGuard`](crate::registry::DisposeGuard) rather than
//! relying on a prototype-wide dispose flag, since every instance here is its own Rust
//! value rather than sharing a prototype the way method closures would in a dynamic
//! host environment (§9, "Receiver-bound proxies").

use std::collections::HashMap;
use std::rc::Rc;

use crate::call::{negotiate, CallMode};
use crate::codec;
use crate::descriptor::{ClassDescriptor, FunctionDescriptor, ObjectDescriptor};
use crate::error::{Error, ErrorKind};
use crate::host::Value;
use crate::registry::DisposeGuard;
use crate::session::message::{CallAction, CallType};
use crate::session::{static_target_id, Session};
use crate::value::Json;


fn checked(dispose: &DisposeGuard) -> Result<(), Error> {
    if dispose.is_disposed() {
        Err(Error::new(ErrorKind::Disposed))
    } else {
        Ok(())
    }
}

/// Runs one outgoing call in the engine's three shapes (§4.4, "Outgoing"), returning
/// the settled value for `sync`, nothing yet for `async` (delivered later through
/// `on_settle`), and nothing at all for `void`.
#[allow(clippy::too_many_arguments)]
fn invoke(
    session: &Rc<Session>,
    dispose: &DisposeGuard,
    action: CallAction,
    declared: crate::descriptor::ReturnBehavior,
    obj_id: Option<String>,
    prop: Option<String>,
    args: Vec<Value>,
    on_settle: Option<Box<dyn FnOnce(Result<Value, String>)>>,
) -> Result<Option<Value>, Error> {
    checked(dispose)?;
    let channel = session.channel();
    let mode = negotiate(declared, &channel);
    if !channel.has_sync() && !channel.has_async() && !matches!(mode, CallMode::Void) {
        return Err(Error::new(ErrorKind::NoSendTransport));
    }
    let wire_args: Result<Vec<_>, Error> = args.iter().map(|a| codec::encode(a, session)).collect();
    let wire_args = wire_args?;
    match mode {
        CallMode::Void => {
            session.send_call(&channel, CallType::Void, action, obj_id, prop, wire_args, None);
            Ok(None)
        }
        CallMode::Sync => {
            let raw = session
                .send_call(&channel, CallType::Sync, action, obj_id, prop, wire_args, None)
                .ok_or_else(|| Error::new(ErrorKind::MissingSyncReply))?;
            let envelope: crate::session::message::Envelope =
                serde_json::from_str(&raw).map_err(|e| Error::new(ErrorKind::Codec(e.to_string())))?;
            match envelope.message {
                crate::session::message::WireMessage::FnReply { success, result, .. } => {
                    if success {
                        Ok(Some(codec::decode(result, session)?))
                    } else {
                        let message = match result {
                            crate::value::WireValue::Plain(Json::String(s)) => s,
                            other => format!("{other:?}"),
                        };
                        Err(Error::new(ErrorKind::Remote(message)))
                    }
                }
                _ => Err(Error::new(ErrorKind::MissingMarker)),
            }
        }
        CallMode::Async => {
            let call_id = session.register_pending(on_settle.unwrap_or_else(|| Box::new(|_| {})));
            session.send_call(
                &channel,
                CallType::Async,
                action,
                obj_id,
                prop,
                wire_args,
                Some(call_id),
            );
            Ok(None)
        }
    }
}

/// A proxy for a remote plain object or class instance.
pub struct ProxyObject {
    session: Rc<Session>,
    id: String,
    class_id: String,
    descriptor: ObjectDescriptor,
    dispose: DisposeGuard,
    /// The `readonlyProperties` snapshot captured when this object crossed the boundary
    /// (§3, "`props` is the snapshot of the descriptor's `readonlyProperties`"). Read
    /// directly, with no round trip, since the peer will not re-send it.
    snapshot: HashMap<String, Value>,
}

impl ProxyObject {
    pub(crate) fn new(
        session: Rc<Session>,
        id: String,
        class_id: String,
        descriptor: ObjectDescriptor,
        snapshot: HashMap<String, Value>,
    ) -> Rc<Self> {
        let dispose = DisposeGuard::for_registry(session.proxy_objects.clone(), id.clone());
        Rc::new(Self {
            session,
            id,
            class_id,
            descriptor,
            dispose,
            snapshot,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn is_disposed(&self) -> bool {
        self.dispose.is_disposed()
    }

    pub fn dispose(&self) {
        self.dispose.dispose();
    }

    pub fn get(&self, prop: &str) -> Result<Value, Error> {
        if let Some(value) = self.snapshot.get(prop) {
            return Ok(value.clone());
        }
        let descriptor = self.descriptor.function(&format!("get_{prop}"));
        let result = invoke(
            &self.session,
            &self.dispose,
            CallAction::PropGet,
            descriptor.returns,
            Some(self.id.clone()),
            Some(prop.to_string()),
            Vec::new(),
            None,
        )?;
        result.ok_or_else(|| Error::new(ErrorKind::Codec("prop_get produced no value".into())))
    }

    pub fn set(&self, prop: &str, value: Value) -> Result<(), Error> {
        let descriptor = self.descriptor.function(&format!("set_{prop}"));
        let returns = match descriptor.returns {
            crate::descriptor::ReturnBehavior::Async => crate::descriptor::ReturnBehavior::Void,
            other => other,
        };
        invoke(
            &self.session,
            &self.dispose,
            CallAction::PropSet,
            returns,
            Some(self.id.clone()),
            Some(prop.to_string()),
            vec![value],
            None,
        )?;
        Ok(())
    }

    pub fn call_method(&self, name: &str, args: Vec<Value>) -> Result<Option<Value>, Error> {
        let descriptor = self.descriptor.function(name);
        invoke(
            &self.session,
            &self.dispose,
            CallAction::MethodCall,
            descriptor.returns,
            Some(self.id.clone()),
            Some(name.to_string()),
            args,
            None,
        )
    }

    pub fn call_method_async(
        &self,
        name: &str,
        args: Vec<Value>,
        on_settle: Box<dyn FnOnce(Result<Value, String>)>,
    ) -> Result<(), Error> {
        let descriptor = self.descriptor.function(name);
        invoke(
            &self.session,
            &self.dispose,
            CallAction::MethodCall,
            descriptor.returns,
            Some(self.id.clone()),
            Some(name.to_string()),
            args,
            Some(on_settle),
        )?;
        Ok(())
    }

    /// Registers a callback for this proxy's settlement, for proxies representing the
    /// reserved `Promise` pseudo-class (§3, "Promise symmetry"). The callback fires once,
    /// from the `fn_reply` keyed by this proxy's id.
    pub fn then(&self, on_settle: Box<dyn FnOnce(Result<Value, String>)>) {
        let call_id = self.id.clone();
        self.session.adopt_pending(call_id, on_settle);
    }
}

/// A proxy for a remote function.
pub struct ProxyFunction {
    session: Rc<Session>,
    id: String,
    descriptor: FunctionDescriptor,
    dispose: DisposeGuard,
}

impl ProxyFunction {
    pub(crate) fn new(session: Rc<Session>, id: String, descriptor: FunctionDescriptor) -> Rc<Self> {
        let dispose = DisposeGuard::for_registry(session.proxy_functions.clone(), id.clone());
        Rc::new(Self {
            session,
            id,
            descriptor,
            dispose,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.dispose.is_disposed()
    }

    pub fn dispose(&self) {
        self.dispose.dispose();
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Option<Value>, Error> {
        invoke(
            &self.session,
            &self.dispose,
            CallAction::FnCall,
            self.descriptor.returns,
            Some(self.id.clone()),
            None,
            args,
            None,
        )
    }

    pub fn call_async(&self, args: Vec<Value>, on_settle: Box<dyn FnOnce(Result<Value, String>)>) -> Result<(), Error> {
        invoke(
            &self.session,
            &self.dispose,
            CallAction::FnCall,
            self.descriptor.returns,
            Some(self.id.clone()),
            None,
            args,
            Some(on_settle),
        )?;
        Ok(())
    }
}

/// A synthesized constructor/statics surface for a remote class (§4.5, "For classes:
/// synthesize a constructor ... decorate the constructor itself with static members").
pub struct ProxyClass {
    session: Rc<Session>,
    descriptor: ClassDescriptor,
}

impl ProxyClass {
    pub(crate) fn new(session: Rc<Session>, descriptor: ClassDescriptor) -> Rc<Self> {
        Rc::new(Self { session, descriptor })
    }

    pub fn class_id(&self) -> &str {
        &self.descriptor.class_id
    }

    /// Invokes the remote constructor. Fails with [`ErrorKind::NoConstructor`] if the
    /// class exposes none (§4.5).
    pub fn construct(&self, args: Vec<Value>) -> Result<Value, Error> {
        let ctor = self
            .descriptor
            .ctor
            .clone()
            .ok_or_else(|| Error::new(ErrorKind::NoConstructor(self.descriptor.class_id.clone())))?;
        let guard = DisposeGuard::new(|| {});
        let result = invoke(
            &self.session,
            &guard,
            CallAction::CtorCall,
            ctor.returns,
            Some(self.descriptor.class_id.clone()),
            None,
            args,
            None,
        )?;
        result.ok_or_else(|| Error::new(ErrorKind::Codec("ctor_call produced no value".into())))
    }

    fn static_target(&self) -> String {
        static_target_id(&self.descriptor.class_id)
    }

    pub fn get_static(&self, prop: &str) -> Result<Value, Error> {
        let descriptor = self.descriptor.statics.function(&format!("get_{prop}"));
        let guard = DisposeGuard::new(|| {});
        let result = invoke(
            &self.session,
            &guard,
            CallAction::PropGet,
            descriptor.returns,
            Some(self.static_target()),
            Some(prop.to_string()),
            Vec::new(),
            None,
        )?;
        result.ok_or_else(|| Error::new(ErrorKind::Codec("prop_get produced no value".into())))
    }

    pub fn call_static(&self, name: &str, args: Vec<Value>) -> Result<Option<Value>, Error> {
        let descriptor = self.descriptor.statics.function(name);
        let guard = DisposeGuard::new(|| {});
        invoke(
            &self.session,
            &guard,
            CallAction::MethodCall,
            descriptor.returns,
            Some(self.static_target()),
            Some(name.to_string()),
            args,
            None,
        )
    }
}
