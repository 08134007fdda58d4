//! The call engine (§4.4): call-mode negotiation and the host-side action dispatch
//! table. Outgoing call synthesis and the sync/async/void plumbing around it lives on
//! [`crate::proxy`]/[`crate::session::Session`], which own the channel and the
//! correlation map this engine's decisions feed into.

use std::rc::Rc;

use crate::channel::Channel;
use crate::descriptor::{FunctionDescriptor, ReturnBehavior};
use crate::error::{Error, ErrorKind};
use crate::host::{Listener, Value};
use crate::session::message::{CallAction, CallType};
use crate::session::{class_id_of_static_target, Session};
use crate::value::{Json, PROMISE_CLASS_ID};


/// The effective call mode after negotiation against a channel's available transports
/// (§4.4, "Call-mode selection").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    Void,
    Sync,
    Async,
}

impl CallMode {
    pub fn as_call_type(self) -> CallType {
        match self {
            CallMode::Void => CallType::Void,
            CallMode::Sync => CallType::Sync,
            CallMode::Async => CallType::Async,
        }
    }
}

/// Negotiates the effective call mode for a declared return behavior against what the
/// channel can actually do. `void` is never remapped; `async` downgrades to `sync` when
/// there is no async transport; `sync` downgrades to `async` when there is no sync
/// transport.
pub fn negotiate(declared: ReturnBehavior, channel: &Channel) -> CallMode {
    match declared {
        ReturnBehavior::Void => CallMode::Void,
        ReturnBehavior::Sync => {
            if channel.has_sync() {
                CallMode::Sync
            } else {
                CallMode::Async
            }
        }
        ReturnBehavior::Async => {
            if channel.has_async() {
                CallMode::Async
            } else {
                CallMode::Sync
            }
        }
    }
}

/// Checks every argument position a function descriptor marks `is_function` against
/// the values actually decoded for the call, by positional index (§4.1, "resolve an
/// argument descriptor by positional index"). The wire already self-describes whether a
/// value is a function (its `_rpc_type` tag), so this cannot change how an argument
/// decodes — it catches a caller passing the wrong kind of value at a position the
/// descriptor promised would be a listener/callback.
fn check_declared_args(descriptor: &FunctionDescriptor, args: &[Value]) -> Result<(), Error> {
    for idx in 0..args.len() {
        let Some(arg) = descriptor.arg(idx) else { continue };
        if arg.is_function && !matches!(args[idx], Value::ProxyFn(_) | Value::HostFunction(_)) {
            return Err(Error::new(ErrorKind::NotAFunction(format!(
                "{} argument {idx}",
                descriptor.name
            ))));
        }
    }
    Ok(())
}

/// Resolves a call's `objId` to its host target, redirecting the `static:<classId>`
/// addressing a proxy class's constructor surface uses (§4.5, "decorate the constructor
/// itself with static members") to that class's statics object instead of the plain
/// object registry, since a class's statics are never themselves registered there.
fn resolve_target(session: &Rc<Session>, obj_id: &str) -> Result<Rc<dyn crate::host::HostObject>, Error> {
    if let Some(class_id) = class_id_of_static_target(obj_id) {
        Ok(session.host.class(class_id)?.statics())
    } else {
        session.host.object(obj_id)
    }
}

/// Executes one already-resolved host-side action and produces its result value.
///
/// This is the part of "Incoming (host-side)" dispatch (§4.4) that is independent of
/// call mode: resolving the target, deciding between a plain member and an event-pair
/// rewrite, and running it. Packaging the result into a reply (or swallowing it, for
/// `void`) is [`Session::receive`]'s job, since only it knows the call mode and the
/// reply channel.
pub(crate) fn dispatch(
    session: &Rc<Session>,
    call_action: CallAction,
    obj_id: &str,
    prop: Option<&str>,
    args: Vec<Value>,
) -> Result<Value, Error> {
    match call_action {
        CallAction::PropGet => {
            let object = resolve_target(session, obj_id)?;
            let prop = prop.ok_or_else(|| Error::new(ErrorKind::Codec("prop_get missing prop".into())))?;
            object.get(prop)
        }
        CallAction::PropSet => {
            let object = resolve_target(session, obj_id)?;
            let prop = prop.ok_or_else(|| Error::new(ErrorKind::Codec("prop_set missing prop".into())))?;
            let value = args.into_iter().next().unwrap_or(Value::Plain(Json::Null));
            // A promise assignment may need to wait for the value it names instead of
            // storing the promise itself (§4.4, "prop_set"). Exactly which is an
            // explicit Open Question the design resolves as: wait if the declared
            // getter is `async`, or if there is no sync transport to read the settled
            // value back synchronously anyway; otherwise assign the promise as-is.
            if let Value::Proxy(p) = &value
                && p.class_id() == PROMISE_CLASS_ID
            {
                let getter_async = object
                    .descriptor()
                    .proxied_property(prop)
                    .and_then(|pp| pp.getter.as_ref())
                    .is_none_or(|g| g.returns == ReturnBehavior::Async);
                if getter_async || !session.channel().has_sync() {
                    let object = object.clone();
                    let prop = prop.to_string();
                    p.then(Box::new(move |result| {
                        if let Ok(resolved) = result {
                            let _ = object.set(&prop, resolved);
                        }
                    }));
                    return Ok(Value::Plain(Json::Null));
                }
            }
            object.set(prop, value)?;
            Ok(Value::Plain(Json::Null))
        }
        CallAction::MethodCall => {
            let object = resolve_target(session, obj_id)?;
            let prop = prop.ok_or_else(|| Error::new(ErrorKind::Codec("method_call missing prop".into())))?;
            let descriptor = object.descriptor();
            if let Some(declared) = descriptor.declared_function(prop) {
                check_declared_args(declared, &args)?;
                return object.call_method(prop, args);
            }
            if let Some((event, is_add)) = descriptor.event_for_method(prop) {
                // The listener is ordinarily the sole argument, but §4.1 lets an event's
                // listener descriptor be declared at a non-zero `idx`, the same sparse
                // declaration `FunctionDescriptor::arg` honours.
                let listener_idx = event.listener.as_ref().map(|l| l.idx).unwrap_or(0);
                if listener_idx >= args.len() {
                    return Err(Error::new(ErrorKind::NotAFunction(prop.to_string())));
                }
                let listener = match &args[listener_idx] {
                    Value::ProxyFn(p) => {
                        let target = p.clone();
                        // A listener's return value is never observed by the peer (there is no
                        // `add_<event>` reply path back to it), so a `void`/`async` call mode
                        // producing no immediate value is expected, not an error.
                        Listener::new(p.id().to_string(), std::rc::Rc::new(move |args| {
                            Ok(target.call(args)?.unwrap_or(Value::Plain(Json::Null)))
                        }))
                    }
                    Value::HostFunction(f) => {
                        let id = session.host.id_of_function(f).unwrap_or_default();
                        Listener::new(id, f.clone())
                    }
                    _ => return Err(Error::new(ErrorKind::NotAFunction(prop.to_string()))),
                };
                if is_add {
                    object.add_listener(&event.name, listener)?;
                } else {
                    object.remove_listener(&event.name, listener)?;
                }
                return Ok(Value::Plain(Json::Null));
            }
            object.call_method(prop, args)
        }
        CallAction::FnCall => {
            let f = session.host.function(obj_id)?;
            if let Some(descriptor) = session.host.function_descriptor(obj_id) {
                check_declared_args(&descriptor, &args)?;
            }
            f(args)
        }
        CallAction::CtorCall => {
            let class = session.host.class(obj_id)?;
            if let Some(ctor) = class.descriptor().ctor {
                check_declared_args(&ctor, &args)?;
            }
            let instance = class.construct(args)?;
            Ok(Value::HostObject(instance))
        }
    }
}
