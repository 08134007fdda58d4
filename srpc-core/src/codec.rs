//! The message codec (§4.3): converts between a live, decoded [`Value`] and the tagged
//! wire form described in [`crate::value`].
//!
//! A [`Value`] is the boundary between the dynamically-shaped wire protocol and
//! statically-typed Rust: arguments and results are always a single `Value`, rather
//! than an arbitrary tree with functions and proxies nested at any depth inside a plain
//! object the way the untyped original allows. Plain JSON composition (objects, arrays)
//! is carried as-is inside [`Value::Plain`]; anything that needs identity (a function,
//! an object, a class instance) is its own top-level `Value` variant instead of being
//! buried inside a `Plain` tree. This is a deliberate narrowing from the dynamic
//! original, recorded as a design decision rather than left implicit.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, ErrorKind};
use crate::host::Value;
use crate::session::Session;
use crate::value::{Json, WireValue, PROMISE_CLASS_ID};


/// Encodes a decoded value for transmission, auto-registering host functions/objects
/// that have not crossed the boundary before (§4.3).
pub fn encode(value: &Value, session: &Rc<Session>) -> Result<WireValue, Error> {
    match value {
        Value::Plain(json) => Ok(WireValue::Plain(json.clone())),
        Value::HostFunction(f) => {
            let id = session.host.ensure_function(f.clone(), session.id_gen());
            Ok(WireValue::Function { obj_id: id })
        }
        Value::HostObject(obj) => {
            let id = session.host.ensure_object(obj.clone(), session.id_gen());
            let descriptor = obj.descriptor();
            let mut props = std::collections::BTreeMap::new();
            for name in &descriptor.readonly_properties {
                let value = obj.get(name)?;
                props.insert(name.clone(), encode(&value, session)?);
            }
            Ok(WireValue::Object {
                class_id: obj.class_id().unwrap_or_default(),
                obj_id: id,
                props,
            })
        }
        // Auto-registered under a fresh id with the reserved `Promise` classId; the
        // peer materializes a proxy it can `.then()` instead of a plain object proxy
        // (§3, §4.3 "Promise symmetry").
        Value::Deferred(d) => {
            let id = session
                .host
                .ensure_deferred(d.clone(), &session.downgrade(), session.id_gen());
            Ok(WireValue::Object {
                class_id: PROMISE_CLASS_ID.to_string(),
                obj_id: id,
                props: Default::default(),
            })
        }
        // A proxy (or proxy function) sent back across the wire always refers to
        // something the peer already holds locally; tag it so the peer resolves it to
        // the original target instead of minting a second proxy layer (§4.3, "Identity
        // preservation rule").
        Value::Proxy(p) => Ok(WireValue::HostObject { obj_id: p.id().to_string() }),
        Value::ProxyFn(p) => Ok(WireValue::HostObject { obj_id: p.id().to_string() }),
    }
}

/// Decodes a wire value into a live [`Value`], materializing proxies or resolving local
/// host entries as needed (§4.3, "Deserialization is the inverse").
pub fn decode(wire: WireValue, session: &Rc<Session>) -> Result<Value, Error> {
    match wire {
        WireValue::Plain(json) => Ok(Value::Plain(json)),
        WireValue::Function { obj_id } => Ok(Value::ProxyFn(session.get_proxy_function(&obj_id))),
        WireValue::Object { class_id, obj_id, props } => {
            // The readonly snapshot travels with the very first message that mentions
            // this id; later sightings of the same id reuse the cached proxy and its
            // original snapshot, consistent with "at most one proxy per id" (§3).
            let snapshot: HashMap<String, Value> = props
                .into_iter()
                .map(|(k, v)| Ok((k, decode(v, session)?)))
                .collect::<Result<_, Error>>()?;
            let proxy = session.get_proxy_object_with_snapshot(&obj_id, &class_id, snapshot);
            Ok(Value::Proxy(proxy))
        }
        WireValue::HostObject { obj_id } => {
            if let Ok(obj) = session.host.object(&obj_id) {
                Ok(Value::HostObject(obj))
            } else if let Ok(f) = session.host.function(&obj_id) {
                Ok(Value::HostFunction(f))
            } else {
                Err(Error::new(ErrorKind::UnknownHostObject(obj_id)))
            }
        }
    }
}

/// Whether a decoded wire object is the reserved `Promise` pseudo-class (§3,
/// "Promises appear on the wire as class-instance objects with the reserved classId
/// `Promise`").
pub fn is_promise_wire(wire: &WireValue) -> bool {
    matches!(wire, WireValue::Object { class_id, .. } if class_id == PROMISE_CLASS_ID)
}

/// Encodes a plain string as a scalar `Value`, used to carry remote error messages
/// through the same `Value`-shaped path as any other result (§7, "Remote errors").
pub fn error_value(message: impl Into<String>) -> Value {
    Value::Plain(Json::String(message.into()))
}
