//! The wire value: a statically typed rendition of the `_rpc_type` tagged sum from
//! §4.3 and §9 ("Dynamic dispatch") of the design.
//!
//! JS implementations fold this into plain objects carrying a `_rpc_type` discriminant.
//! Here it is a proper `enum`, matched exhaustively by the codec instead of dispatched
//! on a string tag. Serialization is hand-written rather than derived because the tag
//! is only present on three of the four cases: an untagged `Plain` value sits alongside
//! three internally-tagged ones, a shape `serde_derive` cannot express directly.

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::Error as _,
    ser::{Error as _, SerializeMap},
};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;


/// The reserved class id used for promises crossing the wire (§3, §4.3).
pub const PROMISE_CLASS_ID: &str = "Promise";

const TAG: &str = "_rpc_type";

/// A value crossing the boundary between two endpoints.
///
/// This is the wire form produced by [`crate::codec`] and consumed by the call engine.
/// It mirrors the five cases enumerated in §4.3 of the design: scalars pass through,
/// plain objects are walked key by key, functions/host-objects/class-instances carry a
/// `_rpc_type` tag.
#[derive(Debug, Clone)]
pub enum WireValue {
    /// A registered class instance (including the reserved `Promise` pseudo-class).
    Object {
        class_id: String,
        obj_id: String,
        /// Snapshot of the descriptor's `readonlyProperties`, recursively encoded.
        props: BTreeMap<String, WireValue>,
    },
    /// A function, registered into the sender's host-function registry.
    Function { obj_id: String },
    /// A value whose origin is the *receiving* endpoint: resolve it to the local host
    /// entry instead of materializing a new proxy (the identity-preservation rule).
    HostObject { obj_id: String },
    /// Anything else: scalars pass through unchanged. Plain objects/arrays are walked
    /// key by key by the codec before reaching this representation, so by the time a
    /// `Plain` value is stored here it no longer contains untagged nested objects that
    /// need further recursion.
    Plain(Json),
}

impl WireValue {
    /// Convenience constructor for scalars and already-plain JSON values.
    pub fn scalar(v: impl Into<Json>) -> Self {
        WireValue::Plain(v.into())
    }

    /// `true` if this value has no `_rpc_type` tag, i.e. it round-trips through the
    /// codec without touching the registries.
    pub fn is_plain(&self) -> bool {
        matches!(self, WireValue::Plain(_))
    }
}

impl From<Json> for WireValue {
    fn from(v: Json) -> Self {
        WireValue::Plain(v)
    }
}

impl Serialize for WireValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            WireValue::Object {
                class_id,
                obj_id,
                props,
            } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry(TAG, "object")?;
                map.serialize_entry("classId", class_id)?;
                map.serialize_entry("objId", obj_id)?;
                map.serialize_entry("props", props)?;
                map.end()
            }
            WireValue::Function { obj_id } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(TAG, "function")?;
                map.serialize_entry("objId", obj_id)?;
                map.end()
            }
            WireValue::HostObject { obj_id } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(TAG, "hostObject")?;
                map.serialize_entry("objId", obj_id)?;
                map.end()
            }
            WireValue::Plain(json) => {
                if let Json::Object(o) = json
                    && o.contains_key(TAG)
                {
                    return Err(S::Error::custom(format!(
                        "a plain object must not contain the reserved {TAG} key"
                    )));
                }
                json.serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for WireValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = Json::deserialize(deserializer)?;
        wire_value_from_json(json).map_err(D::Error::custom)
    }
}

fn wire_value_from_json(json: Json) -> Result<WireValue, String> {
    let Json::Object(mut obj) = json else {
        return Ok(WireValue::Plain(json));
    };
    let Some(Json::String(tag)) = obj.get(TAG).cloned() else {
        return Ok(WireValue::Plain(Json::Object(obj)));
    };
    match tag.as_str() {
        "object" => {
            let class_id = take_string(&mut obj, "classId")?;
            let obj_id = take_string(&mut obj, "objId")?;
            let props = match obj.remove("props") {
                Some(Json::Object(p)) => p
                    .into_iter()
                    .map(|(k, v)| Ok((k, wire_value_from_json(v)?)))
                    .collect::<Result<BTreeMap<_, _>, String>>()?,
                _ => BTreeMap::new(),
            };
            Ok(WireValue::Object {
                class_id,
                obj_id,
                props,
            })
        }
        "function" => Ok(WireValue::Function {
            obj_id: take_string(&mut obj, "objId")?,
        }),
        "hostObject" => Ok(WireValue::HostObject {
            obj_id: take_string(&mut obj, "objId")?,
        }),
        other => Err(format!("unknown {TAG} discriminant: {other}")),
    }
}

fn take_string(obj: &mut Map<String, Json>, key: &str) -> Result<String, String> {
    match obj.remove(key) {
        Some(Json::String(s)) => Ok(s),
        Some(other) => Err(format!("expected {key} to be a string, got {other}")),
        None => Err(format!("missing {key}")),
    }
}
