//! The wire message envelope (§6, "Wire messages").

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::{ClassDescriptor, FunctionDescriptor, ObjectDescriptor};
use crate::value::WireValue;

pub const MARKER: &str = "srpc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Void,
    Sync,
    Async,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallAction {
    FnCall,
    CtorCall,
    MethodCall,
    PropGet,
    PropSet,
}

/// A descriptor table flattened for the wire. Mirrors [`crate::descriptor::DescriptorTable`]
/// field-for-field; kept separate because the in-memory table has richer (non-`serde`)
/// shapes in a couple of spots that the wire form does not need to round-trip exactly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptorTableWire {
    #[serde(default)]
    pub objects: BTreeMap<String, ObjectDescriptorWire>,
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionDescriptorWire>,
    #[serde(default)]
    pub classes: BTreeMap<String, ClassDescriptorWire>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDescriptorWire {
    pub name: String,
    pub returns: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectDescriptorWire {
    #[serde(default)]
    pub functions: Vec<FunctionDescriptorWire>,
    #[serde(default)]
    pub readonly_properties: Vec<String>,
    #[serde(default)]
    pub proxied_properties: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassDescriptorWire {
    pub class_id: String,
    #[serde(default)]
    pub ctor: Option<FunctionDescriptorWire>,
    #[serde(default)]
    pub statics: ObjectDescriptorWire,
    #[serde(default)]
    pub instance: ObjectDescriptorWire,
}

/// A message crossing the channel. Internally tagged on `action`, matching the design's
/// own wire shape (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WireMessage {
    GetDescriptors {
        #[serde(rename = "callType")]
        call_type: CallType,
    },
    Descriptors(DescriptorTableWire),
    Call {
        #[serde(rename = "callType")]
        call_type: CallType,
        #[serde(rename = "objId")]
        obj_id: Option<String>,
        #[serde(default)]
        prop: Option<String>,
        #[serde(default)]
        args: Vec<WireValue>,
        #[serde(rename = "callId", default)]
        call_id: Option<String>,
        #[serde(rename = "callAction")]
        call_action: CallAction,
    },
    FnReply {
        #[serde(rename = "callType")]
        call_type: CallType,
        success: bool,
        result: WireValue,
        #[serde(rename = "callId", default)]
        call_id: Option<String>,
    },
    ObjDied {
        #[serde(rename = "objId")]
        obj_id: String,
    },
}

/// Wraps a [`WireMessage`] with the fixed marker every outgoing message carries, and
/// screens inbound traffic lacking it (§4.5, "Message marker").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub rpc_marker: String,
    #[serde(flatten)]
    pub message: WireMessage,
}

impl Envelope {
    pub fn wrap(message: WireMessage) -> Self {
        Self {
            rpc_marker: MARKER.to_string(),
            message,
        }
    }
}

pub(crate) fn function_to_wire(f: &FunctionDescriptor) -> FunctionDescriptorWire {
    FunctionDescriptorWire {
        name: f.name.clone(),
        returns: match f.returns {
            crate::descriptor::ReturnBehavior::Void => "void".to_string(),
            crate::descriptor::ReturnBehavior::Sync => "sync".to_string(),
            crate::descriptor::ReturnBehavior::Async => "async".to_string(),
        },
    }
}

pub(crate) fn object_to_wire(o: &ObjectDescriptor) -> ObjectDescriptorWire {
    ObjectDescriptorWire {
        functions: o.functions.iter().map(function_to_wire).collect(),
        readonly_properties: o.readonly_properties.clone(),
        proxied_properties: o.proxied_properties.iter().map(|p| p.name.clone()).collect(),
        events: o.events.iter().map(|e| e.name.clone()).collect(),
    }
}

pub(crate) fn class_to_wire(c: &ClassDescriptor) -> ClassDescriptorWire {
    ClassDescriptorWire {
        class_id: c.class_id.clone(),
        ctor: c.ctor.as_ref().map(function_to_wire),
        statics: object_to_wire(&c.statics),
        instance: object_to_wire(&c.instance),
    }
}

pub(crate) fn wire_to_function(w: &FunctionDescriptorWire) -> FunctionDescriptor {
    FunctionDescriptor {
        name: w.name.clone(),
        returns: match w.returns.as_str() {
            "void" => crate::descriptor::ReturnBehavior::Void,
            "sync" => crate::descriptor::ReturnBehavior::Sync,
            _ => crate::descriptor::ReturnBehavior::Async,
        },
        args: Vec::new(),
    }
}

pub(crate) fn wire_to_object(w: &ObjectDescriptorWire) -> ObjectDescriptor {
    ObjectDescriptor {
        functions: w.functions.iter().map(wire_to_function).collect(),
        readonly_properties: w.readonly_properties.clone(),
        proxied_properties: w
            .proxied_properties
            .iter()
            .map(|name| crate::descriptor::ProxiedProperty {
                name: name.clone(),
                getter: None,
                setter: None,
            })
            .collect(),
        events: w
            .events
            .iter()
            .map(|name| crate::descriptor::EventDescriptor {
                name: name.clone(),
                listener: None,
            })
            .collect(),
    }
}

pub(crate) fn wire_to_class(w: &ClassDescriptorWire) -> ClassDescriptor {
    ClassDescriptor {
        class_id: w.class_id.clone(),
        ctor: w.ctor.as_ref().map(wire_to_function),
        statics: wire_to_object(&w.statics),
        instance: wire_to_object(&w.instance),
    }
}
