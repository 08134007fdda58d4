//! A two-endpoint demo of `srpc-core` running in a single process: one [`Session`] hosts
//! a small counter object and a greeting function, the other obtains proxies for both and
//! drives them as if they lived locally.

use std::cell::RefCell;
use std::rc::Rc;

use error_reporter::Report;
use log::{info, LevelFilter};
use thiserror::Error;

use srpc_core::channel::memory;
use srpc_core::descriptor::{FunctionDescriptor, ObjectDescriptor, ProxiedProperty, ReturnBehavior};
use srpc_core::error::Error as RpcError;
use srpc_core::host::{HostObject, Value};
use srpc_core::value::Json;
use srpc_core::Session;

#[derive(Debug, Error)]
enum DemoError {
    #[error("the host side rejected a call")]
    Call(#[source] RpcError),
}

/// A host object exposing a single `sync`-graded proxied property, `count`, along with
/// an `increment()` method that mutates it in place.
struct Counter {
    value: RefCell<i64>,
}

impl Counter {
    fn new() -> Rc<Self> {
        Rc::new(Self { value: RefCell::new(0) })
    }
}

impl HostObject for Counter {
    fn descriptor(&self) -> ObjectDescriptor {
        let get_count = FunctionDescriptor {
            name: "get_count".into(),
            returns: ReturnBehavior::Sync,
            args: vec![],
        };
        ObjectDescriptor {
            functions: vec![
                FunctionDescriptor {
                    name: "increment".into(),
                    returns: ReturnBehavior::Sync,
                    args: vec![],
                },
                get_count.clone(),
            ],
            proxied_properties: vec![ProxiedProperty {
                name: "count".into(),
                getter: Some(get_count),
                setter: None,
            }],
            ..Default::default()
        }
    }

    fn get(&self, prop: &str) -> Result<Value, RpcError> {
        match prop {
            "count" => Ok(Value::plain(*self.value.borrow())),
            other => Err(RpcError::from(srpc_core::ErrorKind::NotAFunction(other.to_string()))),
        }
    }

    fn set(&self, prop: &str, _value: Value) -> Result<(), RpcError> {
        Err(RpcError::from(srpc_core::ErrorKind::NotAFunction(prop.to_string())))
    }

    fn call_method(&self, name: &str, _args: Vec<Value>) -> Result<Value, RpcError> {
        match name {
            "increment" => {
                let mut value = self.value.borrow_mut();
                *value += 1;
                Ok(Value::plain(*value))
            }
            other => Err(RpcError::from(srpc_core::ErrorKind::NotAFunction(other.to_string()))),
        }
    }
}

fn run() -> Result<(), DemoError> {
    let server = Session::builder().build();
    let client = Session::builder().build();
    memory::loopback_pair(&server, &client);

    server.host.register_object("counter", Counter::new());
    server.host.register_function_with_descriptor(
        "greet",
        Rc::new(|args| {
            let name = args
                .into_iter()
                .next()
                .and_then(|v| v.as_plain().and_then(Json::as_str).map(str::to_string))
                .unwrap_or_else(|| "world".to_string());
            Ok(Value::plain(format!("hello, {name}")))
        }),
        FunctionDescriptor {
            name: "greet".into(),
            returns: ReturnBehavior::Sync,
            args: vec![],
        },
    );
    server.push_descriptors();

    let counter = client.get_proxy_object("counter", "");
    info!("count starts at {:?}", counter.get("count").map_err(DemoError::Call)?.as_plain());
    counter.call_method("increment", vec![]).map_err(DemoError::Call)?;
    counter.call_method("increment", vec![]).map_err(DemoError::Call)?;
    info!("count is now {:?}", counter.get("count").map_err(DemoError::Call)?.as_plain());

    let greet = client.get_proxy_function("greet");
    let greeting = greet.call(vec![Value::plain("srpc")]).map_err(DemoError::Call)?;
    info!("{:?}", greeting.and_then(|v| v.as_plain().cloned()));

    Ok(())
}

fn main() -> Result<(), Report<DemoError>> {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
    run().map_err(Report::new)
}
