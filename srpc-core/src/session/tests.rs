//! One test per scenario in the design's "Testable Properties", each running two
//! in-process [`Session`]s joined by [`crate::channel::memory::loopback_pair`].

use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::channel::memory;
use crate::descriptor::{ArgDescriptor, ClassDescriptor, EventDescriptor, FunctionDescriptor, ObjectDescriptor, ProxiedProperty, ReturnBehavior};
use crate::host::{Deferred, HostClass, HostFn, HostObject, Listener};
use crate::value::Json;

#[test]
fn sync_call_computes_and_propagates_errors() {
    let server = Session::builder().build();
    let client = Session::builder().build();
    memory::loopback_pair(&server, &client);

    server.host.register_function_with_descriptor(
        "add",
        Rc::new(|args: Vec<Value>| {
            let mut nums = args.into_iter().filter_map(|v| v.as_plain().and_then(|j| j.as_i64()));
            let a = nums.next().unwrap_or_default();
            let b = nums.next().unwrap_or_default();
            Ok(Value::plain(a + b))
        }),
        FunctionDescriptor { name: "add".into(), returns: ReturnBehavior::Sync, args: vec![] },
    );
    server.host.register_function_with_descriptor(
        "failSync",
        Rc::new(|_args| Err(Error::new(ErrorKind::Remote("ErRoR".into())))),
        FunctionDescriptor { name: "failSync".into(), returns: ReturnBehavior::Sync, args: vec![] },
    );
    server.push_descriptors();

    let add = client.get_proxy_function("add");
    let sum = add.call(vec![Value::plain(2), Value::plain(3)]).unwrap().unwrap();
    assert_eq!(sum.as_plain().and_then(|j| j.as_i64()), Some(5));

    let fail = client.get_proxy_function("failSync");
    let err = fail.call(vec![]).unwrap_err();
    assert_eq!(err.to_string(), "ErRoR");
}

#[test]
fn async_call_resolves_and_rejects() {
    let server = Session::builder().build();
    let client = Session::builder().build();
    memory::loopback_pair(&server, &client);

    server.host.register_function_with_descriptor(
        "asyncFunc",
        Rc::new(|args: Vec<Value>| {
            let suffix = args.into_iter().next().and_then(|v| v.as_plain().and_then(|j| j.as_str().map(str::to_string))).unwrap_or_default();
            let deferred = Deferred::new();
            deferred.resolve(Value::plain(format!("{suffix}pong")));
            Ok(Value::Deferred(deferred))
        }),
        FunctionDescriptor::bare("asyncFunc"),
    );
    server.host.register_function_with_descriptor(
        "failAsync",
        Rc::new(|_args| {
            let deferred = Deferred::new();
            deferred.reject("pingerr");
            Ok(Value::Deferred(deferred))
        }),
        FunctionDescriptor::bare("failAsync"),
    );
    server.push_descriptors();

    let async_func = client.get_proxy_function("asyncFunc");
    let settled = Rc::new(RefCell::new(None));
    let settled_in_cb = settled.clone();
    async_func
        .call_async(vec![Value::plain("ping")], Box::new(move |r| *settled_in_cb.borrow_mut() = Some(r)))
        .unwrap();
    match settled.borrow().as_ref() {
        Some(Ok(value)) => assert_eq!(value.as_plain().and_then(|j| j.as_str()), Some("pingpong")),
        _ => panic!("expected asyncFunc to resolve"),
    }

    let fail_async = client.get_proxy_function("failAsync");
    let settled = Rc::new(RefCell::new(None));
    let settled_in_cb = settled.clone();
    fail_async.call_async(vec![], Box::new(move |r| *settled_in_cb.borrow_mut() = Some(r))).unwrap();
    match settled.borrow().as_ref() {
        Some(Err(message)) => assert_eq!(message, "pingerr"),
        _ => panic!("expected failAsync to reject"),
    }
}

struct Counter(RefCell<i64>);

impl HostObject for Counter {
    fn descriptor(&self) -> ObjectDescriptor {
        let getter = FunctionDescriptor { name: "get_counter".into(), returns: ReturnBehavior::Sync, args: vec![] };
        let setter = FunctionDescriptor { name: "set_counter".into(), returns: ReturnBehavior::Sync, args: vec![] };
        ObjectDescriptor {
            functions: vec![getter.clone(), setter.clone()],
            proxied_properties: vec![ProxiedProperty { name: "counter".into(), getter: Some(getter), setter: Some(setter) }],
            ..Default::default()
        }
    }

    fn get(&self, prop: &str) -> Result<Value, Error> {
        match prop {
            "counter" => Ok(Value::plain(*self.0.borrow())),
            other => Err(Error::new(ErrorKind::NotAFunction(other.to_string()))),
        }
    }

    fn set(&self, prop: &str, value: Value) -> Result<(), Error> {
        if prop == "counter"
            && let Value::Plain(Json::Number(n)) = value
        {
            *self.0.borrow_mut() = n.as_i64().unwrap_or_default();
        }
        Ok(())
    }

    fn call_method(&self, name: &str, _args: Vec<Value>) -> Result<Value, Error> {
        Err(Error::new(ErrorKind::NotAFunction(name.to_string())))
    }
}

#[test]
fn proxied_property_reflects_host_state() {
    let server = Session::builder().build();
    let client = Session::builder().build();
    memory::loopback_pair(&server, &client);

    server.host.register_object("counter", Rc::new(Counter(RefCell::new(1))));
    server.push_descriptors();

    let proxy = client.get_proxy_object("counter", "");
    assert_eq!(proxy.get("counter").unwrap().as_plain().and_then(|j| j.as_i64()), Some(1));
    proxy.set("counter", Value::plain(2)).unwrap();
    assert_eq!(proxy.get("counter").unwrap().as_plain().and_then(|j| j.as_i64()), Some(2));
}

#[derive(Default)]
struct EventHost {
    listeners: RefCell<Vec<Listener>>,
}

impl EventHost {
    fn fire(&self, payload: Value) -> Result<(), Error> {
        for listener in self.listeners.borrow().iter() {
            listener.call(vec![payload.clone()])?;
        }
        Ok(())
    }
}

impl HostObject for EventHost {
    fn descriptor(&self) -> ObjectDescriptor {
        ObjectDescriptor {
            events: vec![EventDescriptor { name: "data".into(), listener: Some(ArgDescriptor { idx: 0, is_function: true, nested: None }) }],
            ..Default::default()
        }
    }

    fn get(&self, prop: &str) -> Result<Value, Error> {
        Err(Error::new(ErrorKind::NotAFunction(prop.to_string())))
    }

    fn set(&self, prop: &str, _value: Value) -> Result<(), Error> {
        Err(Error::new(ErrorKind::NotAFunction(prop.to_string())))
    }

    fn call_method(&self, name: &str, _args: Vec<Value>) -> Result<Value, Error> {
        Err(Error::new(ErrorKind::NotAFunction(name.to_string())))
    }

    fn add_listener(&self, event: &str, listener: Listener) -> Result<(), Error> {
        if event == "data" {
            self.listeners.borrow_mut().push(listener);
            Ok(())
        } else {
            Err(Error::new(ErrorKind::NotAFunction(event.to_string())))
        }
    }

    fn remove_listener(&self, event: &str, listener: Listener) -> Result<(), Error> {
        if event == "data" {
            self.listeners.borrow_mut().retain(|l| l.id() != listener.id());
            Ok(())
        } else {
            Err(Error::new(ErrorKind::NotAFunction(event.to_string())))
        }
    }
}

#[test]
fn event_listener_add_and_remove_round_trip() {
    let server = Session::builder().build();
    let client = Session::builder().build();
    memory::loopback_pair(&server, &client);

    let events = Rc::new(EventHost::default());
    server.host.register_object("events", events.clone());
    server.push_descriptors();

    let received: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let received_in_listener = received.clone();
    let listener: HostFn = Rc::new(move |args| {
        if let Some(Value::Plain(Json::String(s))) = args.into_iter().next() {
            received_in_listener.borrow_mut().push(s);
        }
        Ok(Value::Plain(Json::Null))
    });

    let proxy = client.get_proxy_object("events", "");
    proxy.call_method("add_data", vec![Value::HostFunction(listener.clone())]).unwrap();
    events.fire(Value::plain("first")).unwrap();
    assert_eq!(received.borrow().as_slice(), ["first"]);

    proxy.call_method("remove_data", vec![Value::HostFunction(listener.clone())]).unwrap();
    events.fire(Value::plain("second")).unwrap();
    assert_eq!(received.borrow().as_slice(), ["first"]);
}

struct AInstance {
    name: String,
    color: RefCell<String>,
}

impl AInstance {
    fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), color: RefCell::new(String::new()) }
    }
}

impl HostObject for AInstance {
    fn descriptor(&self) -> ObjectDescriptor {
        let get_color = FunctionDescriptor { name: "get_color".into(), returns: ReturnBehavior::Sync, args: vec![] };
        let set_color = FunctionDescriptor { name: "set_color".into(), returns: ReturnBehavior::Sync, args: vec![] };
        ObjectDescriptor {
            functions: vec![
                FunctionDescriptor { name: "getDescription".into(), returns: ReturnBehavior::Sync, args: vec![] },
                get_color.clone(),
                set_color.clone(),
            ],
            readonly_properties: vec!["name".into()],
            proxied_properties: vec![ProxiedProperty { name: "color".into(), getter: Some(get_color), setter: Some(set_color) }],
            ..Default::default()
        }
    }

    fn class_id(&self) -> Option<String> {
        Some("A".into())
    }

    fn get(&self, prop: &str) -> Result<Value, Error> {
        match prop {
            "name" => Ok(Value::plain(self.name.clone())),
            "color" => Ok(Value::plain(self.color.borrow().clone())),
            other => Err(Error::new(ErrorKind::NotAFunction(other.to_string()))),
        }
    }

    fn set(&self, prop: &str, value: Value) -> Result<(), Error> {
        if prop == "color"
            && let Value::Plain(Json::String(s)) = value
        {
            *self.color.borrow_mut() = s;
        }
        Ok(())
    }

    fn call_method(&self, name: &str, _args: Vec<Value>) -> Result<Value, Error> {
        match name {
            "getDescription" => Ok(Value::plain(format!("{} {}", self.color.borrow(), self.name))),
            other => Err(Error::new(ErrorKind::NotAFunction(other.to_string()))),
        }
    }
}

struct AStatics;

impl HostObject for AStatics {
    fn descriptor(&self) -> ObjectDescriptor {
        ObjectDescriptor {
            functions: vec![FunctionDescriptor { name: "createInstance".into(), returns: ReturnBehavior::Sync, args: vec![] }],
            ..Default::default()
        }
    }

    fn get(&self, prop: &str) -> Result<Value, Error> {
        Err(Error::new(ErrorKind::NotAFunction(prop.to_string())))
    }

    fn set(&self, prop: &str, _value: Value) -> Result<(), Error> {
        Err(Error::new(ErrorKind::NotAFunction(prop.to_string())))
    }

    fn call_method(&self, name: &str, args: Vec<Value>) -> Result<Value, Error> {
        match name {
            "createInstance" => {
                let name = args.into_iter().next().and_then(|v| v.as_plain().and_then(|j| j.as_str().map(str::to_string))).unwrap_or_default();
                Ok(Value::HostObject(Rc::new(AInstance::new(name))))
            }
            other => Err(Error::new(ErrorKind::NotAFunction(other.to_string()))),
        }
    }
}

struct AClass {
    statics: Rc<AStatics>,
}

impl HostClass for AClass {
    fn descriptor(&self) -> ClassDescriptor {
        ClassDescriptor {
            class_id: "A".into(),
            ctor: None,
            statics: self.statics.descriptor(),
            instance: AInstance::new("").descriptor(),
        }
    }

    fn construct(&self, _args: Vec<Value>) -> Result<Rc<dyn HostObject>, Error> {
        Err(Error::new(ErrorKind::NoConstructor("A".into())))
    }

    fn statics(&self) -> Rc<dyn HostObject> {
        self.statics.clone()
    }
}

#[test]
fn class_static_constructor_and_instance_round_trip() {
    let server = Session::builder().build();
    let client = Session::builder().build();
    memory::loopback_pair(&server, &client);

    server.host.register_class("A", Rc::new(AClass { statics: Rc::new(AStatics) }));
    server.push_descriptors();

    let class = client.get_proxy_class("A").unwrap();
    let instance = class.call_static("createInstance", vec![Value::plain("test2")]).unwrap().unwrap();
    let Value::Proxy(instance) = instance else {
        panic!("createInstance should return a proxy");
    };
    assert_eq!(instance.class_id(), "A");
    assert_eq!(instance.get("name").unwrap().as_plain().and_then(|j| j.as_str()), Some("test2"));

    instance.set("color", Value::plain("green")).unwrap();
    let description = instance.call_method("getDescription", vec![]).unwrap().unwrap();
    assert_eq!(description.as_plain().and_then(|j| j.as_str()), Some("green test2"));
}

struct Named;

impl HostObject for Named {
    fn descriptor(&self) -> ObjectDescriptor {
        ObjectDescriptor::default()
    }

    fn get(&self, prop: &str) -> Result<Value, Error> {
        Err(Error::new(ErrorKind::NotAFunction(prop.to_string())))
    }

    fn set(&self, prop: &str, _value: Value) -> Result<(), Error> {
        Err(Error::new(ErrorKind::NotAFunction(prop.to_string())))
    }

    fn call_method(&self, name: &str, _args: Vec<Value>) -> Result<Value, Error> {
        Err(Error::new(ErrorKind::NotAFunction(name.to_string())))
    }
}

#[test]
fn sending_a_proxy_back_resolves_to_the_original_host_target() {
    let server = Session::builder().build();
    let client = Session::builder().build();
    memory::loopback_pair(&server, &client);

    let original: Rc<dyn HostObject> = Rc::new(Named);
    server.host.register_object("shared", original.clone());

    let received: Rc<RefCell<Option<Rc<dyn HostObject>>>> = Rc::new(RefCell::new(None));
    let received_in_set = received.clone();
    server.host.register_function_with_descriptor(
        "setA",
        Rc::new(move |args: Vec<Value>| {
            if let Some(Value::HostObject(obj)) = args.into_iter().next() {
                *received_in_set.borrow_mut() = Some(obj);
            }
            Ok(Value::Plain(Json::Null))
        }),
        FunctionDescriptor { name: "setA".into(), returns: ReturnBehavior::Sync, args: vec![] },
    );
    let stable = original.clone();
    server.host.register_function_with_descriptor(
        "getA",
        Rc::new(move |_args| Ok(Value::HostObject(stable.clone()))),
        FunctionDescriptor { name: "getA".into(), returns: ReturnBehavior::Sync, args: vec![] },
    );
    server.push_descriptors();

    let a = client.get_proxy_function("getA").call(vec![]).unwrap().unwrap();
    client.get_proxy_function("setA").call(vec![a]).unwrap();

    let got = received.borrow().clone().expect("setA should have received the proxy argument");
    assert!(Rc::ptr_eq(&got, &original));
}

#[test]
fn repeated_lookups_return_the_same_proxy_instance() {
    let server = Session::builder().build();
    let client = Session::builder().build();
    memory::loopback_pair(&server, &client);

    server.host.register_object("shared", Rc::new(Named));
    server.push_descriptors();

    let first = client.get_proxy_object("shared", "");
    let second = client.get_proxy_object("shared", "");
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn promise_argument_settlement_relays_through_fn_reply() {
    let server = Session::builder().build();
    let client = Session::builder().build();
    memory::loopback_pair(&server, &client);

    server.host.register_function_with_descriptor(
        "giveMeAPromise",
        Rc::new(|args: Vec<Value>| {
            let Some(Value::ProxyFn(callback)) = args.into_iter().next() else {
                return Err(Error::new(ErrorKind::NotAFunction("callback".into())));
            };
            let deferred = Deferred::new();
            callback.call_async(vec![Value::Deferred(deferred.clone())], Box::new(|_| {}))?;
            deferred.resolve(Value::plain("done"));
            Ok(Value::Plain(Json::Null))
        }),
        FunctionDescriptor { name: "giveMeAPromise".into(), returns: ReturnBehavior::Void, args: vec![ArgDescriptor { idx: 0, is_function: true, nested: None }] },
    );
    server.host.register_function_with_descriptor(
        "giveMeAFailingPromise",
        Rc::new(|args: Vec<Value>| {
            let Some(Value::ProxyFn(callback)) = args.into_iter().next() else {
                return Err(Error::new(ErrorKind::NotAFunction("callback".into())));
            };
            let deferred = Deferred::new();
            callback.call_async(vec![Value::Deferred(deferred.clone())], Box::new(|_| {}))?;
            deferred.reject("boom");
            Ok(Value::Plain(Json::Null))
        }),
        FunctionDescriptor { name: "giveMeAFailingPromise".into(), returns: ReturnBehavior::Void, args: vec![ArgDescriptor { idx: 0, is_function: true, nested: None }] },
    );
    server.push_descriptors();

    fn watch_promise(settled: Rc<RefCell<Option<Result<Value, String>>>>) -> HostFn {
        Rc::new(move |args: Vec<Value>| {
            let Some(Value::Proxy(promise)) = args.into_iter().next() else {
                return Err(Error::new(ErrorKind::NotAFunction("promise".into())));
            };
            let settled = settled.clone();
            promise.then(Box::new(move |result| *settled.borrow_mut() = Some(result)));
            Ok(Value::Plain(Json::Null))
        })
    }

    let resolved = Rc::new(RefCell::new(None));
    client.get_proxy_function("giveMeAPromise").call(vec![Value::HostFunction(watch_promise(resolved.clone()))]).unwrap();
    match resolved.borrow().as_ref() {
        Some(Ok(value)) => assert_eq!(value.as_plain().and_then(|j| j.as_str()), Some("done")),
        _ => panic!("expected the promise to resolve"),
    }

    let rejected = Rc::new(RefCell::new(None));
    client.get_proxy_function("giveMeAFailingPromise").call(vec![Value::HostFunction(watch_promise(rejected.clone()))]).unwrap();
    match rejected.borrow().as_ref() {
        Some(Err(message)) => assert_eq!(message, "boom"),
        _ => panic!("expected the promise to reject"),
    }
}

#[test]
fn disposed_function_rejects_further_calls() {
    let server = Session::builder().build();
    let client = Session::builder().build();
    memory::loopback_pair(&server, &client);

    server.host.register_function_with_descriptor(
        "echo",
        Rc::new(|args: Vec<Value>| Ok(args.into_iter().next().unwrap_or(Value::Plain(Json::Null)))),
        FunctionDescriptor { name: "echo".into(), returns: ReturnBehavior::Sync, args: vec![] },
    );
    server.push_descriptors();

    let echo = client.get_proxy_function("echo");
    assert!(!echo.is_disposed());
    assert_eq!(echo.call(vec![Value::plain(1)]).unwrap().unwrap().as_plain().and_then(|j| j.as_i64()), Some(1));

    echo.dispose();
    assert!(echo.is_disposed());
    echo.dispose();
    assert!(echo.is_disposed());

    let err = echo.call(vec![Value::plain(1)]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Disposed));

    let err = echo.call_async(vec![Value::plain(1)], Box::new(|_| {})).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Disposed));
}

#[test]
fn pull_descriptors_over_sync_transport_returns_true_and_populates_the_cache() {
    let server = Session::builder().build();
    let client = Session::builder().build();
    memory::loopback_pair(&server, &client);

    server.host.register_function_with_descriptor(
        "add",
        Rc::new(|_args| Ok(Value::plain(0))),
        FunctionDescriptor { name: "add".into(), returns: ReturnBehavior::Sync, args: vec![] },
    );

    // The server never calls `push_descriptors`; the client must pull them instead,
    // over the loopback's synchronous transport, and get `true` back immediately.
    let ok = client.pull_descriptors(None);
    assert_eq!(ok, Some(true));
    assert!(client.remote_function_descriptor("add").is_some());
}
