use super::*;
use crate::descriptor::ObjectDescriptor;
use crate::ids::MonotonicIdGenerator;

struct Counter(RefCell<i64>);

impl HostObject for Counter {
    fn descriptor(&self) -> ObjectDescriptor {
        ObjectDescriptor::default()
    }

    fn get(&self, prop: &str) -> Result<Value, Error> {
        match prop {
            "count" => Ok(Value::plain(*self.0.borrow())),
            _ => Err(Error::new(ErrorKind::NotAFunction(prop.to_string()))),
        }
    }

    fn set(&self, prop: &str, value: Value) -> Result<(), Error> {
        if prop == "count"
            && let Value::Plain(Json::Number(n)) = value
        {
            *self.0.borrow_mut() = n.as_i64().unwrap_or_default();
        }
        Ok(())
    }

    fn call_method(&self, _name: &str, _args: Vec<Value>) -> Result<Value, Error> {
        Err(Error::new(ErrorKind::NotAFunction("unsupported".to_string())))
    }
}

#[test]
fn explicit_registration_is_retrievable() {
    let registry = HostRegistry::new();
    let counter: Rc<dyn HostObject> = Rc::new(Counter(RefCell::new(0)));
    registry.register_object("counter", counter);
    assert!(registry.object("counter").is_ok());
    assert!(registry.object("missing").is_err());
}

#[test]
fn ensure_object_reuses_existing_id() {
    let registry = HostRegistry::new();
    let gen = MonotonicIdGenerator::default();
    let counter: Rc<dyn HostObject> = Rc::new(Counter(RefCell::new(0)));
    let first = registry.ensure_object(counter.clone(), &gen);
    let second = registry.ensure_object(counter.clone(), &gen);
    assert_eq!(first, second);
}

#[test]
fn ensure_object_mints_fresh_ids_for_distinct_objects() {
    let registry = HostRegistry::new();
    let gen = MonotonicIdGenerator::default();
    let a: Rc<dyn HostObject> = Rc::new(Counter(RefCell::new(0)));
    let b: Rc<dyn HostObject> = Rc::new(Counter(RefCell::new(0)));
    let id_a = registry.ensure_object(a, &gen);
    let id_b = registry.ensure_object(b, &gen);
    assert_ne!(id_a, id_b);
}

#[test]
fn delete_object_clears_the_identity_side_table() {
    let registry = HostRegistry::new();
    let gen = MonotonicIdGenerator::default();
    let counter: Rc<dyn HostObject> = Rc::new(Counter(RefCell::new(0)));
    let id = registry.ensure_object(counter.clone(), &gen);
    assert!(registry.delete_object(&id));
    assert!(registry.object(&id).is_err());
    let rebound = registry.ensure_object(counter, &gen);
    assert_ne!(id, rebound);
}
