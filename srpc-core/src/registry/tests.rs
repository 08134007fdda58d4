use super::*;
use std::cell::RefCell as StdRefCell;

struct Dummy(u32);

#[test]
fn get_upgrades_live_entries() {
    let registry = ProxyRegistry::<Dummy>::new();
    let proxy = Rc::new(Dummy(7));
    registry.register("a", &proxy, None);
    assert!(registry.has("a"));
    let got = registry.get("a").unwrap();
    assert_eq!(got.0, 7);
}

#[test]
fn get_evicts_dead_entries() {
    let registry = ProxyRegistry::<Dummy>::new();
    {
        let proxy = Rc::new(Dummy(1));
        registry.register("a", &proxy, None);
    }
    assert!(!registry.has("a"));
    assert_eq!(registry.len(), 0);
}

#[test]
fn delete_removes_without_running_callback() {
    let registry = ProxyRegistry::<Dummy>::new();
    let fired = Rc::new(StdRefCell::new(false));
    let marker = fired.clone();
    let proxy = Rc::new(Dummy(1));
    registry.register("a", &proxy, Some(Box::new(move |_| *marker.borrow_mut() = true)));
    assert!(registry.delete("a"));
    assert!(!*fired.borrow());
    assert!(!registry.has("a"));
}

#[test]
fn notify_dispose_runs_callback_once() {
    let registry = Rc::new(ProxyRegistry::<Dummy>::new());
    let fired = Rc::new(StdRefCell::new(0));
    let marker = fired.clone();
    let proxy = Rc::new(Dummy(1));
    registry.register(
        "a",
        &proxy,
        Some(Box::new(move |_| *marker.borrow_mut() += 1)),
    );
    registry.notify_dispose("a");
    registry.notify_dispose("a");
    assert_eq!(*fired.borrow(), 1);
}

#[test]
fn dispose_guard_fires_on_explicit_dispose() {
    let registry = Rc::new(ProxyRegistry::<Dummy>::new());
    let fired = Rc::new(StdRefCell::new(0));
    let marker = fired.clone();
    let proxy = Rc::new(Dummy(1));
    registry.register(
        "a",
        &proxy,
        Some(Box::new(move |_| *marker.borrow_mut() += 1)),
    );
    let guard = DisposeGuard::for_registry(registry.clone(), "a".to_string());
    assert!(!guard.is_disposed());
    guard.dispose();
    guard.dispose();
    assert!(guard.is_disposed());
    assert_eq!(*fired.borrow(), 1);
}

#[test]
fn dispose_guard_fires_on_drop() {
    let registry = Rc::new(ProxyRegistry::<Dummy>::new());
    let fired = Rc::new(StdRefCell::new(0));
    let marker = fired.clone();
    let proxy = Rc::new(Dummy(1));
    registry.register(
        "a",
        &proxy,
        Some(Box::new(move |_| *marker.borrow_mut() += 1)),
    );
    {
        let _guard = DisposeGuard::for_registry(registry.clone(), "a".to_string());
    }
    assert_eq!(*fired.borrow(), 1);
}
