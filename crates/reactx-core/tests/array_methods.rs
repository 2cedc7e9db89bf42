//! Array method interception through the public API.
//!
//! Mutating methods run against the raw array and notify once per call;
//! iterating methods hand wrapped elements to their callbacks and wrap what
//! they return.

use std::cell::Cell;
use std::rc::Rc;

use reactx_core::{ArrayMethod, Function, Key, Observer, Reactive, Runtime, Subscription, Target, Value};

// ── Helpers ──────────────────────────────────────────────────────────

fn todo(title: &str, done: bool) -> Target {
    Target::object_from([("title", Value::from(title)), ("done", Value::from(done))])
}

fn todos(rt: &Runtime) -> (Target, Reactive) {
    let raw = Target::array_from([todo("write", false), todo("review", true), todo("ship", false)]);
    let proxy = rt.proxy(&raw, false);
    (raw, proxy)
}

fn watch(rt: &Runtime, read: impl FnOnce()) -> (Observer, Rc<Cell<u32>>, Subscription) {
    let obs = rt.observer();
    let guard = obs.track();
    read();
    guard.untrack();
    let count = Rc::new(Cell::new(0));
    let handle = Rc::clone(&count);
    let sub = obs.subscribe(move || handle.set(handle.get() + 1));
    (obs, count, sub)
}

fn is_done(item: &Value) -> bool {
    item.as_reactive()
        .and_then(|todo| todo.get("done").ok())
        .is_some_and(|done| done.is_truthy())
}

// ═════════════════════════════════════════════════════════════════════════
// Mutators
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn every_mutator_notifies_length_observers_exactly_once() {
    let rt = Runtime::new();
    let list = rt.proxy(&Target::array_from([4, 2, 3, 1]), false);
    let (_obs, count, _sub) = watch(&rt, || {
        list.get("length").unwrap();
    });

    list.push([5, 6]).unwrap();
    list.pop().unwrap();
    list.shift().unwrap();
    list.unshift([0]).unwrap();
    list.splice(1, 1, [7, 8]).unwrap();
    list.sort().unwrap();
    list.reverse().unwrap();
    assert_eq!(count.get(), 7);
}

#[test]
fn mutators_through_function_values_behave_the_same() {
    let rt = Runtime::new();
    let list = rt.proxy(&Target::array_from([1]), false);
    let (_obs, count, _sub) = watch(&rt, || {
        let _ = list.len();
    });

    let push = list.get("push").unwrap();
    let push = push.as_function().expect("push is callable");
    assert_eq!(push.name(), "push");
    assert_eq!(push.call(&[Value::from(2), Value::from(3)]).unwrap(), Value::from(3));
    assert_eq!(count.get(), 1);
    assert_eq!(list.to_json(), serde_json::json!([1, 2, 3]));
}

#[test]
fn removed_elements_come_back_wrapped() {
    let rt = Runtime::new();
    let (raw, list) = todos(&rt);
    let first = list.shift().unwrap();
    let first = first.as_reactive().expect("object elements are wrapped");
    assert_eq!(first.get("title").unwrap(), Value::from("write"));
    assert_eq!(raw.len(), 2);
}

#[test]
fn index_observers_hear_about_unshift() {
    let rt = Runtime::new();
    let list = rt.proxy(&Target::array_from(["b", "c"]), false);
    let (_obs, count, _sub) = watch(&rt, || {
        list.get(0usize).unwrap();
    });

    list.unshift(["a"]).unwrap();
    assert_eq!(count.get(), 1);
    assert_eq!(list.get(0usize).unwrap(), Value::from("a"));
}

#[test]
fn readonly_arrays_reject_every_mutator() {
    let rt = Runtime::new();
    let raw = Target::array_from([1, 2, 3]);
    let view = rt.proxy(&raw, true);
    for method in ArrayMethod::ALL.into_iter().filter(|m| m.is_mutating()) {
        let err = view.invoke_array_method(method, &[]).unwrap_err();
        assert!(err.is_readonly_mutation(), "{} should be rejected", method.name());
    }
    assert_eq!(raw.to_json(), serde_json::json!([1, 2, 3]));
}

// ═════════════════════════════════════════════════════════════════════════
// Iteration
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn iteration_tracks_element_fields_read_by_callbacks() {
    let rt = Runtime::new();
    let (raw, list) = todos(&rt);
    let (_obs, count, _sub) = watch(&rt, || {
        let open = list.filter(|item, _| Ok(!is_done(item))).unwrap();
        assert_eq!(open.as_reactive().unwrap().len(), 2);
    });

    let second = raw.get(1usize).as_target().unwrap();
    rt.proxy(&second, false).set("done", false).unwrap();
    assert_eq!(count.get(), 1);
}

#[test]
fn iteration_never_notifies() {
    let rt = Runtime::new();
    let (_raw, list) = todos(&rt);
    let (_obs, count, _sub) = watch(&rt, || {
        let _ = list.len();
    });

    list.for_each(|_, _| Ok(())).unwrap();
    list.some(|item, _| Ok(is_done(item))).unwrap();
    list.every(|item, _| Ok(is_done(item))).unwrap();
    list.find_index(|item, _| Ok(is_done(item))).unwrap();
    assert_eq!(count.get(), 0);
}

#[test]
fn found_elements_are_live_proxies() {
    let rt = Runtime::new();
    let (raw, list) = todos(&rt);
    let found = list.find(|item, _| Ok(is_done(item))).unwrap();
    let found = found.as_reactive().expect("found element");
    found.set("title", "reviewed").unwrap();
    assert_eq!(raw.get(1usize).as_target().unwrap().get("title"), Value::from("reviewed"));
    assert_eq!(found.path(), vec![Key::from(1usize)]);
}

#[test]
fn find_index_reports_missing_as_minus_one() {
    let rt = Runtime::new();
    let (_raw, list) = todos(&rt);
    let never = Function::new("never", |_| Ok(Value::from(false)));
    assert_eq!(list.call("findIndex", &[Value::from(never)]).unwrap(), Value::from(-1));
}

#[test]
fn reduce_accumulates_over_wrapped_elements() {
    let rt = Runtime::new();
    let (_raw, list) = todos(&rt);
    let done = list
        .reduce(0, |acc, item, _| {
            let acc = acc.as_f64().unwrap_or(0.0);
            Ok(Value::from(if is_done(&item) { acc + 1.0 } else { acc }))
        })
        .unwrap();
    assert_eq!(done, Value::from(1));
}

#[test]
fn empty_reduce_without_initial_value_fails() {
    let rt = Runtime::new();
    let list = rt.proxy(&Target::new_array(), false);
    let keep = Function::new("keep", |args| Ok(args[0].clone()));
    let err = list.call("reduce", &[Value::from(keep)]).unwrap_err();
    assert_eq!(err.to_string(), "Reduce of empty array with no initial value");
}
