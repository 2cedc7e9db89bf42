//! End-to-end scenarios for tracking, notification and the proxy factory.
//!
//! Each test drives the public API the way a UI binding would: track a
//! region of reads, subscribe, then write through a proxy and count
//! notifications.

use std::cell::Cell;
use std::rc::Rc;

use reactx_core::{Observer, Reactive, ReactiveError, Runtime, Subscription, Target, Value};

// ── Helpers ──────────────────────────────────────────────────────────

fn tracked(rt: &Runtime, read: impl FnOnce()) -> Observer {
    let obs = rt.observer();
    let guard = obs.track();
    read();
    guard.untrack();
    obs
}

fn counted(obs: &Observer) -> (Rc<Cell<u32>>, Subscription) {
    let count = Rc::new(Cell::new(0));
    let handle = Rc::clone(&count);
    let sub = obs.subscribe(move || handle.set(handle.get() + 1));
    (count, sub)
}

fn reactive(value: &Value) -> Reactive {
    value.as_reactive().cloned().expect("expected a proxy")
}

// ═════════════════════════════════════════════════════════════════════════
// Proxy factory
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn wrapping_twice_yields_the_same_proxy() {
    let rt = Runtime::new();
    let raw = Target::object_from([("a", 1)]);

    assert_eq!(rt.reactive(&raw), rt.reactive(&raw));
    assert_eq!(rt.readonly(&raw), rt.readonly(&raw));

    let ro = rt.readonly(&raw);
    assert_eq!(rt.readonly(ro.clone()), ro);
    assert_ne!(rt.reactive(&raw), ro);
}

#[test]
fn primitives_are_returned_unchanged() {
    let rt = Runtime::new();
    assert_eq!(rt.reactive(Value::Null), Value::Null);
    assert_eq!(rt.reactive(42), Value::from(42));
    assert_eq!(rt.reactive("s"), Value::from("s"));
    assert!(rt.readonly(Value::Undefined).is_undefined());
}

#[test]
fn views_never_double_wrap() {
    let rt = Runtime::new();
    let raw = Target::object_from([("a", 1)]);
    let mutable = reactive(&rt.reactive(&raw));
    let ro = reactive(&rt.readonly(Value::from(&mutable)));
    assert!(ro.target().ptr_eq(&raw));
    assert!(ro.is_readonly());
    assert_eq!(ro.mutable_view(), mutable);
}

// ═════════════════════════════════════════════════════════════════════════
// Dependency + notification
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn count_scenario_notifies_once() {
    let rt = Runtime::new();
    let o = reactive(&rt.reactive(Target::object_from([("count", 0)])));
    let obs = tracked(&rt, || {
        o.get("count").unwrap();
    });
    let (n, _sub) = counted(&obs);

    o.set("count", 1).unwrap();
    assert_eq!(n.get(), 1);
}

#[test]
fn unrelated_keys_do_not_notify() {
    let rt = Runtime::new();
    let data = rt.proxy(&Target::object_from([("value", 1), ("other", 1)]), false);
    let obs = tracked(&rt, || {
        data.get("value").unwrap();
    });
    let (n, _sub) = counted(&obs);

    data.set("other", 2).unwrap();
    assert_eq!(n.get(), 0);
    data.set("value", 2).unwrap();
    assert_eq!(n.get(), 1);
}

#[test]
fn delete_notifies_and_leaves_undefined() {
    let rt = Runtime::new();
    let data = rt.proxy(&Target::object_from([("count", 3)]), false);
    let obs = tracked(&rt, || {
        data.get("count").unwrap();
    });
    let (n, _sub) = counted(&obs);

    assert!(data.delete("count").unwrap());
    assert_eq!(n.get(), 1);
    assert!(data.get("count").unwrap().is_undefined());
}

#[test]
fn enumeration_observers_hear_about_new_keys() {
    let rt = Runtime::new();
    let data = rt.proxy(&Target::new_object(), false);
    let obs = tracked(&rt, || {
        let _ = data.keys();
    });
    let (n, _sub) = counted(&obs);

    data.set("fresh", true).unwrap();
    assert_eq!(n.get(), 1);
}

#[test]
fn nested_reads_track_every_level() {
    let rt = Runtime::new();
    let inner = Target::object_from([("value", 1)]);
    let data = rt.proxy(&Target::object_from([("inner", &inner)]), false);
    let obs = tracked(&rt, || {
        reactive(&data.get("inner").unwrap()).get("value").unwrap();
    });
    let (n, _sub) = counted(&obs);

    rt.proxy(&inner, false).set("value", 5).unwrap();
    assert_eq!(n.get(), 1);
    data.set("inner", Target::object_from([("value", 9)])).unwrap();
    assert_eq!(n.get(), 2);
}

#[test]
fn unsubscribe_twice_is_harmless() {
    let rt = Runtime::new();
    let data = rt.proxy(&Target::object_from([("x", 0)]), false);
    let obs = tracked(&rt, || {
        data.get("x").unwrap();
    });
    let (n, sub) = counted(&obs);
    assert_eq!(rt.registered_observer_count(data.target()), 1);

    sub.unsubscribe();
    sub.unsubscribe();
    drop(sub);
    assert_eq!(rt.registered_observer_count(data.target()), 0);

    data.set("x", 1).unwrap();
    assert_eq!(n.get(), 0);
}

#[test]
fn snapshots_advance_on_notification() {
    let rt = Runtime::new();
    let data = rt.proxy(&Target::object_from([("x", 0)]), false);
    let obs = tracked(&rt, || {
        data.get("x").unwrap();
    });
    let (_n, _sub) = counted(&obs);
    let before = obs.get_snapshot();

    data.set("x", 1).unwrap();
    assert!(obs.get_snapshot() > before);
    assert_eq!(obs.get_snapshot(), rt.global_snapshot());
}

#[test]
fn inner_tracked_regions_own_their_reads() {
    let rt = Runtime::new();
    let data = rt.proxy(&Target::object_from([("outer", 1), ("inner", 1)]), false);
    let outer = rt.observer();
    let inner = rt.observer();

    let outer_guard = outer.track();
    data.get("outer").unwrap();
    let inner_guard = inner.track();
    data.get("inner").unwrap();
    inner_guard.untrack();
    outer_guard.untrack();

    assert!(outer.observes(data.target(), Some(&"outer".into())));
    assert!(!outer.observes(data.target(), Some(&"inner".into())));
    assert!(inner.observes(data.target(), Some(&"inner".into())));
}

// ═════════════════════════════════════════════════════════════════════════
// Readonly enforcement
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn readonly_object_write_fails_with_message() {
    let rt = Runtime::new();
    let raw = Target::object_from([("a", 1)]);
    let ro = reactive(&rt.readonly(rt.reactive(&raw)));

    let err = ro.set("a", 2).unwrap_err();
    assert_eq!(err.to_string(), "Cannot mutate a readonly object");
    assert_eq!(raw.get("a"), Value::from(1));
    assert_eq!(ro.get("a").unwrap(), Value::from(1));
}

#[test]
fn readonly_array_write_names_the_array() {
    let rt = Runtime::new();
    let ro = rt.proxy(&Target::array_from([1, 2]), true);
    let err = ro.delete(0usize).unwrap_err();
    assert_eq!(
        err,
        ReactiveError::ReadonlyMutation {
            kind: reactx_core::TargetKind::Array
        }
    );
    assert_eq!(err.to_string(), "Cannot mutate a readonly array");
}

#[test]
fn rejected_writes_notify_nobody() {
    let rt = Runtime::new();
    let raw = Target::object_from([("a", 1)]);
    let ro = rt.proxy(&raw, true);
    let obs = tracked(&rt, || {
        ro.get("a").unwrap();
    });
    let (n, _sub) = counted(&obs);

    assert!(ro.set("a", 2).is_err());
    assert_eq!(n.get(), 0);
}

#[test]
fn filtered_array_is_wrapped_and_readable() {
    let rt = Runtime::new();
    let arr = rt.proxy(&Target::array_from([1, 2, 3]), false);
    let filtered = arr
        .filter(|x, _| Ok(x.as_f64().is_some_and(|n| n > 1.0)))
        .unwrap();
    let filtered = reactive(&filtered);
    assert_eq!(filtered.get("length").unwrap(), Value::from(2));
    assert_eq!(filtered.to_json(), serde_json::json!([2, 3]));
}

// ═════════════════════════════════════════════════════════════════════════
// Known hazards
// ═════════════════════════════════════════════════════════════════════════

/// A leaked guard keeps its observer current for the rest of the runtime's
/// life. Nothing detects this; the test pins down what callers will see.
#[test]
fn leaked_track_guard_captures_every_later_read() {
    let rt = Runtime::new();
    let data = rt.proxy(&Target::object_from([("a", 1), ("b", 2)]), false);

    let leaked = rt.observer();
    std::mem::forget(leaked.track());
    assert_eq!(rt.stats().tracking_depth, 1);

    // Reads made long after the region should have ended still land on it.
    data.get("a").unwrap();
    assert_eq!(rt.current_observer(), Some(leaked.clone()));
    assert!(leaked.observes(data.target(), Some(&"a".into())));

    // A later balanced region nests on top and restores the leaked one.
    let later = tracked(&rt, || {
        data.get("b").unwrap();
    });
    assert!(later.observes(data.target(), Some(&"b".into())));
    assert!(!leaked.observes(data.target(), Some(&"b".into())));
    assert_eq!(rt.stats().tracking_depth, 1);

    data.get("b").unwrap();
    assert!(leaked.observes(data.target(), Some(&"b".into())));

    let (n, _sub) = counted(&leaked);
    data.set("b", 3).unwrap();
    assert_eq!(n.get(), 1);
}
