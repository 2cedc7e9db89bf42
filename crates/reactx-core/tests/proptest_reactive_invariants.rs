//! Property-based invariant tests for the reactive proxy layer.
//!
//! 1. Proxy identity: wrapping the same target twice yields the same proxy
//! 2. Primitive passthrough: non-container values are returned unchanged
//! 3. Readonly enforcement: rejected writes leave the data and observers alone
//! 4. Key precision: a write notifies observers of that key only
//! 5. Mutating array methods notify length observers exactly once per call
//! 6. Raw storage never holds proxies
//! 7. Readonly views always read what the mutable view wrote

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use reactx_core::{Observer, Runtime, Subscription, Target, Value};

// ── Helpers ──────────────────────────────────────────────────────────

fn counted(obs: &Observer) -> (Rc<Cell<u32>>, Subscription) {
    let count = Rc::new(Cell::new(0));
    let handle = Rc::clone(&count);
    let sub = obs.subscribe(move || handle.set(handle.get() + 1));
    (count, sub)
}

fn arb_primitive() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-1_000_000i32..1_000_000).prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

fn arb_keys() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::btree_set("[a-z]{1,6}", 1..8).prop_map(|keys| keys.into_iter().collect())
}

#[derive(Debug, Clone)]
enum ArrayOp {
    Push(i32),
    Pop,
    Shift,
    Unshift(i32),
    Splice(usize, usize, i32),
    Sort,
    Reverse,
}

fn arb_array_op() -> impl Strategy<Value = ArrayOp> {
    prop_oneof![
        any::<i32>().prop_map(ArrayOp::Push),
        Just(ArrayOp::Pop),
        Just(ArrayOp::Shift),
        any::<i32>().prop_map(ArrayOp::Unshift),
        (0usize..6, 0usize..4, any::<i32>()).prop_map(|(s, d, v)| ArrayOp::Splice(s, d, v)),
        Just(ArrayOp::Sort),
        Just(ArrayOp::Reverse),
    ]
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Proxy identity
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn wrapping_is_idempotent(keys in arb_keys(), readonly in any::<bool>()) {
        let rt = Runtime::new();
        let raw = Target::object_from(keys.iter().map(|k| (k.as_str(), 1)));
        let first = rt.wrap(&raw, readonly);
        let second = rt.wrap(&raw, readonly);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(rt.wrap(first.clone(), readonly), first.clone());

        // Switching views unwraps first and never nests.
        let flipped = rt.wrap(first.clone(), !readonly);
        let flipped = flipped.as_reactive().unwrap();
        prop_assert!(flipped.target().ptr_eq(&raw));
        prop_assert_eq!(flipped.is_readonly(), !readonly);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Primitive passthrough
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn primitives_pass_through(value in arb_primitive(), readonly in any::<bool>()) {
        let rt = Runtime::new();
        let wrapped = rt.wrap(value.clone(), readonly);
        prop_assert!(wrapped.as_reactive().is_none());
        prop_assert_eq!(wrapped, value);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Readonly enforcement
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn readonly_writes_change_nothing(keys in arb_keys(), value in arb_primitive()) {
        let rt = Runtime::new();
        let raw = Target::object_from(keys.iter().map(|k| (k.as_str(), 0)));
        let ro = rt.proxy(&raw, true);
        let obs = rt.observer();
        let guard = obs.track();
        for key in &keys {
            ro.get(key.as_str()).unwrap();
        }
        guard.untrack();
        let (count, _sub) = counted(&obs);

        for key in &keys {
            prop_assert!(ro.set(key.as_str(), value.clone()).unwrap_err().is_readonly_mutation());
            prop_assert!(ro.delete(key.as_str()).unwrap_err().is_readonly_mutation());
        }
        prop_assert_eq!(count.get(), 0);
        for key in &keys {
            prop_assert_eq!(raw.get(key.as_str()), Value::from(0));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Key precision
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn writes_notify_only_observers_of_the_key(
        keys in arb_keys(),
        watched in any::<prop::sample::Index>(),
        written in any::<prop::sample::Index>(),
    ) {
        let rt = Runtime::new();
        let raw = Target::object_from(keys.iter().map(|k| (k.as_str(), 0)));
        let proxy = rt.proxy(&raw, false);
        let watched = watched.get(&keys);
        let written = written.get(&keys);

        let obs = rt.observer();
        let guard = obs.track();
        proxy.get(watched.as_str()).unwrap();
        guard.untrack();
        let (count, _sub) = counted(&obs);

        proxy.set(written.as_str(), 1).unwrap();
        let expected = u32::from(watched == written);
        prop_assert_eq!(count.get(), expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Mutating array methods notify once per call
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn array_mutators_notify_once(
        initial in proptest::collection::vec(any::<i32>(), 0..6),
        ops in proptest::collection::vec(arb_array_op(), 1..12),
    ) {
        let rt = Runtime::new();
        let list = rt.proxy(&Target::array_from(initial), false);
        let obs = rt.observer();
        let guard = obs.track();
        let _ = list.len();
        guard.untrack();
        let (count, _sub) = counted(&obs);

        for (done, op) in ops.iter().enumerate() {
            match op {
                ArrayOp::Push(v) => { list.push([*v]).unwrap(); }
                ArrayOp::Pop => { list.pop().unwrap(); }
                ArrayOp::Shift => { list.shift().unwrap(); }
                ArrayOp::Unshift(v) => { list.unshift([*v]).unwrap(); }
                ArrayOp::Splice(start, delete, v) => {
                    let start = (*start).min(list.target().len());
                    list.splice(start, *delete, [*v]).unwrap();
                }
                ArrayOp::Sort => { list.sort().unwrap(); }
                ArrayOp::Reverse => { list.reverse().unwrap(); }
            }
            prop_assert_eq!(count.get() as usize, done + 1);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Raw storage never holds proxies
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn stored_proxies_are_unwrapped(keys in arb_keys(), readonly_child in any::<bool>()) {
        let rt = Runtime::new();
        let parent = rt.proxy(&Target::new_object(), false);
        let child_raw = Target::object_from([("leaf", 1)]);
        let child = rt.proxy(&child_raw, readonly_child);

        for key in &keys {
            parent.set(key.as_str(), &child).unwrap();
            let stored = parent.target().get(key.as_str());
            prop_assert!(stored.as_reactive().is_none());
            prop_assert!(stored.as_target().is_some_and(|t| t.ptr_eq(&child_raw)));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Views agree
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn readonly_view_reads_mutable_writes(
        keys in arb_keys(),
        values in proptest::collection::vec(-1000i32..1000, 8),
    ) {
        let rt = Runtime::new();
        let raw = Target::new_object();
        let mutable = rt.proxy(&raw, false);
        let ro = mutable.readonly_view();

        for (key, value) in keys.iter().zip(values.iter()) {
            mutable.set(key.as_str(), *value).unwrap();
            prop_assert_eq!(ro.get(key.as_str()).unwrap(), Value::from(*value));
        }
        prop_assert_eq!(ro.keys().len(), keys.len().min(values.len()));
    }
}
