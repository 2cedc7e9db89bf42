#![forbid(unsafe_code)]

//! Merged views over several reactive objects.
//!
//! A [`Merged`] view resolves each key against its sources in order. Reads
//! and writes go through the source proxies, so dependency tracking,
//! notification and readonly enforcement behave exactly as they would on the
//! source itself.

use indexmap::IndexSet;

use crate::error::Result;
use crate::proxy::Reactive;
use crate::value::{Key, Value};

/// Read/write view over an ordered list of sources.
#[derive(Debug, Clone)]
pub struct Merged {
    sources: Vec<Reactive>,
}

impl Merged {
    pub fn new(sources: impl IntoIterator<Item = Reactive>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn sources(&self) -> &[Reactive] {
        &self.sources
    }

    /// First source that has `key`.
    fn owner(&self, key: &Key) -> Option<&Reactive> {
        self.sources.iter().find(|source| source.has(key))
    }

    /// Value of `key` from the first source that has it, else `undefined`.
    pub fn get(&self, key: impl Into<Key>) -> Result<Value> {
        let key = key.into();
        match self.owner(&key) {
            Some(source) => source.get(key),
            None => Ok(Value::Undefined),
        }
    }

    /// Write `key` on the first source that has it. Returns `Ok(false)` when
    /// no source has the key.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        match self.owner(&key) {
            Some(source) => source.set(key, value),
            None => Ok(false),
        }
    }

    #[must_use]
    pub fn has(&self, key: impl Into<Key>) -> bool {
        self.owner(&key.into()).is_some()
    }

    /// Ordered union of the sources' keys.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        let mut keys = IndexSet::new();
        for source in &self.sources {
            keys.extend(source.keys());
        }
        keys.into_iter().collect()
    }

    /// Snapshot with first-source-wins resolution.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut merged = serde_json::Map::new();
        for source in &self.sources {
            if let serde_json::Value::Object(map) = source.to_json() {
                for (key, value) in map {
                    merged.entry(key).or_insert(value);
                }
            }
        }
        serde_json::Value::Object(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::value::Target;
    use std::cell::Cell;
    use std::rc::Rc;

    fn sources(rt: &Runtime) -> (Target, Target, Merged) {
        let a = Target::object_from([("x", 1), ("shared", 1)]);
        let b = Target::object_from([("y", 2), ("shared", 2)]);
        let merged = Merged::new([rt.proxy(&a, false), rt.proxy(&b, false)]);
        (a, b, merged)
    }

    #[test]
    fn first_source_wins() {
        let rt = Runtime::new();
        let (_a, _b, merged) = sources(&rt);
        assert_eq!(merged.get("shared").unwrap(), Value::from(1));
        assert_eq!(merged.get("y").unwrap(), Value::from(2));
        assert!(merged.get("z").unwrap().is_undefined());
        assert_eq!(
            merged.keys(),
            vec![Key::from("x"), Key::from("shared"), Key::from("y")]
        );
        assert_eq!(merged.to_json(), serde_json::json!({"x": 1, "shared": 1, "y": 2}));
    }

    #[test]
    fn writes_go_to_the_owning_source() {
        let rt = Runtime::new();
        let (a, b, merged) = sources(&rt);
        assert!(merged.set("y", 5).unwrap());
        assert_eq!(b.get("y"), Value::from(5));
        assert!(merged.set("shared", 7).unwrap());
        assert_eq!(a.get("shared"), Value::from(7));
        assert_eq!(b.get("shared"), Value::from(2));
        assert!(!merged.set("nowhere", 1).unwrap());
        assert!(a.get("nowhere").is_undefined());
    }

    #[test]
    fn reads_through_the_view_are_tracked() {
        let rt = Runtime::new();
        let (_a, b, merged) = sources(&rt);
        let obs = rt.observer();
        let guard = obs.track();
        merged.get("y").unwrap();
        guard.untrack();

        let count = Rc::new(Cell::new(0));
        let handle = count.clone();
        let _sub = obs.subscribe(move || handle.set(handle.get() + 1));
        rt.proxy(&b, false).set("y", 3).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn readonly_sources_still_reject_writes() {
        let rt = Runtime::new();
        let raw = Target::object_from([("locked", true)]);
        let merged = Merged::new([rt.proxy(&raw, true)]);
        assert!(merged.set("locked", false).unwrap_err().is_readonly_mutation());
    }
}
