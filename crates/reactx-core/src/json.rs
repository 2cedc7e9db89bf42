#![forbid(unsafe_code)]

//! Conversions between the value graph and `serde_json`.
//!
//! JSON input always produces fresh raw containers. Output is an untracked
//! snapshot; shared sub-graphs are expanded and cycles render as
//! `"[Circular]"`.

use ahash::AHashSet;
use serde_json::{Map, Number};

use crate::value::{Key, Node, Target, TargetId, Value};

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(items) => {
                Self::Target(Target::from_items(items.into_iter().map(Self::from).collect()))
            }
            serde_json::Value::Object(map) => Self::Target(Target::object_from(map)),
        }
    }
}

impl From<serde_json::Value> for Key {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::String(s) => Self::from(s),
            other => Self::from(other.to_string()),
        }
    }
}

/// Convert a number, keeping integral values integral.
pub(crate) fn number_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

impl Value {
    /// Untracked JSON snapshot of this value.
    ///
    /// Proxies are read through their raw target, so nothing is recorded as
    /// a dependency. Functions and opaque values become descriptive strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut visiting = AHashSet::new();
        to_json_inner(self, &mut visiting)
    }
}

impl Target {
    /// Untracked JSON snapshot of this container.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        Value::Target(self.clone()).to_json()
    }
}

fn to_json_inner(value: &Value, visiting: &mut AHashSet<TargetId>) -> serde_json::Value {
    match value {
        Value::Undefined | Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Function(function) => serde_json::Value::String(format!("{function:?}")),
        Value::Opaque(_) => serde_json::Value::String("[Opaque]".to_string()),
        Value::Target(target) => target_to_json(target, visiting),
        Value::Reactive(proxy) => target_to_json(proxy.target(), visiting),
    }
}

fn target_to_json(target: &Target, visiting: &mut AHashSet<TargetId>) -> serde_json::Value {
    let id = target.id();
    if !visiting.insert(id) {
        return serde_json::Value::String("[Circular]".to_string());
    }
    let slots = Slots::of(target);
    let json = match slots {
        Slots::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| to_json_inner(v, visiting)).collect())
        }
        Slots::Object(entries) => {
            let mut map = Map::new();
            for (key, value) in &entries {
                map.insert(key.to_string(), to_json_inner(value, visiting));
            }
            serde_json::Value::Object(map)
        }
    };
    visiting.remove(&id);
    json
}

enum Slots {
    Array(Vec<Value>),
    Object(Vec<(Key, Value)>),
}

impl Slots {
    fn of(target: &Target) -> Self {
        match &*target.node() {
            Node::Array(array) => Self::Array(array.items.clone()),
            Node::Object(object) => Self::Object(
                object
                    .props
                    .iter()
                    .filter(|(key, _)| !key.is_symbol())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        }
    }
}
