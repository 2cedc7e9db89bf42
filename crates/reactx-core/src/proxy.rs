#![forbid(unsafe_code)]

//! Proxy factory and the object traps.
//!
//! [`Runtime::wrap`] turns a raw [`Target`] into a [`Reactive`] proxy. Reads
//! through the proxy are attributed to the runtime's current observer;
//! writes and deletes notify every observer registered for the written key
//! and every observer registered for the target as a whole.
//!
//! # Design
//!
//! - **Identity.** Each runtime keeps one cache per readonly-ness, keyed by
//!   target identity and holding weak references. Wrapping the same target
//!   with the same readonly-ness yields the same proxy while that proxy is
//!   alive.
//! - **Lineage.** Every proxy remembers the chain of ancestor targets (and
//!   keys) it was reached through. A nested read re-links a cached proxy to
//!   the path it was just reached by, so the most recent access path wins.
//! - **Readonly invalidation.** A successful write evicts the readonly cache
//!   entries of the written target and of every live ancestor in its lineage
//!   except the access root. The next readonly read along that path builds
//!   fresh proxies, so reference-equality change detectors see a new nested
//!   reference, while the root's readonly proxy keeps its identity.
//!
//! # Invariants
//!
//! 1. Raw storage never holds a proxy; values are unwrapped on write.
//! 2. Primitives, functions and opaque values are never wrapped.
//! 3. Readonly writes fail with [`ReactiveError::ReadonlyMutation`] before
//!    touching the target, and notify nobody.
//! 4. Fixed (non-configurable) properties are returned raw and untracked.
//!
//! # Failure Modes
//!
//! - **Shared sub-graphs**: a target reachable through two parents only
//!   invalidates the ancestors of the path it was last read through.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::{AHashMap, AHashSet};

use crate::array::ArrayMethod;
use crate::class::{Getter, invoke_method};
use crate::computed::ComputedGetter;
use crate::error::{ReactiveError, Result, TargetKind};
use crate::events::{ComputedData, MutatedData, Mutation, ReactiveEvent, TrackedData};
use crate::logging::trace;
use crate::runtime::Runtime;
use crate::value::{Function, Key, Node, Target, TargetId, Value, WeakTarget};

// ─── Caches ──────────────────────────────────────────────────────────────────

const PRUNE_INTERVAL: usize = 64;

/// Target-to-proxy cache holding weak references.
#[derive(Default)]
pub(crate) struct ProxyCache {
    entries: AHashMap<TargetId, Weak<ProxyInner>>,
    inserts: usize,
}

impl ProxyCache {
    pub(crate) fn get(&self, id: TargetId) -> Option<Rc<ProxyInner>> {
        self.entries.get(&id).and_then(Weak::upgrade)
    }

    pub(crate) fn insert(&mut self, id: TargetId, proxy: &Rc<ProxyInner>) {
        self.entries.insert(id, Rc::downgrade(proxy));
        self.inserts += 1;
        if self.inserts % PRUNE_INTERVAL == 0 {
            self.prune();
        }
    }

    pub(crate) fn remove(&mut self, id: TargetId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub(crate) fn prune(&mut self) {
        self.entries.retain(|_, proxy| proxy.strong_count() > 0);
    }

    pub(crate) fn live_len(&self) -> usize {
        self.entries
            .values()
            .filter(|proxy| proxy.strong_count() > 0)
            .count()
    }
}

// ─── Lineage ─────────────────────────────────────────────────────────────────

/// Ancestor targets and keys from the root a proxy was reached from.
#[derive(Clone, Default)]
pub(crate) struct Lineage {
    ancestors: Vec<WeakTarget>,
    path: Vec<Key>,
}

impl Lineage {
    fn contains(&self, id: TargetId) -> bool {
        self.ancestors.iter().any(|ancestor| ancestor.id() == id)
    }

    /// Cut the chain at the first occurrence of `id`.
    fn without_cycle(mut self, id: TargetId) -> Self {
        if let Some(pos) = self.ancestors.iter().position(|a| a.id() == id) {
            self.ancestors.truncate(pos);
            self.path.truncate(pos);
        }
        self
    }
}

// ─── Proxies ─────────────────────────────────────────────────────────────────

pub(crate) struct ProxyInner {
    target: Target,
    readonly: bool,
    runtime: Runtime,
    lineage: RefCell<Lineage>,
    bound_methods: RefCell<AHashMap<Rc<str>, Function>>,
    computed: RefCell<AHashMap<Rc<str>, Rc<ComputedGetter>>>,
}

/// A transparent, dependency-tracking view of a raw [`Target`].
///
/// Cloning yields another handle to the **same** proxy. Equality is
/// identity.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ProxyInner>,
}

/// Answer to the private marker key: what a proxy wraps.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyInfo {
    pub target: Target,
    pub readonly: bool,
}

/// Own-property descriptor. `value` is the raw stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub value: Value,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

/// How a key resolves on a target.
enum Lookup {
    Own(Value),
    Fixed(Value),
    Getter(Rc<str>, Getter),
    Method(Rc<str>),
    ArrayMethod(ArrayMethod),
    Missing,
}

/// Effect of a successful raw write.
struct WriteEffect {
    keys: Vec<Key>,
    changed: bool,
}

/// One slot reported in a mutation event.
struct Written<'a> {
    key: Option<&'a Key>,
    args: &'a [Value],
    changed: bool,
}

impl Runtime {
    /// Proxy factory.
    ///
    /// Primitives, functions and opaque values are returned unchanged. A
    /// proxy of the requested readonly-ness from this runtime is returned as
    /// is; any other proxy is unwrapped to its raw target first. Raw targets
    /// get their cached proxy, or a new one.
    pub fn wrap(&self, value: impl Into<Value>, readonly: bool) -> Value {
        match value.into() {
            Value::Target(target) => Value::Reactive(self.proxy_for(&target, readonly, None)),
            Value::Reactive(proxy) => {
                if proxy.is_readonly() == readonly && proxy.inner.runtime.ptr_eq(self) {
                    Value::Reactive(proxy)
                } else {
                    let lineage = proxy.lineage();
                    Value::Reactive(self.proxy_for(proxy.target(), readonly, Some(lineage)))
                }
            }
            other => other,
        }
    }

    /// Mutable proxy of `value` (see [`wrap`](Self::wrap)).
    pub fn reactive(&self, value: impl Into<Value>) -> Value {
        self.wrap(value, false)
    }

    /// Readonly proxy of `value` (see [`wrap`](Self::wrap)).
    pub fn readonly(&self, value: impl Into<Value>) -> Value {
        self.wrap(value, true)
    }

    /// Proxy of a raw target.
    #[must_use]
    pub fn proxy(&self, target: &Target, readonly: bool) -> Reactive {
        self.proxy_for(target, readonly, None)
    }

    /// Cached or new proxy for `target`. A cached proxy is re-linked to
    /// `lineage` when one is given.
    pub(crate) fn proxy_for(&self, target: &Target, readonly: bool, lineage: Option<Lineage>) -> Reactive {
        let id = target.id();
        let cached = self.cache(readonly).borrow().get(id);
        if let Some(inner) = cached {
            let proxy = Reactive { inner };
            if let Some(lineage) = lineage {
                proxy.reconnect(lineage);
            }
            return proxy;
        }

        let lineage = lineage.map(|l| l.without_cycle(id)).unwrap_or_default();
        trace!(target_id = ?id, readonly, depth = lineage.path.len(), "proxy created");
        let inner = Rc::new(ProxyInner {
            target: target.clone(),
            readonly,
            runtime: self.clone(),
            lineage: RefCell::new(lineage),
            bound_methods: RefCell::new(AHashMap::new()),
            computed: RefCell::new(AHashMap::new()),
        });
        self.cache(readonly).borrow_mut().insert(id, &inner);
        Reactive { inner }
    }
}

impl Reactive {
    // ── identity ────────────────────────────────────────────────────────────

    /// The raw target.
    #[must_use]
    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.inner.readonly
    }

    #[must_use]
    pub fn kind(&self) -> TargetKind {
        self.inner.target.kind()
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        self.kind() == TargetKind::Array
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn proxy_info(&self) -> ProxyInfo {
        ProxyInfo {
            target: self.inner.target.clone(),
            readonly: self.inner.readonly,
        }
    }

    /// Readonly proxy of the same target, reached through the same path.
    #[must_use]
    pub fn readonly_view(&self) -> Self {
        self.inner
            .runtime
            .proxy_for(&self.inner.target, true, Some(self.lineage()))
    }

    /// Mutable proxy of the same target, reached through the same path.
    #[must_use]
    pub fn mutable_view(&self) -> Self {
        self.inner
            .runtime
            .proxy_for(&self.inner.target, false, Some(self.lineage()))
    }

    /// Keys from the root this proxy was last reached from.
    #[must_use]
    pub fn path(&self) -> Vec<Key> {
        self.inner.lineage.borrow().path.clone()
    }

    /// [`path`](Self::path) rendered as event path segments.
    #[must_use]
    pub fn path_strings(&self) -> Vec<String> {
        self.inner
            .lineage
            .borrow()
            .path
            .iter()
            .map(Key::to_path_segment)
            .collect()
    }

    // ── traps ───────────────────────────────────────────────────────────────

    /// Read `key`.
    ///
    /// Containers come back wrapped with this proxy's readonly-ness. Symbol
    /// keys, functions, opaque values and fixed properties come back raw and
    /// untracked. The private marker key returns `{ target, readonly }`.
    /// Class getters are evaluated as memoized computed values and class
    /// methods come back as bound functions.
    pub fn get(&self, key: impl Into<Key>) -> Result<Value> {
        let key = key.into().for_kind(self.kind());
        if let Key::Symbol(symbol) = &key {
            if symbol.is_proxy_target() {
                return Ok(Value::Target(Target::object_from([
                    ("target", Value::from(&self.inner.target)),
                    ("readonly", Value::from(self.inner.readonly)),
                ])));
            }
            return Ok(self.inner.target.get(key));
        }

        match self.lookup(&key) {
            Lookup::Fixed(value) => Ok(value),
            Lookup::ArrayMethod(method) => Ok(Value::Function(self.array_method(method))),
            Lookup::Method(name) => Ok(Value::Function(self.bound_method(&name))),
            Lookup::Getter(name, body) => self.evaluate_getter(&key, &name, &body),
            Lookup::Own(value) => Ok(self.read(&key, value)),
            Lookup::Missing => Ok(self.read(&key, Value::Undefined)),
        }
    }

    /// Write `key`.
    ///
    /// Returns `Ok(false)` when the write is refused softly (fixed property,
    /// getter without setter). Readonly proxies return an error.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<bool> {
        let key = key.into().for_kind(self.kind());
        self.ensure_mutable()?;
        let value = value.into().into_raw();
        if key.is_symbol() {
            self.inner.target.insert(key, value);
            return Ok(true);
        }
        let Some(effect) = self.write(&key, value.clone())? else {
            return Ok(false);
        };
        self.commit_mutation("set", Some(&key), &effect.keys, &[value], effect.changed);
        Ok(true)
    }

    /// Delete `key`.
    ///
    /// Deleting an absent key succeeds without notifying. Deleting an array
    /// element leaves an `undefined` hole; `length` cannot be deleted.
    pub fn delete(&self, key: impl Into<Key>) -> Result<bool> {
        let key = key.into().for_kind(self.kind());
        self.ensure_mutable()?;
        let removed = {
            let mut node = self.inner.target.node_mut();
            match &mut *node {
                Node::Object(object) => {
                    if object.fixed.contains(&key) {
                        return Ok(false);
                    }
                    object.props.shift_remove(&key).is_some()
                }
                Node::Array(array) => match &key {
                    Key::Index(index) if *index < array.items.len() => {
                        array.items[*index] = Value::Undefined;
                        true
                    }
                    Key::Index(_) => false,
                    key if key.is_length() => return Ok(false),
                    key => array.props.shift_remove(key).is_some(),
                },
            }
        };
        if removed && !key.is_symbol() {
            self.commit_mutation("delete", Some(&key), std::slice::from_ref(&key), &[], true);
        }
        Ok(true)
    }

    /// Write several properties as one mutation.
    ///
    /// Every entry is applied before anyone is notified and each dependent is
    /// notified at most once for the whole call, so no observer runs against
    /// a half-applied state. Entries refused softly (fixed properties,
    /// getter-only keys) are skipped. Returns the number of entries written.
    ///
    /// If an entry fails (an invalid `length`), the entries before it stay
    /// written and are committed before the error is returned.
    pub fn assign<K, V>(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<usize>
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        self.ensure_mutable()?;
        let kind = self.kind();
        let mut written: Vec<(Key, Value, bool)> = Vec::new();
        let mut keys = Vec::new();
        let mut symbols = 0;
        let mut failure = None;
        for (key, value) in entries {
            let key = key.into().for_kind(kind);
            let value = value.into().into_raw();
            if key.is_symbol() {
                self.inner.target.insert(key, value);
                symbols += 1;
                continue;
            }
            match self.write(&key, value.clone()) {
                Ok(Some(effect)) => {
                    keys.extend(effect.keys);
                    written.push((key, value, effect.changed));
                }
                Ok(None) => {}
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        if !written.is_empty() {
            let writes: Vec<Written<'_>> = written
                .iter()
                .map(|(key, value, changed)| Written {
                    key: Some(key),
                    args: std::slice::from_ref(value),
                    changed: *changed,
                })
                .collect();
            self.commit_writes("assign", &writes, &keys);
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(written.len() + symbols),
        }
    }

    /// Whether `key` resolves on the target. Tracked like a read of `key`;
    /// the private marker key is always present.
    #[must_use]
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into().for_kind(self.kind());
        if let Key::Symbol(symbol) = &key {
            if symbol.is_proxy_target() {
                return true;
            }
            return !self.inner.target.get(key).is_undefined();
        }
        self.observe(Some(&key));
        !matches!(self.lookup(&key), Lookup::Missing)
    }

    /// Enumerable own keys: indices then named properties for arrays,
    /// insertion order for objects. Depends on the target as a whole.
    ///
    /// Array holes (deleted elements and slots skipped by growing writes) are
    /// not listed. Holes are stored as `undefined`, so an element explicitly
    /// set to `undefined` is skipped as well.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        self.observe(None);
        match &*self.inner.target.node() {
            Node::Object(object) => object
                .props
                .keys()
                .filter(|key| !key.is_symbol())
                .cloned()
                .collect(),
            Node::Array(array) => array
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| !item.is_undefined())
                .map(|(index, _)| Key::Index(index))
                .chain(array.props.keys().filter(|key| !key.is_symbol()).cloned())
                .collect(),
        }
    }

    /// Wrapped values in [`keys`](Self::keys) order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    /// Wrapped `(key, value)` pairs in [`keys`](Self::keys) order.
    #[must_use]
    pub fn entries(&self) -> Vec<(Key, Value)> {
        self.keys()
            .into_iter()
            .map(|key| {
                let raw = self.inner.target.get(key.clone());
                let value = self.wrap_child(&key, raw);
                (key, value)
            })
            .collect()
    }

    /// Array length (tracked as a read of `length`) or number of own
    /// properties (tracked as a whole-target dependency).
    #[must_use]
    pub fn len(&self) -> usize {
        if self.is_array() {
            self.observe(Some(&Key::length()));
        } else {
            self.observe(None);
        }
        self.inner.target.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descriptor of an own property. Depends on the target as a whole.
    #[must_use]
    pub fn get_own_property_descriptor(&self, key: impl Into<Key>) -> Option<PropertyDescriptor> {
        let key = key.into().for_kind(self.kind());
        self.observe(None);
        let describe = |value: &Value, fixed: bool| PropertyDescriptor {
            value: value.clone(),
            writable: !fixed,
            enumerable: true,
            configurable: !fixed,
        };
        match &*self.inner.target.node() {
            Node::Object(object) => object
                .props
                .get(&key)
                .map(|value| describe(value, object.fixed.contains(&key))),
            Node::Array(array) => match &key {
                Key::Index(index) => array.items.get(*index).map(|value| describe(value, false)),
                key if key.is_length() => Some(PropertyDescriptor {
                    value: Value::from(array.items.len()),
                    writable: true,
                    enumerable: false,
                    configurable: false,
                }),
                key => array.props.get(key).map(|value| describe(value, false)),
            },
        }
    }

    /// JSON snapshot of everything reachable from this proxy. Every reached
    /// container becomes a whole-target dependency.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut seen = AHashSet::new();
        let mut pending = vec![self.inner.target.clone()];
        while let Some(target) = pending.pop() {
            if !seen.insert(target.id()) {
                continue;
            }
            self.inner
                .runtime
                .observe_read(&target, None, self.inner.readonly);
            match &*target.node() {
                Node::Object(object) => pending.extend(object.props.values().filter_map(Value::as_target)),
                Node::Array(array) => pending.extend(array.items.iter().filter_map(Value::as_target)),
            }
        }
        self.inner.target.to_json()
    }

    /// Invoke the function stored (or resolved) under `key`.
    pub fn call(&self, key: impl Into<Key>, args: &[Value]) -> Result<Value> {
        let key = key.into();
        match self.get(key.clone())? {
            Value::Function(function) => function.call(args),
            _ => Err(ReactiveError::NotCallable {
                key: key.to_string(),
            }),
        }
    }

    // ── internals ───────────────────────────────────────────────────────────

    pub(crate) fn ensure_mutable(&self) -> Result<()> {
        if self.inner.readonly {
            Err(ReactiveError::readonly(self.kind()))
        } else {
            Ok(())
        }
    }

    pub(crate) fn lineage(&self) -> Lineage {
        self.inner.lineage.borrow().clone()
    }

    fn reconnect(&self, lineage: Lineage) {
        if !lineage.contains(self.inner.target.id()) {
            *self.inner.lineage.borrow_mut() = lineage;
        }
    }

    /// Lineage of a value read under `key` of this proxy.
    pub(crate) fn child_lineage(&self, key: &Key) -> Lineage {
        let mut lineage = self.lineage();
        lineage.ancestors.push(self.inner.target.downgrade());
        lineage.path.push(key.clone());
        lineage
    }

    /// Wrap a raw value read under `key`.
    pub(crate) fn wrap_child(&self, key: &Key, value: Value) -> Value {
        match value {
            Value::Target(target) => Value::Reactive(self.inner.runtime.proxy_for(
                &target,
                self.inner.readonly,
                Some(self.child_lineage(key)),
            )),
            other => other,
        }
    }

    /// Record a dependency on `key` (or on the whole target).
    pub(crate) fn observe(&self, key: Option<&Key>) {
        self.inner
            .runtime
            .observe_read(&self.inner.target, key, self.inner.readonly);
    }

    fn lookup(&self, key: &Key) -> Lookup {
        match &*self.inner.target.node() {
            Node::Object(object) => {
                if let Some(value) = object.props.get(key) {
                    return if object.fixed.contains(key) {
                        Lookup::Fixed(value.clone())
                    } else {
                        Lookup::Own(value.clone())
                    };
                }
                let (Some(class), Key::Name(name)) = (&object.class, key) else {
                    return Lookup::Missing;
                };
                if let Some(getter) = class.getter(name) {
                    Lookup::Getter(Rc::clone(name), getter)
                } else if class.has_method(name) {
                    Lookup::Method(Rc::clone(name))
                } else {
                    Lookup::Missing
                }
            }
            Node::Array(array) => match key {
                Key::Index(index) => array
                    .items
                    .get(*index)
                    .cloned()
                    .map_or(Lookup::Missing, Lookup::Own),
                key if key.is_length() => Lookup::Own(Value::from(array.items.len())),
                key => match array.props.get(key) {
                    Some(value) => Lookup::Own(value.clone()),
                    None => key
                        .as_name()
                        .and_then(ArrayMethod::from_name)
                        .map_or(Lookup::Missing, Lookup::ArrayMethod),
                },
            },
        }
    }

    /// Tracked read of a plain slot.
    fn read(&self, key: &Key, raw: Value) -> Value {
        if matches!(raw, Value::Function(_) | Value::Opaque(_)) {
            return raw;
        }
        self.observe(Some(key));
        let runtime = &self.inner.runtime;
        if runtime.emits_tracked_events() {
            runtime.emit(|| {
                let mut path = self.path_strings();
                path.push(key.to_path_segment());
                ReactiveEvent::PropertyTracked(TrackedData {
                    path,
                    value: raw.to_json(),
                    readonly: self.inner.readonly,
                })
            });
        }
        self.wrap_child(key, raw)
    }

    fn evaluate_getter(&self, key: &Key, name: &Rc<str>, body: &Getter) -> Result<Value> {
        let computed = {
            let mut computed = self.inner.computed.borrow_mut();
            Rc::clone(
                computed
                    .entry(Rc::clone(name))
                    .or_insert_with(|| Rc::new(ComputedGetter::new(&self.inner.runtime))),
            )
        };
        let evaluation = computed.evaluate(&self.inner.runtime, self, body)?;
        if evaluation.recomputed {
            self.inner.runtime.emit(|| {
                let mut path = self.path_strings();
                path.push(key.to_path_segment());
                ReactiveEvent::ComputedEvaluated(ComputedData {
                    path,
                    value: evaluation.value.to_json(),
                    evaluation_count: evaluation.version,
                })
            });
        }
        Ok(self.wrap_child(key, evaluation.value))
    }

    fn bound_method(&self, name: &Rc<str>) -> Function {
        if let Some(function) = self.inner.bound_methods.borrow().get(name) {
            return function.clone();
        }
        let runtime = self.inner.runtime.clone();
        let target = self.inner.target.clone();
        let lineage = self.lineage();
        let method = name.to_string();
        let function = Function::new(name, move |args| {
            let class = target.class().ok_or_else(|| ReactiveError::NotCallable {
                key: method.clone(),
            })?;
            invoke_method(&runtime, &target, lineage.clone(), &class, &method, args)
        });
        self.inner
            .bound_methods
            .borrow_mut()
            .insert(Rc::clone(name), function.clone());
        function
    }

    /// Apply a write to the raw target. `None` means the write was refused.
    fn write(&self, key: &Key, value: Value) -> Result<Option<WriteEffect>> {
        let mut node = self.inner.target.node_mut();
        let effect = match &mut *node {
            Node::Object(object) => {
                if object.fixed.contains(key) {
                    return Ok(None);
                }
                let getter_only = !object.props.contains_key(key)
                    && matches!((&object.class, key), (Some(class), Key::Name(name)) if class.has_getter(name));
                if getter_only {
                    return Ok(None);
                }
                let previous = object.props.insert(key.clone(), value.clone());
                WriteEffect {
                    keys: vec![key.clone()],
                    changed: previous.as_ref() != Some(&value),
                }
            }
            Node::Array(array) => match key {
                Key::Index(index) => {
                    let index = *index;
                    let mut keys = vec![key.clone()];
                    let grew = index >= array.items.len();
                    if grew {
                        let len = index.checked_add(1).ok_or_else(|| ReactiveError::InvalidArrayLength {
                            value: index.to_string(),
                        })?;
                        array.items.resize(len, Value::Undefined);
                        keys.push(Key::length());
                    }
                    let previous = std::mem::replace(&mut array.items[index], value.clone());
                    WriteEffect {
                        keys,
                        changed: grew || previous != value,
                    }
                }
                key if key.is_length() => {
                    let new_len = array_length(&value)?;
                    let old_len = array.items.len();
                    let mut keys = vec![Key::length()];
                    keys.extend((new_len..old_len).map(Key::Index));
                    array.items.resize(new_len, Value::Undefined);
                    WriteEffect {
                        keys,
                        changed: new_len != old_len,
                    }
                }
                key => {
                    let previous = array.props.insert(key.clone(), value.clone());
                    WriteEffect {
                        keys: vec![key.clone()],
                        changed: previous.as_ref() != Some(&value),
                    }
                }
            },
        };
        Ok(Some(effect))
    }

    /// Invalidate readonly views along the lineage, report the mutation and
    /// notify dependents of `keys` and of the target as a whole.
    pub(crate) fn commit_mutation(
        &self,
        operation: &str,
        key: Option<&Key>,
        keys: &[Key],
        args: &[Value],
        changed: bool,
    ) {
        self.commit_writes(operation, &[Written { key, args, changed }], keys);
    }

    /// [`commit_mutation`](Self::commit_mutation) for several slots written
    /// by one operation: one event, one notification per dependent.
    fn commit_writes(&self, operation: &str, writes: &[Written<'_>], keys: &[Key]) {
        let runtime = &self.inner.runtime;

        // The access root keeps its readonly proxy; only the containers
        // below it get fresh ones.
        let mut chain = vec![self.inner.target.id()];
        chain.extend(
            self.inner
                .lineage
                .borrow()
                .ancestors
                .iter()
                .skip(1)
                .filter(|ancestor| ancestor.is_alive())
                .map(WeakTarget::id),
        );
        runtime.evict_readonly(&chain);

        runtime.emit(|| {
            let frame = runtime.current_execution();
            let base = self.path_strings();
            let mutations = writes
                .iter()
                .map(|write| {
                    let mut path = base.clone();
                    if let Some(key) = write.key {
                        path.push(key.to_path_segment());
                    }
                    Mutation {
                        operation: operation.to_string(),
                        property_path: runtime.path_string(&path),
                        delimiter: runtime.config().path_delimiter.clone(),
                        args: write.args.iter().map(Value::to_json).collect(),
                        has_changed_value: write.changed,
                    }
                })
                .collect();
            ReactiveEvent::PropertyMutated(MutatedData {
                action_id: frame.as_ref().map(|f| f.action_id),
                execution_id: frame.as_ref().map(|f| f.execution_id),
                mutations,
            })
        });

        runtime.notify_dependents(&self.inner.target, keys);
    }
}

fn array_length(value: &Value) -> Result<usize> {
    match value {
        Value::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= f64::from(u32::MAX) => {
            Ok(*n as usize)
        }
        other => Err(ReactiveError::InvalidArrayLength {
            value: format!("{other:?}"),
        }),
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flavor = if self.inner.readonly { "Readonly" } else { "Reactive" };
        write!(f, "{flavor}({:?})", self.inner.target)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
