#![forbid(unsafe_code)]

//! Dynamic value graph that reactive proxies wrap.
//!
//! A [`Target`] is a raw container (object or array) with pointer identity.
//! A [`Value`] is anything that can sit in a property slot: primitives, raw
//! targets, functions, opaque host values, or a [`Reactive`] proxy handle.
//!
//! # Invariants
//!
//! 1. Raw containers never store proxies. Writing a [`Value::Reactive`] into
//!    a container stores the proxy's raw target instead.
//! 2. Containers, functions, opaque values and proxies compare by identity;
//!    primitives compare by value (`NaN != NaN`).
//! 3. Object properties keep insertion order.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::class::Class;
use crate::error::{Result, TargetKind};
use crate::proxy::Reactive;

// ─── Symbols and keys ────────────────────────────────────────────────────────

/// A unique property key, equal only to itself.
#[derive(Clone)]
pub struct Symbol(Rc<str>);

thread_local! {
    static PROXY_TARGET: Symbol = Symbol::new("PROXY_TARGET");
}

impl Symbol {
    #[must_use]
    pub fn new(description: &str) -> Self {
        Self(Rc::from(description))
    }

    /// Private marker key answering "what am I a proxy of".
    ///
    /// `has` reports it present on every proxy and `get` returns
    /// `{ target, readonly }`. Raw containers never carry it.
    #[must_use]
    pub fn proxy_target() -> Self {
        PROXY_TARGET.with(Clone::clone)
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_proxy_target(&self) -> bool {
        PROXY_TARGET.with(|marker| marker == self)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as *const u8 as usize).hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

/// Property key.
///
/// Arrays address elements by [`Key::Index`]; numeric names are normalized
/// to indices on arrays and indices to names on objects.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(Rc<str>),
    Index(usize),
    Symbol(Symbol),
}

impl Key {
    /// The `length` key of arrays.
    #[must_use]
    pub fn length() -> Self {
        Self::Name(Rc::from("length"))
    }

    #[must_use]
    pub fn is_symbol(&self) -> bool {
        matches!(self, Self::Symbol(_))
    }

    #[must_use]
    pub fn is_length(&self) -> bool {
        matches!(self, Self::Name(name) if &**name == "length")
    }

    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }

    pub(crate) fn for_kind(self, kind: TargetKind) -> Self {
        match (kind, self) {
            (TargetKind::Array, Self::Name(name)) => match parse_index(&name) {
                Some(index) => Self::Index(index),
                None => Self::Name(name),
            },
            (TargetKind::Array, Self::Index(index)) if index >= MAX_ARRAY_INDEX => {
                Self::Name(Rc::from(index.to_string()))
            }
            (TargetKind::Object, Self::Index(index)) => Self::Name(Rc::from(index.to_string())),
            (_, key) => key,
        }
    }

    /// Path segment used in events.
    #[must_use]
    pub fn to_path_segment(&self) -> String {
        self.to_string()
    }
}

/// Array indices are below `2^32 - 1`; larger numeric names are ordinary
/// named properties.
const MAX_ARRAY_INDEX: usize = u32::MAX as usize;

fn parse_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse::<usize>().ok().filter(|index| *index < MAX_ARRAY_INDEX)
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
            Self::Symbol(symbol) => write!(f, "{symbol:?}"),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name:?}"),
            Self::Index(index) => write!(f, "{index}"),
            Self::Symbol(symbol) => write!(f, "{symbol:?}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(Rc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(Rc::from(name))
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Self::Name(Rc::from(name.as_str()))
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

// ─── Functions and opaque host values ────────────────────────────────────────

type NativeFn = dyn Fn(&[Value]) -> Result<Value>;

/// A callable value. Functions are never wrapped and never tracked.
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    call: Rc<NativeFn>,
}

impl Function {
    pub fn new(name: &str, call: impl Fn(&[Value]) -> Result<Value> + 'static) -> Self {
        Self {
            name: Rc::from(name),
            call: Rc::new(call),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.call)(args)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.call, &other.call)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.name)
    }
}

/// Host value carried through the graph untouched (dates, maps, pending
/// futures). Proxies hand it back raw: never wrapped, never tracked.
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[Opaque]")
    }
}

// ─── Raw containers ──────────────────────────────────────────────────────────

/// Stable identity of a raw target, valid while any handle to it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

pub(crate) struct ObjectNode {
    pub(crate) props: IndexMap<Key, Value>,
    /// Non-configurable, non-writable properties.
    pub(crate) fixed: AHashSet<Key>,
    pub(crate) class: Option<Rc<Class>>,
}

pub(crate) struct ArrayNode {
    pub(crate) items: Vec<Value>,
    /// Named (non-index) properties.
    pub(crate) props: IndexMap<Key, Value>,
}

pub(crate) enum Node {
    Object(ObjectNode),
    Array(ArrayNode),
}

impl Node {
    pub(crate) fn kind(&self) -> TargetKind {
        match self {
            Self::Object(_) => TargetKind::Object,
            Self::Array(_) => TargetKind::Array,
        }
    }
}

/// A raw object or array. Clones share the same container.
///
/// Reads and writes made directly on a `Target` bypass dependency tracking;
/// go through [`Runtime::wrap`](crate::Runtime::wrap) to observe them.
#[derive(Clone)]
pub struct Target(Rc<RefCell<Node>>);

#[derive(Clone)]
pub(crate) struct WeakTarget(Weak<RefCell<Node>>);

impl WeakTarget {
    pub(crate) fn upgrade(&self) -> Option<Target> {
        self.0.upgrade().map(Target)
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub(crate) fn id(&self) -> TargetId {
        TargetId(self.0.as_ptr() as *const u8 as usize)
    }
}

impl Target {
    #[must_use]
    pub fn new_object() -> Self {
        Self::from_node(Node::Object(ObjectNode {
            props: IndexMap::new(),
            fixed: AHashSet::new(),
            class: None,
        }))
    }

    #[must_use]
    pub fn new_array() -> Self {
        Self::from_items(Vec::new())
    }

    /// Build an object from key/value pairs, in order.
    pub fn object_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        let target = Self::new_object();
        for (key, value) in entries {
            target.insert(key, value);
        }
        target
    }

    /// Build an array from values, in order.
    pub fn array_from<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::from_items(items.into_iter().map(|v| v.into().into_raw()).collect())
    }

    pub(crate) fn from_items(items: Vec<Value>) -> Self {
        Self::from_node(Node::Array(ArrayNode {
            items,
            props: IndexMap::new(),
        }))
    }

    /// Create an instance of `class` with the given own fields.
    pub fn instance_of<K, V>(class: &Rc<Class>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        let target = Self::object_from(fields);
        if let Node::Object(object) = &mut *target.node_mut() {
            object.class = Some(Rc::clone(class));
        }
        target
    }

    fn from_node(node: Node) -> Self {
        Self(Rc::new(RefCell::new(node)))
    }

    #[must_use]
    pub fn id(&self) -> TargetId {
        TargetId(Rc::as_ptr(&self.0) as *const u8 as usize)
    }

    #[must_use]
    pub fn kind(&self) -> TargetKind {
        self.0.borrow().kind()
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        self.kind() == TargetKind::Array
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, other.as_rc())
    }

    /// Prototype of a class instance.
    ///
    /// An object is a custom class instance iff its prototype is a [`Class`]
    /// rather than the base object prototype.
    #[must_use]
    pub fn class(&self) -> Option<Rc<Class>> {
        match &*self.0.borrow() {
            Node::Object(object) => object.class.clone(),
            Node::Array(_) => None,
        }
    }

    #[must_use]
    pub fn is_class_instance(&self) -> bool {
        self.class().is_some()
    }

    /// Untracked raw read of an own property (or array element / `length`).
    #[must_use]
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into().for_kind(self.kind());
        match &*self.0.borrow() {
            Node::Object(object) => object.props.get(&key).cloned().unwrap_or_default(),
            Node::Array(array) => match &key {
                Key::Index(index) => array.items.get(*index).cloned().unwrap_or_default(),
                key if key.is_length() => Value::from(array.items.len()),
                key => array.props.get(key).cloned().unwrap_or_default(),
            },
        }
    }

    /// Untracked raw write. Proxies are unwrapped before storage.
    pub fn insert(&self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into().for_kind(self.kind());
        let value = value.into().into_raw();
        match &mut *self.node_mut() {
            Node::Object(object) => {
                object.props.insert(key, value);
            }
            Node::Array(array) => match key {
                Key::Index(index) => match index.checked_add(1) {
                    Some(len) => {
                        if index >= array.items.len() {
                            array.items.resize(len, Value::Undefined);
                        }
                        array.items[index] = value;
                    }
                    None => {
                        array.props.insert(Key::Index(index).for_kind(TargetKind::Object), value);
                    }
                },
                key => {
                    array.props.insert(key, value);
                }
            },
        }
    }

    /// Define a non-configurable, non-writable property.
    ///
    /// Proxies return it raw and untracked; writes and deletes through a
    /// proxy fail softly (`Ok(false)`).
    pub fn define_fixed(&self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into().for_kind(self.kind());
        let value = value.into().into_raw();
        if let Node::Object(object) = &mut *self.node_mut() {
            object.props.insert(key.clone(), value);
            object.fixed.insert(key);
        }
    }

    /// Number of elements (arrays) or own properties (objects).
    #[must_use]
    pub fn len(&self) -> usize {
        match &*self.0.borrow() {
            Node::Object(object) => object.props.len(),
            Node::Array(array) => array.items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn downgrade(&self) -> WeakTarget {
        WeakTarget(Rc::downgrade(&self.0))
    }

    pub(crate) fn node(&self) -> Ref<'_, Node> {
        self.0.borrow()
    }

    pub(crate) fn node_mut(&self) -> RefMut<'_, Node> {
        self.0.borrow_mut()
    }

    fn as_rc(&self) -> &Rc<RefCell<Node>> {
        &self.0
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({}#{:x})", self.kind(), self.id().0)
    }
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// Anything that can be stored in, or read from, a property slot.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// Raw object or array.
    Target(Target),
    Function(Function),
    Opaque(Opaque),
    /// Proxy over a raw target.
    Reactive(Reactive),
}

impl Value {
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Self::Reactive(proxy) => Some(proxy),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            _ => None,
        }
    }

    /// The raw target behind a raw container or a proxy.
    #[must_use]
    pub fn as_target(&self) -> Option<Target> {
        match self {
            Self::Target(target) => Some(target.clone()),
            Self::Reactive(proxy) => Some(proxy.target().clone()),
            _ => None,
        }
    }

    /// JavaScript-style truthiness.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Replace a proxy by its raw target; everything else is returned as is.
    #[must_use]
    pub fn into_raw(self) -> Self {
        match self {
            Self::Reactive(proxy) => Self::Target(proxy.target().clone()),
            other => other,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Target(target) => target.kind().as_str(),
            Self::Function(_) => "function",
            Self::Opaque(_) => "opaque",
            Self::Reactive(proxy) => proxy.kind().as_str(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Target(a), Self::Target(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            (Self::Reactive(a), Self::Reactive(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Target(target) => write!(f, "{target:?}"),
            Self::Function(function) => write!(f, "{function:?}"),
            Self::Opaque(opaque) => write!(f, "{opaque:?}"),
            Self::Reactive(proxy) => write!(f, "{proxy:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Self::Target(target)
    }
}

impl From<&Target> for Value {
    fn from(target: &Target) -> Self {
        Self::Target(target.clone())
    }
}

impl From<Reactive> for Value {
    fn from(proxy: Reactive) -> Self {
        Self::Reactive(proxy)
    }
}

impl From<&Reactive> for Value {
    fn from(proxy: &Reactive) -> Self {
        Self::Reactive(proxy.clone())
    }
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Self::Function(function)
    }
}

impl From<Opaque> for Value {
    fn from(opaque: Opaque) -> Self {
        Self::Opaque(opaque)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_names_become_indices_on_arrays() {
        assert_eq!(Key::from("3").for_kind(TargetKind::Array), Key::Index(3));
        assert_eq!(Key::from("03").for_kind(TargetKind::Array), Key::from("03"));
        assert_eq!(Key::from("length").for_kind(TargetKind::Array), Key::length());
        assert_eq!(Key::Index(2).for_kind(TargetKind::Object), Key::from("2"));
    }

    #[test]
    fn indices_past_the_array_limit_stay_names() {
        assert_eq!(Key::from("4294967294").for_kind(TargetKind::Array), Key::Index(4_294_967_294));
        assert_eq!(Key::from("4294967295").for_kind(TargetKind::Array), Key::from("4294967295"));
        assert_eq!(
            Key::from("18446744073709551615").for_kind(TargetKind::Array),
            Key::from("18446744073709551615")
        );
        assert_eq!(Key::Index(usize::MAX).for_kind(TargetKind::Array), Key::from(usize::MAX.to_string()));

        let arr = Target::array_from([1]);
        arr.insert(usize::MAX, 2);
        assert_eq!(arr.len(), 1);
        assert_eq!(arr.get(usize::MAX.to_string()), Value::from(2));
    }

    #[test]
    fn symbols_compare_by_identity() {
        let a = Symbol::new("tag");
        let b = Symbol::new("tag");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(Symbol::proxy_target().is_proxy_target());
        assert!(!a.is_proxy_target());
    }

    #[test]
    fn raw_array_insert_fills_holes() {
        let arr = Target::array_from([1, 2]);
        arr.insert(4usize, 5);
        assert_eq!(arr.len(), 5);
        assert!(arr.get(2usize).is_undefined());
        assert_eq!(arr.get("length"), Value::from(5usize));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Target::object_from([("x", 1)]);
        let b = Target::object_from([("x", 1)]);
        assert_ne!(Value::from(&a), Value::from(&b));
        assert_eq!(Value::from(&a), Value::from(a.clone()));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn truthiness_follows_js_rules() {
        assert!(!Value::from("").is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::from(Target::new_array()).is_truthy());
    }

    #[test]
    fn fixed_properties_are_recorded() {
        let obj = Target::new_object();
        obj.define_fixed("id", 7);
        assert_eq!(obj.get("id"), Value::from(7));
        match &*obj.node() {
            Node::Object(object) => assert!(object.fixed.contains(&Key::from("id"))),
            Node::Array(_) => unreachable!(),
        }
    }
}
