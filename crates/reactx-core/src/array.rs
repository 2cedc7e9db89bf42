#![forbid(unsafe_code)]

//! Array method interception.
//!
//! Mutating methods (`push`, `pop`, `shift`, `unshift`, `splice`, `sort`,
//! `reverse`) run against the raw array and then notify exactly once per
//! call: observers of `length`, observers of the touched indices and
//! observers of the whole array each hear about it a single time, however
//! many slots the method rewrote. Through a readonly view they fail.
//!
//! Iterating methods (`map`, `filter`, `find`, `findIndex`, `forEach`,
//! `some`, `every`, `reduce`, `reduceRight`) make the whole array a
//! dependency, hand callbacks wrapped elements, and return wrapped results.
//! They never notify.
//!
//! Every method is available twice: as a typed method on [`Reactive`] and as
//! a [`Function`] value returned by `get("push")` and friends.

use std::cmp::Ordering;
use std::ops::Range;

use crate::error::{ReactiveError, Result, TargetKind};
use crate::proxy::Reactive;
use crate::value::{Function, Key, Node, Target, Value};

/// Intercepted array methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayMethod {
    Push,
    Pop,
    Shift,
    Unshift,
    Splice,
    Sort,
    Reverse,
    Map,
    Filter,
    Find,
    FindIndex,
    ForEach,
    Some,
    Every,
    Reduce,
    ReduceRight,
}

impl ArrayMethod {
    pub const ALL: [Self; 16] = [
        Self::Push,
        Self::Pop,
        Self::Shift,
        Self::Unshift,
        Self::Splice,
        Self::Sort,
        Self::Reverse,
        Self::Map,
        Self::Filter,
        Self::Find,
        Self::FindIndex,
        Self::ForEach,
        Self::Some,
        Self::Every,
        Self::Reduce,
        Self::ReduceRight,
    ];

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pop => "pop",
            Self::Shift => "shift",
            Self::Unshift => "unshift",
            Self::Splice => "splice",
            Self::Sort => "sort",
            Self::Reverse => "reverse",
            Self::Map => "map",
            Self::Filter => "filter",
            Self::Find => "find",
            Self::FindIndex => "findIndex",
            Self::ForEach => "forEach",
            Self::Some => "some",
            Self::Every => "every",
            Self::Reduce => "reduce",
            Self::ReduceRight => "reduceRight",
        }
    }

    #[must_use]
    pub const fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::Push | Self::Pop | Self::Shift | Self::Unshift | Self::Splice | Self::Sort | Self::Reverse
        )
    }
}

impl Reactive {
    /// The function value handed out for `get(method)`.
    pub(crate) fn array_method(&self, method: ArrayMethod) -> Function {
        if self.is_readonly() && method.is_mutating() {
            return Function::new(method.name(), |_| Err(ReactiveError::readonly(TargetKind::Array)));
        }
        let this = self.clone();
        Function::new(method.name(), move |args| this.invoke_array_method(method, args))
    }

    /// Invoke `method` with JavaScript-style positional arguments.
    ///
    /// Callbacks are [`Function`] values called with `(element, index,
    /// array)`, or `(accumulator, element, index, array)` for the reducers.
    pub fn invoke_array_method(&self, method: ArrayMethod, args: &[Value]) -> Result<Value> {
        match method {
            ArrayMethod::Push => self.push(args.iter().cloned()).map(Value::from),
            ArrayMethod::Pop => self.pop(),
            ArrayMethod::Shift => self.shift(),
            ArrayMethod::Unshift => self.unshift(args.iter().cloned()).map(Value::from),
            ArrayMethod::Splice => {
                let len = self.target().len();
                let start = relative_index(args.first(), len, 0);
                let delete_count = match args.get(1) {
                    None => len - start,
                    Some(count) => count.as_f64().map_or(0, |n| n.max(0.0) as usize),
                };
                self.splice(start, delete_count, args.iter().skip(2).cloned())
            }
            ArrayMethod::Sort => {
                let sorted = match args.first() {
                    Some(Value::Function(compare)) => self.try_sort_by(|a, b| {
                        let order = compare.call(&[a.clone(), b.clone()])?;
                        Ok(ordering_of(order.as_f64().unwrap_or(0.0)))
                    }),
                    _ => self.sort(),
                };
                sorted.map(Value::Reactive)
            }
            ArrayMethod::Reverse => self.reverse().map(Value::Reactive),
            ArrayMethod::Map => {
                let callback = callback(method, args)?;
                self.map(|item, index| callback.call(&[item, Value::from(index), Value::from(self)]))
            }
            ArrayMethod::Filter => {
                let callback = callback(method, args)?;
                self.filter(|item, index| {
                    Ok(callback
                        .call(&[item.clone(), Value::from(index), Value::from(self)])?
                        .is_truthy())
                })
            }
            ArrayMethod::Find => {
                let callback = callback(method, args)?;
                self.find(|item, index| {
                    Ok(callback
                        .call(&[item.clone(), Value::from(index), Value::from(self)])?
                        .is_truthy())
                })
            }
            ArrayMethod::FindIndex => {
                let callback = callback(method, args)?;
                let found = self.find_index(|item, index| {
                    Ok(callback
                        .call(&[item.clone(), Value::from(index), Value::from(self)])?
                        .is_truthy())
                })?;
                Ok(found.map_or(Value::Number(-1.0), Value::from))
            }
            ArrayMethod::ForEach => {
                let callback = callback(method, args)?;
                self.for_each(|item, index| {
                    callback.call(&[item, Value::from(index), Value::from(self)])?;
                    Ok(())
                })?;
                Ok(Value::Undefined)
            }
            ArrayMethod::Some | ArrayMethod::Every => {
                let callback = callback(method, args)?;
                let predicate = |item: &Value, index: usize| -> Result<bool> {
                    Ok(callback
                        .call(&[item.clone(), Value::from(index), Value::from(self)])?
                        .is_truthy())
                };
                let result = if method == ArrayMethod::Some {
                    self.some(predicate)?
                } else {
                    self.every(predicate)?
                };
                Ok(Value::from(result))
            }
            ArrayMethod::Reduce | ArrayMethod::ReduceRight => {
                let callback = callback(method, args)?;
                let reducer = |acc: Value, item: Value, index: usize| {
                    callback.call(&[acc, item, Value::from(index), Value::from(self)])
                };
                self.fold(method == ArrayMethod::ReduceRight, args.get(1).cloned(), reducer)
            }
        }
    }

    // ── mutating ────────────────────────────────────────────────────────────

    /// Append `items`; returns the new length.
    pub fn push<V: Into<Value>>(&self, items: impl IntoIterator<Item = V>) -> Result<usize> {
        let items = raw_values(items);
        let args = items.clone();
        self.mutate(ArrayMethod::Push, &args, |vec| {
            let start = vec.len();
            vec.extend(items);
            Ok((vec.len(), start..vec.len()))
        })
    }

    /// Remove and return the last element (wrapped), or `undefined`.
    pub fn pop(&self) -> Result<Value> {
        let popped = self.mutate(ArrayMethod::Pop, &[], |vec| {
            let len = vec.len();
            let popped = vec.pop().unwrap_or_default();
            Ok((popped, len.saturating_sub(1)..len))
        })?;
        Ok(self.wrap_result(popped))
    }

    /// Remove and return the first element (wrapped), or `undefined`.
    pub fn shift(&self) -> Result<Value> {
        let shifted = self.mutate(ArrayMethod::Shift, &[], |vec| {
            let len = vec.len();
            let shifted = if vec.is_empty() { Value::Undefined } else { vec.remove(0) };
            Ok((shifted, 0..len))
        })?;
        Ok(self.wrap_result(shifted))
    }

    /// Prepend `items`; returns the new length.
    pub fn unshift<V: Into<Value>>(&self, items: impl IntoIterator<Item = V>) -> Result<usize> {
        let items = raw_values(items);
        let args = items.clone();
        self.mutate(ArrayMethod::Unshift, &args, |vec| {
            vec.splice(0..0, items);
            Ok((vec.len(), 0..vec.len()))
        })
    }

    /// Remove `delete_count` elements at `start` and insert `items` there.
    /// Returns the removed elements as a new wrapped array.
    pub fn splice<V: Into<Value>>(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = V>,
    ) -> Result<Value> {
        let items = raw_values(items);
        let mut args = vec![Value::from(start), Value::from(delete_count)];
        args.extend(items.iter().cloned());
        let removed = self.mutate(ArrayMethod::Splice, &args, |vec| {
            let old_len = vec.len();
            let start = start.min(old_len);
            let end = start + delete_count.min(old_len - start);
            let inserted = items.len();
            let removed: Vec<Value> = vec.splice(start..end, items).collect();
            let touched = if removed.len() == inserted {
                start..start + inserted
            } else {
                start..old_len.max(vec.len())
            };
            Ok((removed, touched))
        })?;
        Ok(self.wrap_result(Value::Target(Target::from_items(removed))))
    }

    /// Sort in place by string order, `undefined` last. Returns this proxy.
    pub fn sort(&self) -> Result<Self> {
        self.sort_by(default_order)
    }

    /// Sort in place with `compare`, which receives raw values. Returns this
    /// proxy.
    pub fn sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<Self> {
        self.try_sort_by(|a, b| Ok(compare(a, b)))
    }

    /// [`sort_by`](Self::sort_by) with a fallible comparator. On error the
    /// array is left untouched and nobody is notified.
    pub fn try_sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> Result<Ordering>) -> Result<Self> {
        self.mutate(ArrayMethod::Sort, &[], |vec| {
            *vec = merge_sort(std::mem::take(vec), &mut compare)?;
            Ok(((), 0..vec.len()))
        })?;
        Ok(self.clone())
    }

    /// Reverse in place. Returns this proxy.
    pub fn reverse(&self) -> Result<Self> {
        self.mutate(ArrayMethod::Reverse, &[], |vec| {
            vec.reverse();
            Ok(((), 0..vec.len()))
        })?;
        Ok(self.clone())
    }

    // ── iterating ───────────────────────────────────────────────────────────

    /// New wrapped array of `f(element, index)`.
    pub fn map(&self, mut f: impl FnMut(Value, usize) -> Result<Value>) -> Result<Value> {
        let mut mapped = Vec::new();
        for (index, item) in self.iteration_items()?.into_iter().enumerate() {
            mapped.push(f(item, index)?.into_raw());
        }
        Ok(self.wrap_result(Value::Target(Target::from_items(mapped))))
    }

    /// New wrapped array of the elements `f` accepts.
    pub fn filter(&self, mut f: impl FnMut(&Value, usize) -> Result<bool>) -> Result<Value> {
        let mut kept = Vec::new();
        for (index, item) in self.iteration_items()?.into_iter().enumerate() {
            if f(&item, index)? {
                kept.push(item.into_raw());
            }
        }
        Ok(self.wrap_result(Value::Target(Target::from_items(kept))))
    }

    /// First (wrapped) element `f` accepts, or `undefined`.
    pub fn find(&self, mut f: impl FnMut(&Value, usize) -> Result<bool>) -> Result<Value> {
        for (index, item) in self.iteration_items()?.into_iter().enumerate() {
            if f(&item, index)? {
                return Ok(item);
            }
        }
        Ok(Value::Undefined)
    }

    /// Index of the first element `f` accepts.
    pub fn find_index(&self, mut f: impl FnMut(&Value, usize) -> Result<bool>) -> Result<Option<usize>> {
        for (index, item) in self.iteration_items()?.into_iter().enumerate() {
            if f(&item, index)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    pub fn for_each(&self, mut f: impl FnMut(Value, usize) -> Result<()>) -> Result<()> {
        for (index, item) in self.iteration_items()?.into_iter().enumerate() {
            f(item, index)?;
        }
        Ok(())
    }

    pub fn some(&self, mut f: impl FnMut(&Value, usize) -> Result<bool>) -> Result<bool> {
        for (index, item) in self.iteration_items()?.into_iter().enumerate() {
            if f(&item, index)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn every(&self, mut f: impl FnMut(&Value, usize) -> Result<bool>) -> Result<bool> {
        for (index, item) in self.iteration_items()?.into_iter().enumerate() {
            if !f(&item, index)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Left fold. `initial` is wrapped like any other read.
    pub fn reduce(
        &self,
        initial: impl Into<Value>,
        f: impl FnMut(Value, Value, usize) -> Result<Value>,
    ) -> Result<Value> {
        self.fold(false, Some(initial.into()), f)
    }

    /// Right fold. `initial` is wrapped like any other read.
    pub fn reduce_right(
        &self,
        initial: impl Into<Value>,
        f: impl FnMut(Value, Value, usize) -> Result<Value>,
    ) -> Result<Value> {
        self.fold(true, Some(initial.into()), f)
    }

    // ── internals ───────────────────────────────────────────────────────────

    fn fold(
        &self,
        from_right: bool,
        initial: Option<Value>,
        mut f: impl FnMut(Value, Value, usize) -> Result<Value>,
    ) -> Result<Value> {
        let mut items: Vec<(usize, Value)> = self.iteration_items()?.into_iter().enumerate().collect();
        if from_right {
            items.reverse();
        }
        let mut items = items.into_iter();
        let mut acc = match initial {
            Some(initial) => self.wrap_result(initial),
            None => match items.next() {
                Some((_, first)) => first,
                None => {
                    return Err(ReactiveError::custom("Reduce of empty array with no initial value"));
                }
            },
        };
        for (index, item) in items {
            acc = f(acc, item, index)?;
        }
        Ok(self.wrap_result(acc))
    }

    /// Apply `apply` to a copy of the elements, store the copy back and
    /// notify once for `length`, the touched indices and the whole array.
    fn mutate<R>(
        &self,
        method: ArrayMethod,
        args: &[Value],
        apply: impl FnOnce(&mut Vec<Value>) -> Result<(R, Range<usize>)>,
    ) -> Result<R> {
        if !self.is_array() {
            return Err(ReactiveError::NotAnArray);
        }
        self.ensure_mutable()?;
        let mut items = self.raw_items();
        let (result, touched) = apply(&mut items)?;
        if let Node::Array(array) = &mut *self.target().node_mut() {
            array.items = items;
        }
        let mut keys = vec![Key::length()];
        keys.extend(touched.map(Key::Index));
        self.commit_mutation(method.name(), None, &keys, args, true);
        Ok(result)
    }

    /// Elements wrapped as reads of their index, after recording a
    /// whole-array dependency.
    fn iteration_items(&self) -> Result<Vec<Value>> {
        if !self.is_array() {
            return Err(ReactiveError::NotAnArray);
        }
        self.observe(None);
        Ok(self
            .raw_items()
            .into_iter()
            .enumerate()
            .map(|(index, item)| self.wrap_child(&Key::Index(index), item))
            .collect())
    }

    fn raw_items(&self) -> Vec<Value> {
        match &*self.target().node() {
            Node::Array(array) => array.items.clone(),
            Node::Object(_) => Vec::new(),
        }
    }

    /// Wrap a method result with this proxy's readonly-ness.
    fn wrap_result(&self, value: Value) -> Value {
        self.runtime().wrap(value, self.is_readonly())
    }
}

fn raw_values<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Vec<Value> {
    items.into_iter().map(|item| item.into().into_raw()).collect()
}

fn callback(method: ArrayMethod, args: &[Value]) -> Result<Function> {
    match args.first() {
        Some(Value::Function(function)) => Ok(function.clone()),
        _ => Err(ReactiveError::NotCallable {
            key: method.name().to_string(),
        }),
    }
}

/// Stable merge sort that stops at the first comparator error. Inconsistent
/// comparators produce some permutation instead of a panic.
fn merge_sort(
    mut items: Vec<Value>,
    compare: &mut impl FnMut(&Value, &Value) -> Result<Ordering>,
) -> Result<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare)?;
    let right = merge_sort(right, compare)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        let next = if compare(r, l)? == Ordering::Less {
            right.next()
        } else {
            left.next()
        };
        merged.extend(next);
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

/// Resolve a possibly negative index argument against `len`.
fn relative_index(arg: Option<&Value>, len: usize, default: usize) -> usize {
    let Some(n) = arg.and_then(Value::as_f64) else {
        return default.min(len);
    };
    if n < 0.0 {
        len.saturating_sub((-n) as usize)
    } else {
        (n as usize).min(len)
    }
}

fn ordering_of(n: f64) -> Ordering {
    if n < 0.0 {
        Ordering::Less
    } else if n > 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Default comparator: string order, `undefined` last.
fn default_order(a: &Value, b: &Value) -> Ordering {
    match (a.is_undefined(), b.is_undefined()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => sort_string(a).cmp(&sort_string(b)),
    }
}

fn sort_string(value: &Value) -> String {
    match value {
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e21 => format!("{}", *n as i64),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Undefined => "undefined".to_string(),
        Value::Target(target) if target.is_array() => "[array]".to_string(),
        Value::Reactive(proxy) if proxy.is_array() => "[array]".to_string(),
        Value::Function(function) => format!("{function:?}"),
        _ => "[object Object]".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
