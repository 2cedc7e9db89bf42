#![forbid(unsafe_code)]

//! Class prototypes: computed getters and action methods.
//!
//! An object whose prototype is a [`Class`] is a *custom class instance*.
//! Reading a getter through a proxy evaluates it as a memoized computed
//! value; reading a method returns a bound [`Function`](crate::Function)
//! that runs as an action against the instance's mutable view.
//!
//! # Events
//!
//! Each method call emits `execution:start`, `instance:method` and
//! `execution:end`. The outermost call of a nested chain additionally emits
//! `action:start` / `action:end`, and every write it performs carries its
//! execution id.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use web_time::Instant;

use crate::error::{ReactiveError, Result};
use crate::events::{
    ActionEndData, ActionStartData, ExecutionEndData, ExecutionStartData, InstanceMethodData,
    ReactiveEvent,
};
use crate::logging::debug;
use crate::proxy::{Lineage, Reactive};
use crate::runtime::{ExecutionFrame, Runtime};
use crate::value::{Target, Value};

/// Getter body. Receives the proxy the getter was read through.
pub type Getter = Rc<dyn Fn(&Reactive) -> Result<Value>>;

/// Method body. Receives the instance's mutable view and the call arguments.
pub type Method = Rc<dyn Fn(&Reactive, &[Value]) -> Result<Value>>;

/// A named prototype.
pub struct Class {
    name: String,
    getters: IndexMap<String, Getter>,
    methods: IndexMap<String, Method>,
}

impl Class {
    /// Start building a class.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            class: Self {
                name: name.into(),
                getters: IndexMap::new(),
                methods: IndexMap::new(),
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn getter(&self, name: &str) -> Option<Getter> {
        self.getters.get(name).cloned()
    }

    pub(crate) fn method(&self, name: &str) -> Option<Method> {
        self.methods.get(name).cloned()
    }

    #[must_use]
    pub fn has_getter(&self, name: &str) -> bool {
        self.getters.contains_key(name)
    }

    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Whether `name` resolves on the prototype.
    #[must_use]
    pub fn has_member(&self, name: &str) -> bool {
        self.has_getter(name) || self.has_method(name)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`Class`].
#[must_use]
pub struct ClassBuilder {
    class: Class,
}

impl ClassBuilder {
    /// Add a getter. It is re-evaluated only after one of the values it read
    /// has been written.
    pub fn getter(mut self, name: &str, getter: impl Fn(&Reactive) -> Result<Value> + 'static) -> Self {
        self.class.getters.insert(name.to_string(), Rc::new(getter));
        self
    }

    /// Add a method.
    pub fn method(
        mut self,
        name: &str,
        method: impl Fn(&Reactive, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        self.class.methods.insert(name.to_string(), Rc::new(method));
        self
    }

    #[must_use]
    pub fn build(self) -> Rc<Class> {
        Rc::new(self.class)
    }
}

/// Run `name` of `class` as an action on the mutable view of `target`.
pub(crate) fn invoke_method(
    runtime: &Runtime,
    target: &Target,
    lineage: Lineage,
    class: &Class,
    name: &str,
    args: &[Value],
) -> Result<Value> {
    let method = class.method(name).ok_or_else(|| ReactiveError::NotCallable {
        key: name.to_string(),
    })?;
    let this = runtime.proxy_for(target, false, Some(lineage));

    let parent = runtime.current_execution();
    let action_id = parent.as_ref().map_or_else(|| runtime.next_id(), |p| p.action_id);
    let execution_id = runtime.next_id();
    let outermost = parent.is_none();
    let path = this.path_strings();

    if outermost {
        runtime.emit(|| {
            ReactiveEvent::ActionStart(ActionStartData {
                action_id,
                execution_id,
                name: name.to_string(),
                path: path.clone(),
                args: args.iter().map(Value::to_json).collect(),
            })
        });
    }
    runtime.emit(|| {
        ReactiveEvent::ExecutionStart(ExecutionStartData {
            action_id,
            execution_id,
            parent_execution_id: parent.as_ref().map(|p| p.execution_id),
            name: name.to_string(),
            path: path.clone(),
        })
    });
    debug!(class = class.name(), method = name, execution_id, "action started");

    runtime.push_execution(ExecutionFrame {
        action_id,
        execution_id,
    });
    let started = Instant::now();
    let result = method(&this, args);
    let duration = started.elapsed().as_secs_f64() * 1000.0;
    runtime.pop_execution();

    let error = result.as_ref().err().map(ToString::to_string);
    runtime.emit(|| {
        ReactiveEvent::InstanceMethod(InstanceMethodData {
            execution_id,
            method_name: name.to_string(),
            method_path: path.clone(),
            args: args.iter().map(Value::to_json).collect(),
            result: result.as_ref().ok().map(Value::to_json),
            error: error.clone(),
        })
    });
    runtime.emit(|| {
        ReactiveEvent::ExecutionEnd(ExecutionEndData {
            action_id,
            execution_id,
            duration,
            is_async: false,
            error: error.clone(),
        })
    });
    if outermost {
        runtime.emit(|| {
            ReactiveEvent::ActionEnd(ActionEndData {
                action_id,
                execution_id,
                duration,
                error: error.clone(),
            })
        });
    }
    result
}
