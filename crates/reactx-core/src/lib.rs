#![forbid(unsafe_code)]

//! Core: proxy-style fine-grained dependency tracking and notification.
//!
//! - [`Runtime`]: the reactive context. Owns the observer stack, the
//!   dependency registry, the proxy caches and the optional event sink.
//! - [`Observer`]: records the `(target, key)` pairs read while it is
//!   tracking and is notified when one of them is written.
//! - [`Reactive`]: a mutable or readonly proxy over a raw [`Target`]. Reads
//!   register dependencies, writes notify exactly the dependents of the
//!   written key, and nested containers come back wrapped.
//! - [`Class`]: instance prototypes whose getters are memoized and whose
//!   methods run as actions.
//! - [`data`]: an id-keyed [`Collection`] mirrored into a readonly list.
//!
//! # Invariants
//!
//! 1. Wrapping the same raw target twice yields the same proxy, until a write
//!    below a readonly view invalidates that view's cached proxy.
//! 2. Writing a nested property changes the identity of the readonly proxies
//!    of the written container and of every ancestor between it and the
//!    access root, so identity-based change checks see the change. The access
//!    root's readonly proxy keeps its identity.
//! 3. Each subscribed dependent is notified at most once per operation.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use reactx_core::{Runtime, Target};
//!
//! let rt = Runtime::new();
//! let state = rt.proxy(&Target::object_from([("count", 0)]), false);
//!
//! let observer = rt.observer();
//! let guard = observer.track();
//! let _ = state.get("count")?;
//! guard.untrack();
//!
//! let renders = Rc::new(Cell::new(0));
//! let counter = Rc::clone(&renders);
//! let _subscription = observer.subscribe(move || counter.set(counter.get() + 1));
//!
//! state.set("count", 1)?;
//! assert_eq!(renders.get(), 1);
//! # Ok::<(), reactx_core::ReactiveError>(())
//! ```

pub mod array;
pub mod class;
pub mod collection;
mod computed;
pub mod config;
pub mod error;
pub mod events;
mod json;
mod logging;
pub mod merge;
pub mod observer;
pub mod proxy;
mod registry;
pub mod runtime;
pub mod shared;
pub mod value;

pub use array::ArrayMethod;
pub use class::{Class, ClassBuilder, Getter, Method};
pub use collection::{Collection, data};
pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result, TargetKind};
pub use events::{
    ActionEndData, ActionStartData, ComputedData, ExecutionEndData, ExecutionStartData, InitData,
    InstanceMethodData, MutatedData, Mutation, ReactiveEvent, ReactiveObserver, TrackedData,
    format_path,
};
pub use merge::Merged;
pub use observer::{Observer, ObserverId, Subscription, TrackGuard};
pub use proxy::{PropertyDescriptor, ProxyInfo, Reactive};
pub use runtime::{Runtime, RuntimeStats};
pub use shared::{SharedHandle, SharedSubscription};
pub use value::{Function, Key, Opaque, Symbol, Target, TargetId, Value};
