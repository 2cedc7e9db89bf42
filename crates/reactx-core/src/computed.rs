#![forbid(unsafe_code)]

//! Memoized class getters.
//!
//! # Design
//!
//! A [`ComputedGetter`] owns a private [`Observer`] subscribed for the
//! lifetime of the getter. Evaluation runs the getter body inside that
//! observer's tracked region, so every value the body reads becomes a
//! dependency; a later write to any of them marks the cached value dirty.
//! The next read recomputes.
//!
//! # Invariants
//!
//! 1. A read never returns a value computed before the latest write to one of
//!    its dependencies.
//! 2. The body runs at most once per dependency change cycle.
//! 3. `version` increments by exactly 1 per recomputation.
//! 4. The observer that reads a getter inherits the getter's dependencies, so
//!    it is notified by the same writes that invalidate the cache.
//!
//! # Failure Modes
//!
//! - **Body returns `Err`**: the error propagates to the reader, the previous
//!   cached value is kept and the dirty flag stays set so the next read
//!   retries.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::class::Getter;
use crate::error::Result;
use crate::observer::{Observer, Subscription};
use crate::proxy::Reactive;
use crate::runtime::Runtime;
use crate::value::Value;

/// Result of [`ComputedGetter::evaluate`].
pub(crate) struct Evaluation {
    /// Cached raw value.
    pub(crate) value: Value,
    /// Set when the body actually ran.
    pub(crate) recomputed: bool,
    pub(crate) version: u64,
}

/// Cached state of one getter on one proxy.
pub(crate) struct ComputedGetter {
    observer: Observer,
    dirty: Rc<Cell<bool>>,
    cached: RefCell<Option<Value>>,
    version: Cell<u64>,
    _subscription: Subscription,
}

impl ComputedGetter {
    pub(crate) fn new(runtime: &Runtime) -> Self {
        let observer = runtime.observer();
        // Dirty initially; computed on first read.
        let dirty = Rc::new(Cell::new(true));
        let flag = Rc::clone(&dirty);
        let subscription = observer.subscribe(move || flag.set(true));
        Self {
            observer,
            dirty,
            cached: RefCell::new(None),
            version: Cell::new(0),
            _subscription: subscription,
        }
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Return the cached value, recomputing it first if it is stale.
    ///
    /// The cached value is stored raw so a getter returning `this` does not
    /// keep its own proxy alive.
    pub(crate) fn evaluate(&self, runtime: &Runtime, this: &Reactive, body: &Getter) -> Result<Evaluation> {
        let cached = self.cached.borrow().clone();
        let (value, recomputed) = match cached {
            Some(value) if !self.dirty.get() => (value, false),
            _ => {
                self.observer.clear_observations();
                let guard = self.observer.track();
                let result = body(this);
                guard.untrack();
                let value = result?.into_raw();
                *self.cached.borrow_mut() = Some(value.clone());
                self.dirty.set(false);
                self.version.set(self.version.get() + 1);
                (value, true)
            }
        };
        if let Some(reader) = runtime.current_observer() {
            reader.absorb(&self.observer);
        }
        Ok(Evaluation {
            value,
            recomputed,
            version: self.version.get(),
        })
    }
}

impl fmt::Debug for ComputedGetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedGetter")
            .field("cached", &self.cached.borrow())
            .field("dirty", &self.dirty.get())
            .field("version", &self.version.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
