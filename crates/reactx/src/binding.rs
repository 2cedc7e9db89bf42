#![forbid(unsafe_code)]

//! Render bindings.
//!
//! [`observer`] turns a render function into an [`Observed`] component. Each
//! call to [`Observed::render`] runs the function inside a fresh tracked
//! region, then subscribes to whatever it read. When one of those values is
//! written, the host's invalidation hook fires so it can schedule a
//! re-render; [`Observed::snapshot`] is the comparison value for hosts that
//! pull state with a "subscribe + get snapshot" pattern.
//!
//! # Invariants
//!
//! 1. Only the dependencies of the latest render are subscribed. A new
//!    render replaces the previous subscription.
//! 2. The invalidation hook runs at most once per notification and only
//!    while the binding is mounted.
//!
//! # Failure Modes
//!
//! - **Hook renders synchronously**: allowed, but the new render happens
//!   while the write that triggered it is still notifying other observers.
//!   Hosts should schedule rather than render inline.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use reactx_core::{Observer, Runtime, Subscription};
use tracing::{debug, trace};

type Hook = Rc<dyn Fn()>;

struct BindingState {
    name: RefCell<String>,
    current: RefCell<Option<Observer>>,
    subscription: RefCell<Option<Subscription>>,
    rendered_snapshot: Cell<u64>,
    renders: Cell<u64>,
    invalidations: Cell<u64>,
    hook: RefCell<Option<Hook>>,
}

/// A render function bound to the reactive runtime.
pub struct Observed<A, R> {
    runtime: Runtime,
    render: Box<dyn Fn(A) -> R>,
    state: Rc<BindingState>,
}

/// Wrap `render` so every invocation tracks what it reads.
pub fn observer<A, R>(runtime: &Runtime, render: impl Fn(A) -> R + 'static) -> Observed<A, R> {
    Observed {
        runtime: runtime.clone(),
        render: Box::new(render),
        state: Rc::new(BindingState {
            name: RefCell::new("observer".to_string()),
            current: RefCell::new(None),
            subscription: RefCell::new(None),
            rendered_snapshot: Cell::new(0),
            renders: Cell::new(0),
            invalidations: Cell::new(0),
            hook: RefCell::new(None),
        }),
    }
}

impl<A, R> Observed<A, R> {
    /// Name used in log fields.
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        *self.state.name.borrow_mut() = name.into();
        self
    }

    /// Host hook invoked when a value read by the last render changes.
    #[must_use]
    pub fn with_invalidate(self, hook: impl Fn() + 'static) -> Self {
        self.on_invalidate(hook);
        self
    }

    /// Replace the invalidation hook.
    pub fn on_invalidate(&self, hook: impl Fn() + 'static) {
        *self.state.hook.borrow_mut() = Some(Rc::new(hook));
    }

    /// Run the render function with dependency tracking and subscribe to
    /// what it read.
    pub fn render(&self, args: A) -> R {
        let observer = self.runtime.observer();
        let guard = observer.track();
        let output = (self.render)(args);
        guard.untrack();

        let rendered = observer.get_snapshot();
        self.state.rendered_snapshot.set(rendered);
        self.state.renders.set(self.state.renders.get() + 1);

        self.state.current.replace(Some(observer.clone()));
        let weak = Rc::downgrade(&self.state);
        let subscription = observer.subscribe(move || {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let snapshot = state.current.borrow().as_ref().map_or(0, Observer::get_snapshot);
            if snapshot <= state.rendered_snapshot.get() {
                return;
            }
            state.invalidations.set(state.invalidations.get() + 1);
            trace!(binding = %state.name.borrow(), snapshot, "binding invalidated");
            let hook = state.hook.borrow().clone();
            if let Some(hook) = hook {
                hook();
            }
        });

        // Replacing the subscription drops the previous one, which
        // unregisters the previous render's dependencies.
        self.state.subscription.replace(Some(subscription));
        debug!(
            binding = %self.state.name.borrow(),
            render = self.state.renders.get(),
            targets = observer.observed_target_count(),
            "binding rendered"
        );
        output
    }

    /// Revision marker for "subscribe + get snapshot" hosts.
    #[must_use]
    pub fn snapshot(&self) -> u64 {
        self.state
            .current
            .borrow()
            .as_ref()
            .map_or(0, Observer::get_snapshot)
    }

    /// A value read by the last render has changed since it ran.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.snapshot() > self.state.rendered_snapshot.get()
    }

    /// Rendered at least once and still subscribed.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.state
            .subscription
            .borrow()
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.state.renders.get()
    }

    #[must_use]
    pub fn invalidation_count(&self) -> u64 {
        self.state.invalidations.get()
    }

    /// Observer of the last render.
    #[must_use]
    pub fn current_observer(&self) -> Option<Observer> {
        self.state.current.borrow().clone()
    }

    /// Drop the subscription. Idempotent; a later `render` mounts again.
    pub fn unmount(&self) {
        if let Some(subscription) = self.state.subscription.borrow_mut().take() {
            subscription.unsubscribe();
            debug!(binding = %self.state.name.borrow(), "binding unmounted");
        }
    }
}

impl<A, R> Drop for Observed<A, R> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<A, R> fmt::Debug for Observed<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("name", &*self.state.name.borrow())
            .field("renders", &self.state.renders.get())
            .field("invalidations", &self.state.invalidations.get())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
