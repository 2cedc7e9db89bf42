#![forbid(unsafe_code)]

//! Observers: one per tracked computation.
//!
//! An [`Observer`] records the `(target, key)` pairs read while it is the
//! innermost tracked observer, and receives notifications for writes to
//! those pairs once subscribed.
//!
//! # Lifecycle
//!
//! 1. [`Observer::track`] pushes the observer on the runtime's stack and
//!    returns a [`TrackGuard`]; dropping or [`untrack`](TrackGuard::untrack)ing
//!    the guard pops it. Regions nest: reads belong to the innermost observer.
//! 2. [`Observer::subscribe`] registers the observer in the dependency
//!    registry for everything it has recorded (and, from then on, for every
//!    new observation) and returns a [`Subscription`].
//! 3. Dropping or [`unsubscribe`](Subscription::unsubscribe)-ing the
//!    subscription removes it from the registry again. Repeated calls are
//!    no-ops.
//!
//! # Hazards
//!
//! Leaking a [`TrackGuard`] (for example with `std::mem::forget`) leaves the
//! observer on the stack for the rest of the runtime's life, and every later
//! read is attributed to it. This is a caller bug and is deliberately not
//! detected. Guards must also be released in strict LIFO order; the stack
//! is not safe under any other interleaving.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::logging::debug;
use crate::runtime::Runtime;
use crate::value::{Key, Target, TargetId, WeakTarget};

/// Identity of an observer within its runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Dependencies on one target.
pub(crate) struct Observation {
    target: WeakTarget,
    keys: IndexSet<Key>,
    structural: bool,
}

type Callback = Rc<dyn Fn()>;

pub(crate) struct ObserverInner {
    id: ObserverId,
    runtime: Runtime,
    observations: RefCell<IndexMap<TargetId, Observation>>,
    snapshot: Cell<u64>,
    on_notify: RefCell<Option<Callback>>,
    subscribed: Cell<bool>,
    /// Bumped by every `subscribe`; only the latest subscription may end it.
    generation: Cell<u64>,
}

impl ObserverInner {
    pub(crate) fn id(&self) -> ObserverId {
        self.id
    }
}

/// A tracked computation's dependency record plus notify callback.
///
/// Cloning an `Observer` creates a new handle to the **same** observer.
#[derive(Clone)]
pub struct Observer {
    inner: Rc<ObserverInner>,
}

impl Observer {
    pub(crate) fn new(runtime: &Runtime) -> Self {
        Self {
            inner: Rc::new(ObserverInner {
                id: ObserverId(runtime.next_id()),
                runtime: runtime.clone(),
                observations: RefCell::new(IndexMap::new()),
                snapshot: Cell::new(runtime.global_snapshot()),
                on_notify: RefCell::new(None),
                subscribed: Cell::new(false),
                generation: Cell::new(0),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<ObserverInner>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.inner.id
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Begin a tracked region. Reads made through proxies of this runtime are
    /// attributed to this observer until the guard is released.
    #[must_use = "dropping the guard ends the tracked region immediately"]
    pub fn track(&self) -> TrackGuard {
        self.inner.runtime.push_observer(self.clone());
        TrackGuard {
            runtime: self.inner.runtime.clone(),
            released: false,
        }
    }

    /// Record a dependency on `key` of `target`, or on the whole target when
    /// `key` is `None`. Idempotent.
    pub fn observe(&self, target: &Target, key: Option<&Key>) {
        let added = {
            let mut observations = self.inner.observations.borrow_mut();
            let entry = observations
                .entry(target.id())
                .or_insert_with(|| Observation {
                    target: target.downgrade(),
                    keys: IndexSet::new(),
                    structural: false,
                });
            match key {
                Some(key) => entry.keys.insert(key.clone()),
                None => !std::mem::replace(&mut entry.structural, true),
            }
        };
        if added && self.inner.subscribed.get() {
            self.inner
                .runtime
                .registry_mut()
                .register(&target.downgrade(), key, &self.inner);
        }
    }

    /// Whether this observer depends on `key` of `target` (or on the target
    /// as a whole when `key` is `None`).
    #[must_use]
    pub fn observes(&self, target: &Target, key: Option<&Key>) -> bool {
        self.inner
            .observations
            .borrow()
            .get(&target.id())
            .is_some_and(|observation| match key {
                Some(key) => observation.keys.contains(key),
                None => observation.structural,
            })
    }

    /// Number of distinct targets this observer depends on.
    #[must_use]
    pub fn observed_target_count(&self) -> usize {
        self.inner.observations.borrow().len()
    }

    /// Store `on_notify` and register in the dependency registry.
    ///
    /// Subscribing an already subscribed observer replaces the callback
    /// without registering twice; only the newest [`Subscription`] can end it.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, on_notify: impl Fn() + 'static) -> Subscription {
        *self.inner.on_notify.borrow_mut() = Some(Rc::new(on_notify));
        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);

        if !self.inner.subscribed.replace(true) {
            let pending: Vec<(WeakTarget, Vec<Key>, bool)> = self
                .inner
                .observations
                .borrow()
                .values()
                .map(|o| (o.target.clone(), o.keys.iter().cloned().collect(), o.structural))
                .collect();
            let mut registry = self.inner.runtime.registry_mut();
            for (target, keys, structural) in &pending {
                for key in keys {
                    registry.register(target, Some(key), &self.inner);
                }
                if *structural {
                    registry.register(target, None, &self.inner);
                }
            }
            debug!(observer = self.inner.id.0, targets = pending.len(), "observer subscribed");
        }

        Subscription {
            observer: Rc::clone(&self.inner),
            generation,
            active: Cell::new(true),
        }
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner.subscribed.get()
    }

    /// Deliver a write notification.
    ///
    /// With a `key`, this is a no-op unless the observer depends on exactly
    /// that key. Otherwise the runtime's global snapshot is bumped, mirrored
    /// into this observer, and the callback (if any) is invoked.
    pub fn notify(&self, target: &Target, key: Option<&Key>) {
        if let Some(key) = key {
            if !self.observes(target, Some(key)) {
                return;
            }
        }
        let snapshot = self.inner.runtime.bump_snapshot();
        self.inner.snapshot.set(snapshot);
        let callback = self.inner.on_notify.borrow().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Revision marker: the global snapshot value at this observer's last
    /// notification. Pure read, never tracked.
    #[must_use]
    pub fn get_snapshot(&self) -> u64 {
        self.inner.snapshot.get()
    }

    /// Forget every recorded dependency (and its registry entries) while
    /// keeping the subscription and callback.
    pub fn clear_observations(&self) {
        let drained: Vec<TargetId> = self.inner.observations.borrow_mut().drain(..).map(|(id, _)| id).collect();
        if self.inner.subscribed.get() {
            let mut registry = self.inner.runtime.registry_mut();
            for id in drained {
                registry.unregister(id, self.inner.id);
            }
        }
    }

    /// Copy every dependency recorded by `other` into this observer.
    pub fn absorb(&self, other: &Observer) {
        if self.ptr_eq(other) {
            return;
        }
        let copied: Vec<(Target, Vec<Key>, bool)> = other
            .inner
            .observations
            .borrow()
            .values()
            .filter_map(|o| {
                o.target
                    .upgrade()
                    .map(|t| (t, o.keys.iter().cloned().collect(), o.structural))
            })
            .collect();
        for (target, keys, structural) in copied {
            for key in &keys {
                self.observe(&target, Some(key));
            }
            if structural {
                self.observe(&target, None);
            }
        }
    }

    fn end_subscription(&self) {
        if !self.inner.subscribed.replace(false) {
            return;
        }
        self.inner.on_notify.borrow_mut().take();
        let ids: Vec<TargetId> = self.inner.observations.borrow().keys().copied().collect();
        let mut registry = self.inner.runtime.registry_mut();
        for id in &ids {
            registry.unregister(*id, self.inner.id);
        }
        debug!(observer = self.inner.id.0, targets = ids.len(), "observer unsubscribed");
    }
}

impl PartialEq for Observer {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.inner.id.0)
            .field("targets", &self.observed_target_count())
            .field("snapshot", &self.get_snapshot())
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

/// Guard for a tracked region. Releasing it pops the runtime's observer
/// stack exactly once.
pub struct TrackGuard {
    runtime: Runtime,
    released: bool,
}

impl TrackGuard {
    /// End the tracked region.
    pub fn untrack(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !std::mem::replace(&mut self.released, true) {
            self.runtime.pop_observer();
        }
    }
}

impl Drop for TrackGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for TrackGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackGuard")
            .field("released", &self.released)
            .finish()
    }
}

/// Handle returned by [`Observer::subscribe`].
///
/// Keeps the observer alive and registered until it is dropped or
/// [`unsubscribe`](Self::unsubscribe)d.
pub struct Subscription {
    observer: Rc<ObserverInner>,
    generation: u64,
    active: Cell<bool>,
}

impl Subscription {
    /// Remove the observer from the registry. Idempotent.
    ///
    /// A subscription superseded by a later `subscribe` call on the same
    /// observer only deactivates itself.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        if self.observer.generation.get() == self.generation {
            Observer::from_inner(Rc::clone(&self.observer)).end_subscription();
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// The subscribed observer.
    #[must_use]
    pub fn observer(&self) -> Observer {
        Observer::from_inner(Rc::clone(&self.observer))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("observer", &self.observer.id.0)
            .field("active", &self.active.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
