#![forbid(unsafe_code)]

//! The reactivity runtime: explicit owner of all shared reactive state.
//!
//! A [`Runtime`] bundles what would otherwise be process-wide globals:
//!
//! - the current-observer stack,
//! - the global snapshot counter,
//! - the dependency registry,
//! - the mutable and readonly proxy caches,
//! - the optional event sink and the stack of running actions.
//!
//! Create one per application (or one per test) and hand it to everything
//! that wraps values or creates observers.
//!
//! # Concurrency
//!
//! Single-threaded and synchronous. `Runtime` is `!Send`; every structure is
//! updated inside one trap invocation, so no reader can see a half-updated
//! registry. Tracked reads must complete between `track()` and the release
//! of its guard.

use std::cell::{Cell, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::events::{InitData, ReactiveEvent, ReactiveObserver};
use crate::logging::trace;
use crate::observer::Observer;
use crate::proxy::ProxyCache;
use crate::registry::DependencyRegistry;
use crate::value::{Key, Target, TargetId};

/// A running class-method invocation.
#[derive(Debug, Clone)]
pub(crate) struct ExecutionFrame {
    pub(crate) action_id: u64,
    pub(crate) execution_id: u64,
}

struct RuntimeInner {
    config: RuntimeConfig,
    stack: RefCell<Vec<Observer>>,
    global_snapshot: Cell<u64>,
    next_id: Cell<u64>,
    registry: RefCell<DependencyRegistry>,
    mutable_cache: RefCell<ProxyCache>,
    readonly_cache: RefCell<ProxyCache>,
    sink: RefCell<Option<Rc<dyn ReactiveObserver>>>,
    executions: RefCell<Vec<ExecutionFrame>>,
}

/// Shared reactive context. Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Point-in-time sizes of the runtime's internal tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Targets with at least one subscribed dependent.
    pub registry_targets: usize,
    /// Live entries in the mutable proxy cache.
    pub mutable_proxies: usize,
    /// Live entries in the readonly proxy cache.
    pub readonly_proxies: usize,
    /// Depth of the current-observer stack.
    pub tracking_depth: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                stack: RefCell::new(Vec::new()),
                global_snapshot: Cell::new(0),
                next_id: Cell::new(1),
                registry: RefCell::new(DependencyRegistry::default()),
                mutable_cache: RefCell::new(ProxyCache::default()),
                readonly_cache: RefCell::new(ProxyCache::default()),
                sink: RefCell::new(None),
                executions: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Create a new, untracked, unsubscribed observer.
    #[must_use]
    pub fn observer(&self) -> Observer {
        Observer::new(self)
    }

    /// The innermost tracked observer, if any.
    #[must_use]
    pub fn current_observer(&self) -> Option<Observer> {
        self.inner.stack.borrow().last().cloned()
    }

    /// Current value of the global snapshot counter.
    #[must_use]
    pub fn global_snapshot(&self) -> u64 {
        self.inner.global_snapshot.get()
    }

    /// Install an event sink. It immediately receives an `init` event.
    pub fn set_event_sink(&self, sink: Rc<dyn ReactiveObserver>) {
        *self.inner.sink.borrow_mut() = Some(Rc::clone(&sink));
        sink.on_event(&ReactiveEvent::Init(InitData {
            label: self.inner.config.label.clone(),
            delimiter: self.inner.config.path_delimiter.clone(),
        }));
    }

    pub fn clear_event_sink(&self) {
        self.inner.sink.borrow_mut().take();
    }

    #[must_use]
    pub fn has_event_sink(&self) -> bool {
        self.inner.sink.borrow().is_some()
    }

    /// Number of distinct subscribed observers depending on `target`.
    #[must_use]
    pub fn registered_observer_count(&self, target: &Target) -> usize {
        self.inner.registry.borrow().observer_count(target.id())
    }

    /// Whether `observer` is registered as a dependent of `target`.
    #[must_use]
    pub fn is_registered(&self, target: &Target, observer: &Observer) -> bool {
        self.inner
            .registry
            .borrow()
            .is_registered(target.id(), observer.id())
    }

    /// Drop registry and cache entries whose targets, observers or proxies
    /// no longer exist.
    pub fn prune(&self) {
        self.inner.registry.borrow_mut().prune();
        self.inner.mutable_cache.borrow_mut().prune();
        self.inner.readonly_cache.borrow_mut().prune();
    }

    #[must_use]
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            registry_targets: self.inner.registry.borrow().len(),
            mutable_proxies: self.inner.mutable_cache.borrow().live_len(),
            readonly_proxies: self.inner.readonly_cache.borrow().live_len(),
            tracking_depth: self.inner.stack.borrow().len(),
        }
    }

    // ── crate-internal plumbing ─────────────────────────────────────────────

    pub(crate) fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    pub(crate) fn bump_snapshot(&self) -> u64 {
        let next = self.inner.global_snapshot.get() + 1;
        self.inner.global_snapshot.set(next);
        next
    }

    pub(crate) fn push_observer(&self, observer: Observer) {
        self.inner.stack.borrow_mut().push(observer);
    }

    pub(crate) fn pop_observer(&self) {
        self.inner.stack.borrow_mut().pop();
    }

    pub(crate) fn registry_mut(&self) -> RefMut<'_, DependencyRegistry> {
        self.inner.registry.borrow_mut()
    }

    pub(crate) fn cache(&self, readonly: bool) -> &RefCell<ProxyCache> {
        if readonly {
            &self.inner.readonly_cache
        } else {
            &self.inner.mutable_cache
        }
    }

    /// Attribute a read to the current observer.
    pub(crate) fn observe_read(&self, target: &Target, key: Option<&Key>, readonly: bool) {
        if readonly && !self.inner.config.track_readonly_reads {
            return;
        }
        if let Some(observer) = self.current_observer() {
            observer.observe(target, key);
        }
    }

    /// Notify every observer depending on `keys` of `target` or on `target`
    /// as a whole. Each observer is notified at most once.
    pub(crate) fn notify_dependents(&self, target: &Target, keys: &[Key]) {
        let dependents = self.inner.registry.borrow_mut().dependents(target, keys);
        trace!(
            target_id = ?target.id(),
            keys = keys.len(),
            observers = dependents.len(),
            "notify dependents"
        );
        for (observer, key) in dependents {
            observer.notify(target, key.as_ref());
        }
    }

    /// Evict readonly proxies so the next readonly read builds fresh ones.
    pub(crate) fn evict_readonly(&self, targets: &[TargetId]) {
        let mut cache = self.inner.readonly_cache.borrow_mut();
        for id in targets {
            cache.remove(*id);
        }
        trace!(chain = targets.len(), "readonly cache invalidated");
    }

    pub(crate) fn emits_tracked_events(&self) -> bool {
        self.inner.config.emit_tracked_events && self.has_event_sink()
    }

    /// Deliver an event to the sink. The event is only built when a sink is
    /// installed.
    pub(crate) fn emit(&self, build: impl FnOnce() -> ReactiveEvent) {
        let sink = self.inner.sink.borrow().clone();
        if let Some(sink) = sink {
            sink.on_event(&build());
        }
    }

    pub(crate) fn current_execution(&self) -> Option<ExecutionFrame> {
        self.inner.executions.borrow().last().cloned()
    }

    pub(crate) fn push_execution(&self, frame: ExecutionFrame) {
        self.inner.executions.borrow_mut().push(frame);
    }

    pub(crate) fn pop_execution(&self) {
        self.inner.executions.borrow_mut().pop();
    }

    pub(crate) fn path_string(&self, path: &[String]) -> String {
        path.join(&self.inner.config.path_delimiter)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("label", &self.inner.config.label)
            .field("global_snapshot", &self.global_snapshot())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingObserver;

    #[test]
    fn fresh_runtime_is_empty() {
        let rt = Runtime::new();
        assert_eq!(rt.global_snapshot(), 0);
        assert_eq!(rt.current_observer(), None);
        assert_eq!(
            rt.stats(),
            RuntimeStats {
                registry_targets: 0,
                mutable_proxies: 0,
                readonly_proxies: 0,
                tracking_depth: 0,
            }
        );
    }

    #[test]
    fn runtimes_are_isolated() {
        let a = Runtime::new();
        let b = Runtime::new();
        let obs = a.observer();
        let _guard = obs.track();
        assert!(a.current_observer().is_some());
        assert!(b.current_observer().is_none());
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn installing_a_sink_emits_init() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_label("app"));
        let recorder = Rc::new(RecordingObserver::default());
        rt.set_event_sink(recorder.clone());
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "init");
        assert!(rt.has_event_sink());
        rt.clear_event_sink();
        assert!(!rt.has_event_sink());
    }

    #[test]
    fn readonly_reads_can_be_left_untracked() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_readonly_tracking(false));
        let obs = rt.observer();
        let target = Target::new_object();
        let guard = obs.track();
        rt.observe_read(&target, Some(&Key::from("a")), true);
        rt.observe_read(&target, Some(&Key::from("b")), false);
        guard.untrack();
        assert!(!obs.observes(&target, Some(&Key::from("a"))));
        assert!(obs.observes(&target, Some(&Key::from("b"))));
    }

    #[test]
    fn path_string_uses_configured_delimiter() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_path_delimiter("/"));
        assert_eq!(rt.path_string(&["a".into(), "0".into(), "b".into()]), "a/0/b");
    }
}
