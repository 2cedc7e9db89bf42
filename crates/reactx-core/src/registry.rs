#![forbid(unsafe_code)]

//! Dependency registry: which subscribed observers depend on which
//! `(target, key)` pairs.
//!
//! Each target has one bucket per observed key plus a *structural* bucket for
//! observers that depend on the target as a whole (enumeration, iteration,
//! deep snapshots).
//!
//! # Invariants
//!
//! 1. An observer is present for a target iff it is subscribed and has
//!    recorded an observation of that target.
//! 2. Only weak references are held, to targets and to observers alike. Dead
//!    entries are dropped when encountered and by [`DependencyRegistry::prune`].
//! 3. Empty buckets and empty target entries are removed eagerly.

use std::rc::{Rc, Weak};

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::observer::{Observer, ObserverId, ObserverInner};
use crate::value::{Key, Target, TargetId, WeakTarget};

type ObserverSet = IndexMap<ObserverId, Weak<ObserverInner>>;

struct TargetDeps {
    target: WeakTarget,
    structural: ObserverSet,
    by_key: AHashMap<Key, ObserverSet>,
}

impl TargetDeps {
    fn is_empty(&self) -> bool {
        self.structural.is_empty() && self.by_key.is_empty()
    }

    fn remove_observer(&mut self, observer: ObserverId) {
        self.structural.shift_remove(&observer);
        self.by_key.retain(|_, set| {
            set.shift_remove(&observer);
            !set.is_empty()
        });
    }

    fn contains(&self, observer: ObserverId) -> bool {
        self.structural.contains_key(&observer)
            || self.by_key.values().any(|set| set.contains_key(&observer))
    }
}

/// Registry owned by a [`Runtime`](crate::Runtime).
#[derive(Default)]
pub(crate) struct DependencyRegistry {
    targets: AHashMap<TargetId, TargetDeps>,
}

impl DependencyRegistry {
    /// Register `observer` for `key` of `target`, or for the whole target
    /// when `key` is `None`. Re-registering is a no-op.
    pub(crate) fn register(
        &mut self,
        target: &WeakTarget,
        key: Option<&Key>,
        observer: &Rc<ObserverInner>,
    ) {
        let id = target.id();
        let deps = self.targets.entry(id).or_insert_with(|| TargetDeps {
            target: target.clone(),
            structural: IndexMap::new(),
            by_key: AHashMap::new(),
        });
        let set = match key {
            Some(key) => deps.by_key.entry(key.clone()).or_default(),
            None => &mut deps.structural,
        };
        set.entry(observer.id())
            .or_insert_with(|| Rc::downgrade(observer));
    }

    /// Remove `observer` from every bucket of `target`.
    pub(crate) fn unregister(&mut self, target: TargetId, observer: ObserverId) {
        if let Some(deps) = self.targets.get_mut(&target) {
            deps.remove_observer(observer);
            if deps.is_empty() {
                self.targets.remove(&target);
            }
        }
    }

    /// Observers to notify for a write of `keys` on `target`, each exactly
    /// once, in registration order.
    ///
    /// Observers found in the structural bucket are paired with `None`;
    /// key-bucket observers are paired with the key that matched.
    pub(crate) fn dependents(&mut self, target: &Target, keys: &[Key]) -> Vec<(Observer, Option<Key>)> {
        let id = target.id();
        let Some(deps) = self.targets.get_mut(&id) else {
            return Vec::new();
        };
        if !deps.target.is_alive() {
            self.targets.remove(&id);
            return Vec::new();
        }

        let mut found: IndexMap<ObserverId, (Rc<ObserverInner>, Option<Key>)> = IndexMap::new();
        for key in keys {
            if let Some(set) = deps.by_key.get_mut(key) {
                collect_live(set, &mut found, Some(key));
                if set.is_empty() {
                    deps.by_key.remove(key);
                }
            }
        }
        collect_live(&mut deps.structural, &mut found, None);
        if deps.is_empty() {
            self.targets.remove(&id);
        }

        found
            .into_values()
            .map(|(inner, key)| (Observer::from_inner(inner), key))
            .collect()
    }

    /// Number of distinct observers registered for `target`.
    pub(crate) fn observer_count(&self, target: TargetId) -> usize {
        let Some(deps) = self.targets.get(&target) else {
            return 0;
        };
        let mut ids: Vec<ObserverId> = deps.structural.keys().copied().collect();
        for set in deps.by_key.values() {
            ids.extend(set.keys().copied());
        }
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    pub(crate) fn is_registered(&self, target: TargetId, observer: ObserverId) -> bool {
        self.targets
            .get(&target)
            .is_some_and(|deps| deps.contains(observer))
    }

    /// Number of targets with at least one registered observer.
    pub(crate) fn len(&self) -> usize {
        self.targets.len()
    }

    /// Drop entries whose target or observers are gone.
    pub(crate) fn prune(&mut self) {
        self.targets.retain(|_, deps| {
            if !deps.target.is_alive() {
                return false;
            }
            deps.structural.retain(|_, weak| weak.strong_count() > 0);
            deps.by_key.retain(|_, set| {
                set.retain(|_, weak| weak.strong_count() > 0);
                !set.is_empty()
            });
            !deps.is_empty()
        });
    }
}

fn collect_live(
    set: &mut ObserverSet,
    found: &mut IndexMap<ObserverId, (Rc<ObserverInner>, Option<Key>)>,
    key: Option<&Key>,
) {
    set.retain(|id, weak| match weak.upgrade() {
        Some(inner) => {
            match found.get_mut(id) {
                // Whole-target dependency subsumes the keyed one.
                Some(entry) if key.is_none() => entry.1 = None,
                Some(_) => {}
                None => {
                    found.insert(*id, (inner, key.cloned()));
                }
            }
            true
        }
        None => false,
    });
}
