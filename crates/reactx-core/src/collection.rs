#![forbid(unsafe_code)]

//! Id-keyed collections with a readonly list view.
//!
//! [`data`] builds a [`Collection`]: items are looked up by their string `id`
//! and mirrored, in insertion order, into a reactive array. Hosts render the
//! array through [`Collection::list`] and address single items through
//! [`Collection::get`].
//!
//! # Invariants
//!
//! 1. The list holds exactly the items of the id map, each once, in the order
//!    their ids were first inserted.
//! 2. Replacing an item keeps its list position and notifies observers of
//!    that index only (plus whole-list observers).
//! 3. All writes go through reactive proxies, so the usual tracking,
//!    notification and readonly invalidation apply.

use crate::error::{ReactiveError, Result};
use crate::logging::debug;
use crate::proxy::Reactive;
use crate::runtime::Runtime;
use crate::value::{Target, Value};

/// Items keyed by id plus an ordered list of the same items.
#[derive(Debug, Clone)]
pub struct Collection {
    by_id: Reactive,
    list: Reactive,
}

/// Create a collection seeded with `initial`.
///
/// Fails with [`ReactiveError::MissingId`] if an item is not an object with a
/// string `id`. Later items replace earlier ones with the same id.
pub fn data<V: Into<Value>>(runtime: &Runtime, initial: impl IntoIterator<Item = V>) -> Result<Collection> {
    let collection = Collection {
        by_id: runtime.proxy(&Target::new_object(), false),
        list: runtime.proxy(&Target::new_array(), false),
    };
    for item in initial {
        collection.insert(item)?;
    }
    Ok(collection)
}

impl Collection {
    /// Insert `item`, or replace the item with the same id in place.
    pub fn insert(&self, item: impl Into<Value>) -> Result<()> {
        let item = item.into().into_raw();
        let (id, target) = item_id(&item)?;
        let previous = self.by_id.target().get(id.as_str()).as_target();
        match previous.and_then(|old| self.position(&old)) {
            Some(index) => {
                self.list.set(index, &target)?;
            }
            None => {
                self.list.push([&target])?;
            }
        }
        self.by_id.set(id.as_str(), &target)?;
        debug!(id = %id, len = self.list.target().len(), "collection item stored");
        Ok(())
    }

    /// Remove the item with `id`. Returns whether it was present.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let Some(old) = self.by_id.target().get(id).as_target() else {
            return Ok(false);
        };
        if let Some(index) = self.position(&old) {
            self.list.splice(index, 1, std::iter::empty::<Value>())?;
        }
        self.by_id.delete(id)?;
        debug!(id, "collection item removed");
        Ok(true)
    }

    /// Tracked read of the item with `id` (wrapped), or `undefined`.
    pub fn get(&self, id: &str) -> Result<Value> {
        self.by_id.get(id)
    }

    /// Tracked membership test.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.has(id)
    }

    /// Tracked as a read of the list's `length`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids in insertion order. Depends on the id map as a whole.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.by_id.keys().iter().map(ToString::to_string).collect()
    }

    /// Readonly view of the ordered items. A fresh proxy after each change,
    /// so identity comparisons detect updates.
    #[must_use]
    pub fn list(&self) -> Reactive {
        self.list.readonly_view()
    }

    /// Readonly view of the id map.
    #[must_use]
    pub fn by_id(&self) -> Reactive {
        self.by_id.readonly_view()
    }

    fn position(&self, item: &Target) -> Option<usize> {
        let list = self.list.target();
        (0..list.len()).find(|index| list.get(*index).as_target().is_some_and(|t| t.ptr_eq(item)))
    }
}

fn item_id(item: &Value) -> Result<(String, Target)> {
    let target = item.as_target().ok_or(ReactiveError::MissingId)?;
    let id = target.get("id");
    let id = id.as_str().ok_or(ReactiveError::MissingId)?.to_string();
    Ok((id, target))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn todo(id: &str, title: &str) -> Target {
        Target::object_from([("id", id), ("title", title)])
    }

    fn titles(collection: &Collection) -> Vec<String> {
        collection
            .list()
            .values()
            .iter()
            .map(|item| {
                let item = item.as_reactive().unwrap();
                item.get("title").unwrap().as_str().unwrap().to_string()
            })
            .collect()
    }

    #[test]
    fn seeds_map_and_list_in_order() {
        let rt = Runtime::new();
        let todos = data(&rt, [todo("a", "write"), todo("b", "test")]).unwrap();
        assert_eq!(todos.len(), 2);
        assert_eq!(todos.ids(), ["a", "b"]);
        assert_eq!(titles(&todos), ["write", "test"]);
        assert!(todos.contains("b"));
        let b = todos.get("b").unwrap();
        assert_eq!(b.as_reactive().unwrap().get("title").unwrap(), Value::from("test"));
    }

    #[test]
    fn replacing_keeps_position_and_never_duplicates() {
        let rt = Runtime::new();
        let todos = data(&rt, [todo("a", "write"), todo("b", "test")]).unwrap();
        todos.insert(todo("a", "rewrite")).unwrap();
        assert_eq!(todos.len(), 2);
        assert_eq!(titles(&todos), ["rewrite", "test"]);
    }

    #[test]
    fn remove_takes_exactly_one_item() {
        let rt = Runtime::new();
        let todos = data(&rt, [todo("a", "1"), todo("b", "2"), todo("c", "3")]).unwrap();
        assert!(todos.remove("b").unwrap());
        assert!(!todos.remove("b").unwrap());
        assert_eq!(titles(&todos), ["1", "3"]);
        assert_eq!(todos.ids(), ["a", "c"]);
        assert!(todos.get("b").unwrap().is_undefined());
    }

    #[test]
    fn list_view_is_readonly_and_refreshed_by_changes() {
        let rt = Runtime::new();
        let todos = data(&rt, [todo("a", "1")]).unwrap();
        let before = todos.list();
        assert_eq!(todos.list(), before);
        assert!(before.push([todo("x", "no")]).unwrap_err().is_readonly_mutation());

        todos.insert(todo("b", "2")).unwrap();
        assert_ne!(todos.list(), before);
        assert!(todos.by_id().is_readonly());
    }

    #[test]
    fn list_observers_are_notified_once_per_change() {
        let rt = Runtime::new();
        let todos = data(&rt, [todo("a", "1")]).unwrap();
        let obs = rt.observer();
        let guard = obs.track();
        let _ = todos.list().len();
        guard.untrack();
        let hits = Rc::new(Cell::new(0));
        let handle = Rc::clone(&hits);
        let _sub = obs.subscribe(move || handle.set(handle.get() + 1));

        todos.insert(todo("b", "2")).unwrap();
        assert_eq!(hits.get(), 1);
        todos.remove("a").unwrap();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn items_need_a_string_id() {
        let rt = Runtime::new();
        let err = data(&rt, [Target::object_from([("id", 1)])]).unwrap_err();
        assert_eq!(err, ReactiveError::MissingId);
        let todos = data(&rt, Vec::<Value>::new()).unwrap();
        assert!(todos.is_empty());
        assert_eq!(todos.insert(5).unwrap_err(), ReactiveError::MissingId);
    }
}
