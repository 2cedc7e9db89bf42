#![forbid(unsafe_code)]

//! Reference-counted lazy subscriptions.
//!
//! A [`SharedSubscription`] starts an underlying subscription when the first
//! handle is acquired and disposes of it when the last handle is released.
//! Releasing a handle more than once is a no-op.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::logging::debug;

type Disposer = Box<dyn FnOnce()>;
type Start = Box<dyn Fn() -> Disposer>;

struct SharedInner {
    start: Start,
    holders: Cell<usize>,
    disposer: RefCell<Option<Disposer>>,
}

impl SharedInner {
    fn release(&self) {
        let remaining = self.holders.get().saturating_sub(1);
        self.holders.set(remaining);
        if remaining == 0 {
            let disposer = self.disposer.borrow_mut().take();
            if let Some(dispose) = disposer {
                debug!("shared subscription stopped");
                dispose();
            }
        }
    }
}

/// Starts `start` on first acquisition and runs its disposer on last
/// release.
#[derive(Clone)]
pub struct SharedSubscription {
    inner: Rc<SharedInner>,
}

impl SharedSubscription {
    pub fn new<D>(start: impl Fn() -> D + 'static) -> Self
    where
        D: FnOnce() + 'static,
    {
        Self {
            inner: Rc::new(SharedInner {
                start: Box::new(move || Box::new(start()) as Disposer),
                holders: Cell::new(0),
                disposer: RefCell::new(None),
            }),
        }
    }

    /// Take a handle, starting the subscription if nobody held one.
    #[must_use = "dropping the handle releases it immediately"]
    pub fn acquire(&self) -> SharedHandle {
        let holders = self.inner.holders.get() + 1;
        self.inner.holders.set(holders);
        if holders == 1 {
            debug!("shared subscription started");
            let disposer = (self.inner.start)();
            *self.inner.disposer.borrow_mut() = Some(disposer);
        }
        SharedHandle {
            inner: Rc::clone(&self.inner),
            released: Cell::new(false),
        }
    }

    /// Number of unreleased handles.
    #[must_use]
    pub fn holders(&self) -> usize {
        self.inner.holders.get()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.disposer.borrow().is_some()
    }
}

impl fmt::Debug for SharedSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSubscription")
            .field("holders", &self.holders())
            .field("active", &self.is_active())
            .finish()
    }
}

/// One holder of a [`SharedSubscription`]. Released on drop.
pub struct SharedHandle {
    inner: Rc<SharedInner>,
    released: Cell<bool>,
}

impl SharedHandle {
    /// Give up this handle. Idempotent.
    pub fn release(&self) {
        if !self.released.replace(true) {
            self.inner.release();
        }
    }
}

impl Drop for SharedHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for SharedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle")
            .field("released", &self.released.get())
            .finish()
    }
}
