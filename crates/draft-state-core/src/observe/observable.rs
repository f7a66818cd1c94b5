#![forbid(unsafe_code)]

//! Shared, version-tracked values with change notification.
//!
//! # Usage
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use draft_state_core::observe::Observable;
//!
//! let count = Observable::new(0);
//! let seen = Rc::new(Cell::new(0));
//! let seen_in_cb = Rc::clone(&seen);
//! let sub = count.subscribe(move |v| seen_in_cb.set(*v));
//!
//! count.set(3);
//! assert_eq!(seen.get(), 3);
//!
//! drop(sub);
//! count.set(4);
//! assert_eq!(seen.get(), 3);
//! ```
//!
//! # Failure Modes
//!
//! - Callback panic: propagates to the caller of `set`; the value is already
//!   updated.
//! - Callback calling `set` on the same observable: allowed, the nested set
//!   notifies before the outer notification loop continues.
//! - Callback borrowing state that is mutably borrowed at `set` time: wrap the
//!   mutation in a [`BatchScope`](super::BatchScope) so delivery happens
//!   after the borrow ends.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::batch;

type Callback<T> = dyn Fn(&T);

struct Inner<T> {
    value: T,
    version: u64,
    subscribers: Vec<Weak<Callback<T>>>,
}

/// A shared value that notifies subscribers when it changes.
///
/// Clones share the same value.
pub struct Observable<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create an observable holding `value` at version 0.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        f(&self.inner.borrow().value)
    }

    /// Number of changes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Replace the value. Equal values are ignored.
    ///
    /// Inside a [`BatchScope`](super::BatchScope) the value changes
    /// immediately and delivery is queued until the outermost scope exits.
    pub fn set(&self, value: T) {
        let snapshot = {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
            inner.value.clone()
        };
        let source = self.clone();
        batch::defer_or_run(move || source.deliver(&snapshot));
    }

    /// Modify the value in place, notifying only if it changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    /// Register `callback`, called with the new value after every change.
    ///
    /// The callback stays registered while the returned [`Subscription`] lives.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let callback: Rc<Callback<T>> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&callback));
        Subscription {
            _callback: Box::new(callback),
        }
    }

    /// Live subscriber count.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn deliver(&self, value: &T) {
        // Callbacks run with no borrow held so they may read or set this observable.
        let live: Vec<Rc<Callback<T>>> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|weak| weak.strong_count() > 0);
            inner.subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in live {
            callback(value);
        }
    }
}

/// RAII guard for an [`Observable::subscribe`] callback.
pub struct Subscription {
    _callback: Box<dyn Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
