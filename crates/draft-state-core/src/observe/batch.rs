#![forbid(unsafe_code)]

//! Deferred notification scopes.
//!
//! While a [`BatchScope`] is alive on the current thread, every
//! [`Observable::set`](super::Observable::set) updates its value immediately
//! but queues delivery to subscribers. When the outermost scope drops, queued
//! deliveries run in the order the changes happened, each with the value that
//! change set.
//!
//! A merge assigns many properties while holding the record's `borrow_mut`.
//! Running it inside a scope lets subscribers read the record once the borrow
//! is gone.
//!
//! # Invariants
//!
//! 1. Nested scopes flush only when the outermost one exits.
//! 2. Every change is delivered exactly once, with its own value.
//! 3. Changes made by callbacks during the flush are delivered immediately.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::mem;
use std::rc::Rc;

type Pending = Box<dyn FnOnce()>;

#[derive(Default)]
struct BatchState {
    depth: usize,
    pending: Vec<Pending>,
}

thread_local! {
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState::default());
}

/// RAII guard deferring observable notifications until it drops.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use draft_state_core::observe::{BatchScope, Observable};
///
/// let count = Observable::new(0);
/// let seen = Rc::new(Cell::new(0));
/// let seen_cb = Rc::clone(&seen);
/// let _sub = count.subscribe(move |v| seen_cb.set(*v));
///
/// let scope = BatchScope::new();
/// count.set(1);
/// assert_eq!(count.get(), 1);
/// assert_eq!(seen.get(), 0);
///
/// drop(scope);
/// assert_eq!(seen.get(), 1);
/// ```
pub struct BatchScope {
    _not_send: PhantomData<Rc<()>>,
}

impl BatchScope {
    /// Open a scope on the current thread.
    #[must_use = "notifications flush as soon as the scope is dropped"]
    pub fn new() -> Self {
        BATCH.with(|batch| batch.borrow_mut().depth += 1);
        Self {
            _not_send: PhantomData,
        }
    }

    /// Whether a scope is open on the current thread.
    #[must_use]
    pub fn is_active() -> bool {
        BATCH.with(|batch| batch.borrow().depth > 0)
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        let pending = BATCH.with(|batch| {
            let mut batch = batch.borrow_mut();
            batch.depth -= 1;
            if batch.depth == 0 {
                mem::take(&mut batch.pending)
            } else {
                Vec::new()
            }
        });
        if !pending.is_empty() {
            tracing::trace!(deliveries = pending.len(), "flushing batched notifications");
        }
        for deliver in pending {
            deliver();
        }
    }
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope").finish()
    }
}

/// Run `deliver` now, or queue it if a scope is open.
pub(crate) fn defer_or_run(deliver: impl FnOnce() + 'static) {
    let run_now = BATCH.with(|batch| {
        let mut batch = batch.borrow_mut();
        if batch.depth == 0 {
            return Some(deliver);
        }
        batch.pending.push(Box::new(deliver));
        None
    });
    if let Some(deliver) = run_now {
        deliver();
    }
}
