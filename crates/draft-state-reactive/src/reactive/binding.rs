#![forbid(unsafe_code)]

//! Read bindings over observables and drafts.
//!
//! A [`Binding<T>`] wraps an evaluation closure. It is how form fields read
//! the value they display: the closure runs on every `get()`, so the binding
//! never goes stale.
//!
//! # Usage
//!
//! ```
//! use draft_state_reactive::reactive::{Observable, bind_mapped, bind_observable};
//!
//! let count = Observable::new(0);
//! let direct = bind_observable(&count);
//! let label = bind_mapped(&count, |c| format!("Count: {c}"));
//!
//! count.set(5);
//! assert_eq!(direct.get(), 5);
//! assert_eq!(label.get(), "Count: 5");
//! ```
//!
//! # Invariants
//!
//! 1. `Binding::get()` always returns the current value.
//! 2. Transforms run on every `get()`; nothing is cached.
//! 3. Clones share the same evaluation closure.

use std::fmt;
use std::rc::Rc;

use draft_state_core::observe::Observable;

/// A lazily evaluated read binding.
pub struct Binding<T> {
    eval: Rc<dyn Fn() -> T>,
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            eval: Rc::clone(&self.eval),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("value", &self.get())
            .finish()
    }
}

impl<T: 'static> Binding<T> {
    /// Create a binding that evaluates `f` on each `get()` call.
    pub fn new(f: impl Fn() -> T + 'static) -> Self {
        Self { eval: Rc::new(f) }
    }

    /// Current bound value.
    #[must_use]
    pub fn get(&self) -> T {
        (self.eval)()
    }

    /// Apply a further transform, returning a new `Binding`.
    pub fn then<U: 'static>(self, f: impl Fn(T) -> U + 'static) -> Binding<U> {
        Binding {
            eval: Rc::new(move || f((self.eval)())),
        }
    }
}

/// Bind directly to an observable.
pub fn bind_observable<T: Clone + PartialEq + 'static>(source: &Observable<T>) -> Binding<T> {
    let src = source.clone();
    Binding::new(move || src.get())
}

/// Bind to an observable through `map`.
pub fn bind_mapped<S: Clone + PartialEq + 'static, T: 'static>(
    source: &Observable<S>,
    map: impl Fn(&S) -> T + 'static,
) -> Binding<T> {
    let src = source.clone();
    Binding::new(move || src.with(|v| map(v)))
}
