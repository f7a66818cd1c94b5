#![forbid(unsafe_code)]

//! Change-tracking primitives.
//!
//! - [`Observable`]: a shared, version-tracked value with change notification
//!   via subscriber callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`BatchScope`]: RAII guard that defers notifications until the scope
//!   exits.
//!
//! Drafts publish their staging revision through an [`Observable`], and
//! [`finalize`](crate::finalize) merges inside a [`BatchScope`].
//!
//! # Architecture
//!
//! `Observable<T>` uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Subscribers are stored as `Weak` function pointers and cleaned up lazily
//! during notification. `BatchScope` keeps its queue in a thread-local.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 5. Within a `BatchScope`, values are updated immediately but notifications
//!    are deferred until the outermost scope exits.

pub mod batch;
pub mod observable;

pub use batch::BatchScope;
pub use observable::{Observable, Subscription};
