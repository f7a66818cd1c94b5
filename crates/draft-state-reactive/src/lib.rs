#![forbid(unsafe_code)]

//! Reactive collaborators for draft-state.
//!
//! - [`reactive`]: observables, subscriptions, and read bindings
//! - [`Tracked`]: a record wrapper whose assignments, including draft merges,
//!   notify subscribers
//! - [`bind_property`], [`setter`], [`finalize_handler`]: form glue over a
//!   shared draft

pub mod helpers;
pub mod reactive;
pub mod tracked;

pub use helpers::{bind_property, finalize_handler, setter};
pub use reactive::{BatchScope, Binding, Observable, Subscription};
pub use tracked::{Change, Tracked};
