#![forbid(unsafe_code)]

//! Change-tracking primitives.
//!
//! - [`Observable`], [`Subscription`], [`BatchScope`]: re-exported from
//!   [`draft_state_core::observe`], where drafts use them for staging
//!   notifications.
//! - [`Binding`]: a lazily evaluated read binding.
//!
//! # Invariants
//!
//! 1. A binding holds no cache; every `get` re-evaluates its source.
//! 2. Bindings never subscribe, so they cannot keep a source's callbacks
//!    alive.

pub mod binding;

pub use binding::{Binding, bind_mapped, bind_observable};
pub use draft_state_core::observe::{BatchScope, Observable, Subscription};
