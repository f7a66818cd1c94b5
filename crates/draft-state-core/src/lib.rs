#![forbid(unsafe_code)]

//! Copy-on-write draft overlays for records.
//!
//! This crate provides:
//! - [`Record`] for describing an original's named properties
//! - [`Draft`] for staged reads and writes over a [`Shared`] original
//! - [`finalize`] for merging staged writes back through the record's native
//!   assignment path
//! - [`ForkStore`] for original-keyed overlays (one active draft per original)
//! - [`observe`] for the observables drafts publish their staging revision on

pub mod config;
pub mod draft;
pub mod error;
pub mod field;
pub mod fork;
pub mod observe;
pub mod overlay;
pub mod record;

pub use config::{AccessMode, DraftConfig};
pub use draft::{Draft, Finalized, draft_for, draft_state_for, finalize};
pub use error::DraftError;
pub use field::Field;
pub use fork::{ForkId, ForkStore};
pub use observe::{BatchScope, Observable, Subscription};
pub use overlay::Overlay;
pub use record::{FinalizeMember, Record, RecordKind, Shared, shared};

#[doc(hidden)]
pub use serde_json;
#[doc(hidden)]
pub use tracing;
