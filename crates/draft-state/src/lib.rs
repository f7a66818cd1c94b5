#![forbid(unsafe_code)]

//! Copy-on-write drafts over shared records.
//!
//! A draft stages writes in an overlay and reads through to its original for
//! everything it has not written. Finalizing merges the overlay back through
//! the original's own assignment path.
//!
//! ```
//! use draft_state::prelude::*;
//! use serde_json::json;
//!
//! let original = shared(json!({"data": 123}));
//! let draft = draft_state_for(&original)?;
//!
//! draft.set("data", json!(456))?;
//! assert_eq!(original.borrow()["data"], 123);
//!
//! finalize(&draft);
//! assert_eq!(original.borrow()["data"], 456);
//! # Ok::<(), DraftError>(())
//! ```
//!
//! The `reactive` feature (on by default) adds observable records and form
//! glue from `draft-state-reactive`.

pub use draft_state_core::{
    AccessMode, BatchScope, Draft, DraftConfig, DraftError, Field, Finalized, ForkId, ForkStore,
    Observable, Overlay, Record, RecordKind, Shared, Subscription, config, draft, draft_for,
    draft_state_for, error, field, finalize, fork, observe, overlay, record, shared,
};

#[cfg(feature = "reactive")]
pub use draft_state_reactive::{
    Binding, Change, Tracked, bind_property, finalize_handler, reactive, setter,
};

/// Everything needed to draft, edit, and finalize.
pub mod prelude {
    pub use draft_state_core::{
        AccessMode, Draft, DraftConfig, DraftError, Field, Finalized, ForkStore, Observable,
        Record, Shared, draft_for, draft_state_for, finalize, record, shared,
    };

    #[cfg(feature = "reactive")]
    pub use draft_state_reactive::{Binding, Change, Tracked, bind_property, finalize_handler, setter};
}
