#![forbid(unsafe_code)]

//! Copy-on-write drafts over shared records.
//!
//! A [`Draft`] reads through to its original until a key is written, after
//! which reads return the staged value. [`finalize`] assigns every staged
//! value onto the original through [`Record::set_property`] and returns the
//! original handle.
//!
//! # Usage
//!
//! ```
//! use std::rc::Rc;
//! use draft_state_core::{draft_state_for, finalize, shared};
//! use serde_json::json;
//!
//! let original = shared(json!({"data": 123}));
//! let draft = draft_state_for(&original).unwrap();
//!
//! draft.set("data", json!(456)).unwrap();
//! assert_eq!(original.borrow()["data"], 123);
//! assert_eq!(draft.get("data").unwrap(), Some(json!(456)));
//!
//! let merged = finalize(&draft);
//! assert!(Rc::ptr_eq(&merged, &original));
//! assert_eq!(original.borrow()["data"], 456);
//! ```
//!
//! # Invariants
//!
//! 1. Reads are never cached: an unstaged key always reflects the original's
//!    current value, including mutations made outside the draft.
//! 2. `get` and `set` never touch the original. Only a merge assigns to it.
//! 3. A merge consumes the overlay; afterwards the draft reads through again.
//! 4. [`finalize`] always merges. [`Draft::finalize`] merges unless the record
//!    declares its own `finalize` member, which it calls instead.
//! 5. A failed operation leaves overlay and original unchanged.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Non-object original | null, scalar, array | `DraftError::Construction` |
//! | Unknown key, strict | `get`/`set` of undefined key | `DraftError::Access` |
//! | Unknown key, permissive | `set` of undefined key | `warn!`, staged anyway |
//! | Record rejects a merged value | Typed field mismatch | `warn!`, value dropped |
//! | Re-entrant borrow | Record's own `set_property` reads itself through the handle | `RefCell` panic |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{AccessMode, DraftConfig};
use crate::error::DraftError;
use crate::field::Field;
use crate::fork::{ForkId, ForkStore};
use crate::observe::{BatchScope, Observable, Subscription};
use crate::overlay::Overlay;
use crate::record::{FinalizeMember, Record, Shared};

enum OverlaySlot<R: Record> {
    Owned(RefCell<Overlay<R::Value>>),
    Forked { store: Rc<ForkStore<R>>, id: ForkId },
}

/// A staged view over a shared original.
///
/// Construct with [`draft_state_for`], [`draft_for`], [`Draft::with_config`],
/// or [`ForkStore::draft_state_for`].
pub struct Draft<R: Record> {
    original: Shared<R>,
    overlay: OverlaySlot<R>,
    access: AccessMode,
    own_finalize: Option<FinalizeMember<R>>,
    revision: Observable<u64>,
}

/// Outcome of [`Draft::finalize`].
pub enum Finalized<R: Record> {
    /// The overlay was merged; holds the original handle.
    Merged(Shared<R>),
    /// The record's own `finalize` member ran; holds its result.
    Member(R::Value),
}

impl<R: Record> Finalized<R> {
    /// Whether the overlay was merged.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        matches!(self, Self::Merged(_))
    }

    /// The original handle, if the overlay was merged.
    #[must_use]
    pub fn merged(self) -> Option<Shared<R>> {
        match self {
            Self::Merged(original) => Some(original),
            Self::Member(_) => None,
        }
    }

    /// The member's result, if the record's own `finalize` ran.
    #[must_use]
    pub fn member(self) -> Option<R::Value> {
        match self {
            Self::Merged(_) => None,
            Self::Member(value) => Some(value),
        }
    }
}

impl<R> fmt::Debug for Finalized<R>
where
    R: Record + fmt::Debug,
    R::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merged(original) => f.debug_tuple("Merged").field(original).finish(),
            Self::Member(value) => f.debug_tuple("Member").field(value).finish(),
        }
    }
}

/// Build a strict draft with a private overlay.
///
/// # Errors
///
/// [`DraftError::Construction`] if the original is not an object.
pub fn draft_state_for<R: Record>(original: &Shared<R>) -> Result<Draft<R>, DraftError> {
    Draft::with_config(original, &DraftConfig::strict())
}

/// Build a permissive draft with a private overlay.
///
/// # Errors
///
/// [`DraftError::Construction`] if the original is not an object.
pub fn draft_for<R: Record>(original: &Shared<R>) -> Result<Draft<R>, DraftError> {
    Draft::with_config(original, &DraftConfig::permissive())
}

/// Merge the draft's overlay into its original and return the original.
///
/// Always merges, even when the record declares its own `finalize` member.
/// Values the record refuses are logged and dropped. The overlay is empty
/// afterwards.
///
/// Each assignment borrows the original only for its own duration, and
/// observable notifications raised by the assignments are delivered once all
/// of them are done, so subscribers may read the original or the draft.
pub fn finalize<R: Record>(draft: &Draft<R>) -> Shared<R> {
    let pending: Vec<(String, R::Value)> =
        draft.with_overlay_mut(|overlay| overlay.drain().collect());
    if pending.is_empty() {
        return Rc::clone(&draft.original);
    }

    let _batch = BatchScope::new();
    let _span = tracing::debug_span!("draft_finalize", entries = pending.len()).entered();
    for (key, value) in pending {
        let assigned = draft.original.borrow_mut().set_property(&key, value);
        if assigned.is_err() {
            tracing::warn!(key = %key, "original refused a staged value; dropping it");
        }
    }
    draft.bump_revision();

    Rc::clone(&draft.original)
}

impl<R: Record> Draft<R> {
    /// Build a strict draft with a private overlay.
    ///
    /// # Errors
    ///
    /// [`DraftError::Construction`] if the original is not an object.
    pub fn new(original: &Shared<R>) -> Result<Self, DraftError> {
        Self::with_config(original, &DraftConfig::default())
    }

    /// Build a draft with a private overlay and the given configuration.
    ///
    /// # Errors
    ///
    /// [`DraftError::Construction`] if the original is not an object.
    pub fn with_config(original: &Shared<R>, config: &DraftConfig) -> Result<Self, DraftError> {
        validate(original)?;
        Ok(Self::assemble(
            original,
            config,
            OverlaySlot::Owned(RefCell::new(Overlay::new())),
        ))
    }

    pub(crate) fn in_store(
        store: &Rc<ForkStore<R>>,
        original: &Shared<R>,
        config: &DraftConfig,
    ) -> Result<Self, DraftError> {
        validate(original)?;
        let id = store.create_overlay(original)?;
        Ok(Self::assemble(
            original,
            config,
            OverlaySlot::Forked {
                store: Rc::clone(store),
                id,
            },
        ))
    }

    fn assemble(original: &Shared<R>, config: &DraftConfig, overlay: OverlaySlot<R>) -> Self {
        let own_finalize = original.borrow().own_finalize();
        if own_finalize.is_some() {
            tracing::warn!(
                target_record = %original.borrow().describe(),
                "record defines its own `finalize`; `Draft::finalize` will call it, use `finalize(&draft)` to merge"
            );
        }
        tracing::debug!(access = %config.access, "draft constructed");

        Self {
            original: Rc::clone(original),
            overlay,
            access: config.access,
            own_finalize,
            revision: Observable::new(0),
        }
    }

    /// Read `key`: the staged value if any, else the original's current value.
    ///
    /// In permissive mode a key the original does not define yields only what
    /// this draft staged for it.
    ///
    /// # Errors
    ///
    /// [`DraftError::Access`] in strict mode when the original does not define `key`.
    pub fn get(&self, key: &str) -> Result<Option<R::Value>, DraftError> {
        let record = self.original.borrow();
        let staged = self.with_overlay(|overlay| overlay.get(key).cloned());

        if !record.has_property(key) {
            return match self.access {
                AccessMode::Strict => Err(DraftError::access(key, &*record)),
                AccessMode::Permissive => Ok(staged),
            };
        }

        match staged {
            Some(value) => Ok(Some(value)),
            None => Ok(record.get_property(key)),
        }
    }

    /// Stage `value` under `key`. The original is not touched.
    ///
    /// # Errors
    ///
    /// [`DraftError::Access`] in strict mode when the original does not define `key`.
    pub fn set(&self, key: &str, value: R::Value) -> Result<(), DraftError> {
        {
            let record = self.original.borrow();
            if !record.has_property(key) {
                match self.access {
                    AccessMode::Strict => return Err(DraftError::access(key, &*record)),
                    AccessMode::Permissive => tracing::warn!(
                        key,
                        target_record = %record.describe(),
                        "setting a property the original does not define"
                    ),
                }
            }
        }

        self.with_overlay_mut(|overlay| {
            overlay.insert(key, value);
        });
        self.bump_revision();
        Ok(())
    }

    /// Finalize through the draft itself.
    ///
    /// Merges and returns [`Finalized::Merged`], unless the record declares
    /// its own `finalize` member: then that member runs, nothing is merged,
    /// and its result is returned as [`Finalized::Member`].
    pub fn finalize(&self) -> Finalized<R> {
        match self.own_finalize {
            Some(member) => {
                tracing::debug!("delegating to the record's own finalize member");
                let _batch = BatchScope::new();
                let result = member(&mut self.original.borrow_mut());
                Finalized::Member(result)
            }
            None => Finalized::Merged(finalize(self)),
        }
    }

    /// Staging revision: advances on every successful `set` and on every merge
    /// that assigned something.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    /// Register `callback` for staging changes. It receives the new revision.
    ///
    /// Fires after a staged write and after a merge drains the overlay. Writes
    /// that fail do not fire, and the original's own observers are not
    /// involved in staging.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&u64) + 'static) -> Subscription {
        self.revision.subscribe(callback)
    }

    /// The staging revision as an observable, for bindings.
    #[must_use]
    pub fn changes(&self) -> Observable<u64> {
        self.revision.clone()
    }

    /// Whether `key` has a staged value.
    #[must_use]
    pub fn is_staged(&self, key: &str) -> bool {
        self.with_overlay(|overlay| overlay.contains(key))
    }

    /// Staged keys in first-write order.
    #[must_use]
    pub fn staged_keys(&self) -> Vec<String> {
        self.with_overlay(|overlay| overlay.keys().map(str::to_owned).collect())
    }

    /// Whether any write is waiting to be merged.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.with_overlay(|overlay| !overlay.is_empty())
    }

    /// Access mode chosen at construction.
    #[must_use]
    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// Whether the record declares its own `finalize` member.
    #[must_use]
    pub fn has_finalize_collision(&self) -> bool {
        self.own_finalize.is_some()
    }

    /// Store association backing this draft, if it was built by a [`ForkStore`].
    #[must_use]
    pub fn fork_id(&self) -> Option<ForkId> {
        match &self.overlay {
            OverlaySlot::Owned(_) => None,
            OverlaySlot::Forked { id, .. } => Some(*id),
        }
    }

    fn bump_revision(&self) {
        self.revision.update(|revision| *revision += 1);
    }

    fn with_overlay<T>(&self, f: impl FnOnce(&Overlay<R::Value>) -> T) -> T {
        match &self.overlay {
            OverlaySlot::Owned(cell) => f(&cell.borrow()),
            OverlaySlot::Forked { store, id } => f(&store.overlay(*id)),
        }
    }

    fn with_overlay_mut<T>(&self, f: impl FnOnce(&mut Overlay<R::Value>) -> T) -> T {
        match &self.overlay {
            OverlaySlot::Owned(cell) => f(&mut cell.borrow_mut()),
            OverlaySlot::Forked { store, id } => f(&mut store.overlay_mut(*id)),
        }
    }
}

impl<R: Record<Value = Value>> Draft<R> {
    /// Read a typed field.
    ///
    /// # Errors
    ///
    /// - [`DraftError::Access`] as for [`get`](Self::get).
    /// - [`DraftError::Field`] if there is no value or it does not decode as `T`.
    pub fn read<T: DeserializeOwned>(&self, field: Field<T>) -> Result<T, DraftError> {
        let value = self
            .get(field.key())?
            .ok_or_else(|| DraftError::field(field.key(), "no value"))?;
        serde_json::from_value(value).map_err(|err| DraftError::field(field.key(), err))
    }

    /// Stage a typed field.
    ///
    /// # Errors
    ///
    /// - [`DraftError::Access`] as for [`set`](Self::set).
    /// - [`DraftError::Field`] if `value` does not serialize.
    pub fn write<T: Serialize>(&self, field: Field<T>, value: T) -> Result<(), DraftError> {
        let value = serde_json::to_value(value).map_err(|err| DraftError::field(field.key(), err))?;
        self.set(field.key(), value)
    }
}

impl<R: Record> Drop for Draft<R> {
    fn drop(&mut self) {
        if let OverlaySlot::Forked { store, id } = &self.overlay {
            store.release(*id);
        }
    }
}

impl<R: Record> fmt::Debug for Draft<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Draft")
            .field("access", &self.access)
            .field("staged", &self.staged_keys())
            .field("revision", &self.revision())
            .field("fork", &self.fork_id())
            .field("finalize_collision", &self.has_finalize_collision())
            .finish()
    }
}

fn validate<R: Record>(original: &Shared<R>) -> Result<(), DraftError> {
    let record = original.borrow();
    if record.kind().is_draftable() {
        Ok(())
    } else {
        tracing::debug!(kind = %record.kind(), "refusing to draft a non-object");
        Err(DraftError::construction(&*record))
    }
}
