#![forbid(unsafe_code)]

//! Records that announce their assignments.
//!
//! [`Tracked<R>`] wraps any [`Record`] and notifies subscribers after every
//! successful `set_property`. Because a merge assigns through that same path,
//! finalizing a draft over a tracked original is observed exactly like a
//! caller assignment, one [`Change`] per merged key. Staging writes on a draft
//! never notifies the original; observe the draft itself for those.
//!
//! A merge runs under a [`BatchScope`], so its notifications arrive after the
//! original's `borrow_mut` is released and callbacks may read the original.
//! [`Tracked::assign`] gives direct assignments the same ordering.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use draft_state_core::{draft_state_for, finalize, shared};
//! use draft_state_reactive::Tracked;
//! use serde_json::json;
//!
//! let original = shared(Tracked::new(json!({"name": "Chris"})));
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let seen_cb = Rc::clone(&seen);
//! let _sub = original
//!     .borrow()
//!     .subscribe(move |change| seen_cb.borrow_mut().push(change.key.clone()));
//!
//! let draft = draft_state_for(&original).unwrap();
//! draft.set("name", json!("Sam")).unwrap();
//! assert!(seen.borrow().is_empty());
//!
//! finalize(&draft);
//! assert_eq!(*seen.borrow(), vec!["name".to_string()]);
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Subscriber borrows the original | A direct `borrow_mut().set_property(..)` outside any batch | `RefCell` panic; assign through [`Tracked::assign`] or the `Change` payload |
//! | Assignment refused | Inner record rejects the value | No revision bump, no notification |

use std::fmt;

use draft_state_core::{FinalizeMember, Record, RecordKind};

use draft_state_core::Shared;
use draft_state_core::observe::{BatchScope, Observable, Subscription};

/// One successful assignment on a [`Tracked`] record.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<V> {
    /// Assignment count after this change, starting at 1.
    pub revision: u64,
    /// Property that was assigned.
    pub key: String,
    /// Value that was assigned.
    pub value: V,
}

/// A record wrapper that notifies subscribers on assignment.
pub struct Tracked<R: Record> {
    record: R,
    revision: u64,
    changes: Observable<Option<Change<R::Value>>>,
}

impl<R> Tracked<R>
where
    R: Record,
    R::Value: PartialEq + 'static,
{
    /// Start tracking `record` at revision 0.
    pub fn new(record: R) -> Self {
        Self {
            record,
            revision: 0,
            changes: Observable::new(None),
        }
    }

    /// Register `callback` for every subsequent assignment.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&Change<R::Value>) + 'static) -> Subscription {
        self.changes.subscribe(move |change| {
            if let Some(change) = change {
                callback(change);
            }
        })
    }

    /// The most recent change as an observable, for bindings.
    #[must_use]
    pub fn changes(&self) -> Observable<Option<Change<R::Value>>> {
        self.changes.clone()
    }

    /// Number of successful assignments so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The wrapped record.
    #[must_use]
    pub fn get_ref(&self) -> &R {
        &self.record
    }

    /// Assign `key` on a shared tracked record, notifying after the borrow
    /// is released.
    ///
    /// # Errors
    ///
    /// Returns the value back if the wrapped record refuses it.
    pub fn assign(this: &Shared<Self>, key: &str, value: R::Value) -> Result<(), R::Value> {
        let batch = BatchScope::new();
        let assigned = this.borrow_mut().set_property(key, value);
        drop(batch);
        assigned
    }

    /// Unwrap, dropping all subscriptions' source.
    pub fn into_inner(self) -> R {
        self.record
    }
}

impl<R> Record for Tracked<R>
where
    R: Record,
    R::Value: PartialEq + 'static,
{
    type Value = R::Value;

    fn kind(&self) -> RecordKind {
        self.record.kind()
    }

    fn has_property(&self, key: &str) -> bool {
        self.record.has_property(key)
    }

    fn get_property(&self, key: &str) -> Option<R::Value> {
        self.record.get_property(key)
    }

    fn set_property(&mut self, key: &str, value: R::Value) -> Result<(), R::Value> {
        self.record.set_property(key, value.clone())?;
        self.revision += 1;
        tracing::trace!(key, revision = self.revision, "tracked assignment");
        self.changes.set(Some(Change {
            revision: self.revision,
            key: key.to_owned(),
            value,
        }));
        Ok(())
    }

    fn own_finalize(&self) -> Option<FinalizeMember<Self>> {
        self.record
            .own_finalize()
            .map(|_| forward_finalize::<R> as FinalizeMember<Self>)
    }

    fn describe(&self) -> String {
        self.record.describe()
    }
}

/// Calls the wrapped record's own `finalize` member.
///
/// # Panics
///
/// If the wrapped record stopped declaring a member after `own_finalize`
/// reported one.
fn forward_finalize<R>(tracked: &mut Tracked<R>) -> R::Value
where
    R: Record,
    R::Value: PartialEq + 'static,
{
    let Some(member) = tracked.record.own_finalize() else {
        unreachable!("own_finalize changed between lookup and call")
    };
    member(&mut tracked.record)
}

impl<R> fmt::Debug for Tracked<R>
where
    R: Record + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("record", &self.record)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}
