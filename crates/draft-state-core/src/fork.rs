#![forbid(unsafe_code)]

//! Original-keyed overlay store.
//!
//! A [`ForkStore`] keeps at most one overlay per original. Drafts built with
//! [`ForkStore::draft_state_for`] hold a [`ForkId`] into the store instead of
//! owning their overlay, and release it when dropped.
//!
//! # Invariants
//!
//! 1. **One overlay per original**: `create_overlay` fails with
//!    [`DraftError::AlreadyForked`] while an association for the same live
//!    original exists.
//! 2. **Non-owning association**: the store holds a `Weak` to each original.
//!    An association whose original was dropped counts as released. Such
//!    associations are pruned by [`ForkStore::prune`], which `create_overlay`
//!    calls once the store has doubled since the last pass.
//! 3. **No mutation of originals**: the store only does bookkeeping.
//! 4. **Constant-time lookup**: associations are indexed by the original's
//!    allocation address. The held `Weak` keeps that allocation reserved, so
//!    no other original can reuse the address while the entry exists.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Second draft for one original | Association still held | `AlreadyForked` |
//! | Lookup of unknown `ForkId` | Construction bypassed the store | Panic (`overlay`), `None` (`try_overlay`) |

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::DraftConfig;
use crate::draft::Draft;
use crate::error::DraftError;
use crate::overlay::Overlay;
use crate::record::{Record, Shared};

/// Handle to an overlay inside a [`ForkStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForkId(u64);

impl ForkId {
    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ForkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fork#{}", self.0)
    }
}

struct Fork<R: Record> {
    original: Weak<RefCell<R>>,
    overlay: Overlay<R::Value>,
}

struct Forks<R: Record> {
    by_id: HashMap<ForkId, Fork<R>>,
    by_original: HashMap<*const RefCell<R>, ForkId>,
}

impl<R: Record> Forks<R> {
    fn remove(&mut self, id: ForkId) -> Option<Fork<R>> {
        let fork = self.by_id.remove(&id)?;
        self.by_original.remove(&fork.original.as_ptr());
        Some(fork)
    }
}

/// Store mapping originals to their single active overlay.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use draft_state_core::{ForkStore, shared};
/// use serde_json::json;
///
/// let store = Rc::new(ForkStore::new());
/// let original = shared(json!({"data": 123}));
///
/// let draft = store.draft_state_for(&original).unwrap();
/// assert!(store.draft_state_for(&original).is_err());
///
/// drop(draft);
/// assert!(store.draft_state_for(&original).is_ok());
/// ```
pub struct ForkStore<R: Record> {
    forks: RefCell<Forks<R>>,
    next_id: Cell<u64>,
    prune_at: Cell<usize>,
}

const MIN_PRUNE_AT: usize = 16;

impl<R: Record> Default for ForkStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> ForkStore<R> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            forks: RefCell::new(Forks {
                by_id: HashMap::new(),
                by_original: HashMap::new(),
            }),
            next_id: Cell::new(0),
            prune_at: Cell::new(MIN_PRUNE_AT),
        }
    }

    /// Build a strict draft whose overlay lives in this store.
    ///
    /// # Errors
    ///
    /// - [`DraftError::Construction`] if the original is not an object.
    /// - [`DraftError::AlreadyForked`] if the original already has a draft.
    pub fn draft_state_for(self: &Rc<Self>, original: &Shared<R>) -> Result<Draft<R>, DraftError> {
        Draft::in_store(self, original, &DraftConfig::default())
    }

    /// Build a draft with `config` whose overlay lives in this store.
    ///
    /// # Errors
    ///
    /// Same as [`draft_state_for`](Self::draft_state_for).
    pub fn draft_with_config(
        self: &Rc<Self>,
        original: &Shared<R>,
        config: &DraftConfig,
    ) -> Result<Draft<R>, DraftError> {
        Draft::in_store(self, original, config)
    }

    /// Allocate an empty overlay for `original`.
    ///
    /// # Errors
    ///
    /// [`DraftError::AlreadyForked`] if a live association already exists.
    pub fn create_overlay(&self, original: &Shared<R>) -> Result<ForkId, DraftError> {
        if self.len() >= self.prune_at.get() {
            self.prune();
            self.prune_at.set((self.len() * 2).max(MIN_PRUNE_AT));
        }

        let target = Rc::as_ptr(original);
        let mut forks = self.forks.borrow_mut();
        if let Some(&existing) = forks.by_original.get(&target) {
            let live = forks
                .by_id
                .get(&existing)
                .is_some_and(|fork| fork.original.strong_count() > 0);
            if live {
                return Err(DraftError::AlreadyForked {
                    target: original.borrow().describe(),
                });
            }
            forks.remove(existing);
        }

        let id = ForkId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        forks.by_id.insert(
            id,
            Fork {
                original: Rc::downgrade(original),
                overlay: Overlay::new(),
            },
        );
        forks.by_original.insert(target, id);
        tracing::trace!(fork = %id, "overlay created");
        Ok(id)
    }

    /// The active association for `original`, if any.
    #[must_use]
    pub fn lookup(&self, original: &Shared<R>) -> Option<ForkId> {
        let forks = self.forks.borrow();
        let id = *forks.by_original.get(&Rc::as_ptr(original))?;
        forks
            .by_id
            .get(&id)
            .filter(|fork| fork.original.strong_count() > 0)
            .map(|_| id)
    }

    /// The overlay registered under `id`.
    ///
    /// # Panics
    ///
    /// Panics if no overlay is registered under `id`. Drafts always register
    /// before use, so this indicates a draft built outside the store.
    #[track_caller]
    pub fn overlay(&self, id: ForkId) -> Ref<'_, Overlay<R::Value>> {
        match self.try_overlay(id) {
            Some(overlay) => overlay,
            None => missing_overlay(id),
        }
    }

    /// Mutable access to the overlay registered under `id`.
    ///
    /// # Panics
    ///
    /// Same as [`overlay`](Self::overlay).
    #[track_caller]
    pub fn overlay_mut(&self, id: ForkId) -> RefMut<'_, Overlay<R::Value>> {
        match RefMut::filter_map(self.forks.borrow_mut(), |forks| {
            forks.by_id.get_mut(&id).map(|fork| &mut fork.overlay)
        }) {
            Ok(overlay) => overlay,
            Err(_) => missing_overlay(id),
        }
    }

    /// The overlay registered under `id`, or `None`.
    #[must_use]
    pub fn try_overlay(&self, id: ForkId) -> Option<Ref<'_, Overlay<R::Value>>> {
        Ref::filter_map(self.forks.borrow(), |forks| {
            forks.by_id.get(&id).map(|fork| &fork.overlay)
        })
        .ok()
    }

    /// Drop the association under `id`. Returns whether one existed.
    pub fn release(&self, id: ForkId) -> bool {
        let released = self.forks.borrow_mut().remove(id).is_some();
        if released {
            tracing::trace!(fork = %id, "overlay released");
        }
        released
    }

    /// Number of associations, including ones whose original was dropped but
    /// not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forks.borrow().by_id.len()
    }

    /// Whether the store holds no associations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forks.borrow().by_id.is_empty()
    }

    /// Drop every association whose original was dropped. Returns how many
    /// were removed.
    pub fn prune(&self) -> usize {
        let mut forks = self.forks.borrow_mut();
        let before = forks.by_id.len();
        let Forks { by_id, by_original } = &mut *forks;
        by_id.retain(|_, fork| {
            let live = fork.original.strong_count() > 0;
            if !live {
                by_original.remove(&fork.original.as_ptr());
            }
            live
        });
        let pruned = before - by_id.len();
        if pruned > 0 {
            tracing::trace!(pruned, "stale overlays pruned");
        }
        pruned
    }
}

impl<R: Record> fmt::Debug for ForkStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkStore")
            .field("forks", &self.len())
            .field("next_id", &self.next_id.get())
            .finish()
    }
}

#[cold]
#[track_caller]
fn missing_overlay(id: ForkId) -> ! {
    panic!("overlay missing for {id}: draft state was constructed incorrectly")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::shared;
    use serde_json::{Value, json};

    #[test]
    fn create_and_lookup() {
        let store: ForkStore<Value> = ForkStore::new();
        let original = shared(json!({"a": 1}));

        let id = store.create_overlay(&original).unwrap();
        assert_eq!(store.lookup(&original), Some(id));
        assert_eq!(store.len(), 1);
        assert!(store.overlay(id).is_empty());
    }

    #[test]
    fn second_create_for_same_original_fails() {
        let store: ForkStore<Value> = ForkStore::new();
        let original = shared(json!({"a": 1}));

        store.create_overlay(&original).unwrap();
        let err = store.create_overlay(&original).unwrap_err();
        assert!(matches!(err, DraftError::AlreadyForked { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn distinct_originals_get_distinct_overlays() {
        let store: ForkStore<Value> = ForkStore::new();
        let a = shared(json!({"a": 1}));
        let b = shared(json!({"a": 1}));

        let id_a = store.create_overlay(&a).unwrap();
        let id_b = store.create_overlay(&b).unwrap();
        assert_ne!(id_a, id_b);

        store.overlay_mut(id_a).insert("a", json!(2));
        assert_eq!(store.overlay(id_a).get("a"), Some(&json!(2)));
        assert!(store.overlay(id_b).is_empty());
    }

    #[test]
    fn release_allows_recreate() {
        let store: ForkStore<Value> = ForkStore::new();
        let original = shared(json!({}));

        let id = store.create_overlay(&original).unwrap();
        assert!(store.release(id));
        assert!(!store.release(id));
        assert!(store.try_overlay(id).is_none());
        assert!(store.create_overlay(&original).is_ok());
    }

    #[test]
    fn dropped_original_is_pruned() {
        let store: ForkStore<Value> = ForkStore::new();
        let original = shared(json!({}));
        store.create_overlay(&original).unwrap();
        drop(original);

        let other = shared(json!({}));
        let id = store.create_overlay(&other).unwrap();
        assert_eq!(store.len(), 2, "pruning waits for the store to grow");
        assert_eq!(store.prune(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.lookup(&other), Some(id));
    }

    #[test]
    fn growth_triggers_pruning() {
        let store: ForkStore<Value> = ForkStore::new();
        for _ in 0..MIN_PRUNE_AT {
            let transient = shared(json!({}));
            store.create_overlay(&transient).unwrap();
        }
        assert_eq!(store.len(), MIN_PRUNE_AT);

        let kept = shared(json!({}));
        store.create_overlay(&kept).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lookup_scales_with_many_forks() {
        let store: ForkStore<Value> = ForkStore::new();
        let originals: Vec<_> = (0..1_000).map(|i| shared(json!({ "i": i }))).collect();
        let ids: Vec<_> = originals
            .iter()
            .map(|original| store.create_overlay(original).unwrap())
            .collect();

        for (original, id) in originals.iter().zip(&ids) {
            assert_eq!(store.lookup(original), Some(*id));
        }
        assert!(store.release(ids[500]));
        assert_eq!(store.lookup(&originals[500]), None);
        assert!(store.create_overlay(&originals[500]).is_ok());
    }

    #[test]
    #[should_panic(expected = "overlay missing")]
    fn unknown_id_panics() {
        let store: ForkStore<Value> = ForkStore::new();
        let _ = store.overlay(ForkId(42));
    }

    #[test]
    fn fork_id_display() {
        assert_eq!(ForkId(3).to_string(), "fork#3");
        assert_eq!(ForkId(3).get(), 3);
    }
}
