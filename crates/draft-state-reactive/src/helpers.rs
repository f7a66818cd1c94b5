#![forbid(unsafe_code)]

//! Glue between drafts and form-style presentation code.
//!
//! A form binds each input to a draft property, routes input events through a
//! setter, and wires its submit button to a finalize handler. The draft is
//! shared as `Rc<Draft<R>>` so every piece of glue holds the same overlay.
//!
//! ```
//! use std::rc::Rc;
//! use draft_state_core::{draft_state_for, shared};
//! use draft_state_reactive::{bind_property, finalize_handler, setter};
//! use serde_json::json;
//!
//! let profile = shared(json!({"name": "Chris", "age": 34}));
//! let draft = Rc::new(draft_state_for(&profile).unwrap());
//!
//! let name = bind_property(&draft, "name");
//! let set_name = setter(&draft, "name");
//! let submit = finalize_handler(&draft);
//!
//! set_name(json!("Sam"));
//! assert_eq!(name.get(), Some(json!("Sam")));
//! assert_eq!(profile.borrow()["name"], "Chris");
//!
//! submit();
//! assert_eq!(profile.borrow()["name"], "Sam");
//! ```

use std::rc::Rc;

use draft_state_core::{Draft, Record, Shared, finalize};

use crate::reactive::Binding;

/// Bind `key` on `draft`: the staged value if any, else the original's.
///
/// Reads that fail (a strict draft and a key the original lacks) yield `None`
/// and are logged at `debug`.
pub fn bind_property<R>(draft: &Rc<Draft<R>>, key: &str) -> Binding<Option<R::Value>>
where
    R: Record + 'static,
    R::Value: 'static,
{
    let draft = Rc::clone(draft);
    let key = key.to_owned();
    Binding::new(move || match draft.get(&key) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(%err, "bound property read failed");
            None
        }
    })
}

/// A callback that stages its argument under `key` on `draft`.
///
/// Refused writes are logged at `warn` and otherwise ignored, so the callback
/// can be handed to input events directly.
pub fn setter<R>(draft: &Rc<Draft<R>>, key: &str) -> impl Fn(R::Value) + 'static
where
    R: Record + 'static,
    R::Value: 'static,
{
    let draft = Rc::clone(draft);
    let key = key.to_owned();
    move |value| {
        if let Err(err) = draft.set(&key, value) {
            tracing::warn!(%err, "input write refused by draft");
        }
    }
}

/// A callback that merges `draft` into its original and returns the original.
///
/// Always merges, like [`finalize`](draft_state_core::finalize).
pub fn finalize_handler<R>(draft: &Rc<Draft<R>>) -> impl Fn() -> Shared<R> + 'static
where
    R: Record + 'static,
{
    let draft = Rc::clone(draft);
    move || finalize(&draft)
}
