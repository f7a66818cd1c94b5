#![forbid(unsafe_code)]

//! Typed property descriptors.
//!
//! A [`Field<T>`] names a property and the Rust type it holds, so drafts over
//! JSON-valued records can be read and written without hand-written
//! conversions:
//!
//! ```
//! use draft_state_core::{Field, draft_state_for, shared};
//! use serde_json::json;
//!
//! const AGE: Field<u32> = Field::new("age");
//!
//! let original = shared(json!({"name": "Chris", "age": 34}));
//! let draft = draft_state_for(&original).unwrap();
//!
//! draft.write(AGE, 35).unwrap();
//! assert_eq!(draft.read(AGE).unwrap(), 35);
//! assert_eq!(original.borrow()["age"], 34);
//! ```

use std::fmt;
use std::marker::PhantomData;

/// A property key paired with its value type.
pub struct Field<T> {
    key: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Field<T> {
    /// Describe the property named `key`.
    #[must_use]
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    /// The property name.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> PartialEq for Field<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Field<T> {}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::draft_state_for;
    use crate::error::DraftError;
    use crate::record::shared;
    use serde_json::json;

    const NAME: Field<String> = Field::new("name");
    const TAGS: Field<Vec<String>> = Field::new("tags");
    const AGE: Field<u32> = Field::new("age");

    #[test]
    fn key_and_debug() {
        assert_eq!(NAME.key(), "name");
        assert_eq!(format!("{NAME:?}"), "Field(\"name\")");
        assert_eq!(NAME, Field::<String>::new("name"));
    }

    #[test]
    fn typed_round_trip_through_draft() {
        let original = shared(json!({"name": "Chris", "tags": []}));
        let draft = draft_state_for(&original).unwrap();

        draft.write(TAGS, vec!["a".to_string()]).unwrap();
        assert_eq!(draft.read(TAGS).unwrap(), vec!["a".to_string()]);
        assert_eq!(draft.read(NAME).unwrap(), "Chris");
    }

    #[test]
    fn decode_mismatch_is_field_error() {
        let original = shared(json!({"age": "old"}));
        let draft = draft_state_for(&original).unwrap();

        let err = draft.read(AGE).unwrap_err();
        assert!(matches!(err, DraftError::Field { ref key, .. } if key == "age"));
    }

    #[test]
    fn unknown_field_is_access_error() {
        let original = shared(json!({}));
        let draft = draft_state_for(&original).unwrap();
        assert!(matches!(
            draft.write(AGE, 1).unwrap_err(),
            DraftError::Access { .. }
        ));
    }
}
