#![forbid(unsafe_code)]

//! The property surface a draft reads through and merges into.
//!
//! A [`Record`] is anything with named properties: a dynamic JSON object, a
//! string-keyed map, or a plain struct declared with [`record!`](crate::record).
//! Originals are held by callers as a [`Shared`] handle so that a draft can
//! observe mutations made outside of it.
//!
//! # Invariants
//!
//! 1. `has_property(k)` is the single source of truth for whether `k` exists.
//!    A draft never consults `get_property` to decide existence.
//! 2. `set_property` is the record's native assignment path. Wrappers that
//!    observe assignments (see `draft-state-reactive`) hook it, so a merge is
//!    indistinguishable from a caller assignment.
//! 3. `own_finalize` is a pure capability check; it is called once per draft.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown field | Typed record, key not declared | `set_property` returns the value back |
//! | Type mismatch | Typed record, value does not decode | `set_property` returns the value back |
//! | Non-object JSON | `Value::Null`, arrays, scalars | `kind()` reports it; drafts refuse it |

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

/// Shared handle to an original record.
///
/// Drafts keep a clone of the handle, never a copy of the record, so identity
/// comparisons use [`Rc::ptr_eq`].
pub type Shared<R> = Rc<RefCell<R>>;

/// Wrap a record in a [`Shared`] handle.
#[must_use]
pub fn shared<R>(record: R) -> Shared<R> {
    Rc::new(RefCell::new(record))
}

/// A record-defined `finalize` member.
pub type FinalizeMember<R> = fn(&mut R) -> <R as Record>::Value;

/// Runtime shape of a record, used to reject non-object originals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// A keyed object. The only shape that can be drafted.
    Object,
    /// An ordered list.
    Array,
    /// The absent value.
    Null,
    /// `true` or `false`.
    Bool,
    /// Any number.
    Number,
    /// A string.
    String,
}

impl RecordKind {
    /// Whether a draft may be constructed over a record of this kind.
    #[must_use]
    pub const fn is_draftable(self) -> bool {
        matches!(self, Self::Object)
    }

    /// Lowercase name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named-property access over an original.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use draft_state_core::record::Record;
///
/// let mut map = BTreeMap::new();
/// map.insert("data".to_string(), 123);
///
/// assert!(map.has_property("data"));
/// assert_eq!(map.get_property("data"), Some(123));
/// map.set_property("data", 456).unwrap();
/// assert_eq!(map.get_property("data"), Some(456));
/// ```
pub trait Record: Sized {
    /// The value stored under each property.
    type Value: Clone;

    /// Runtime shape of this record. Typed records are always objects.
    fn kind(&self) -> RecordKind {
        RecordKind::Object
    }

    /// Whether `key` names a property of this record.
    fn has_property(&self, key: &str) -> bool;

    /// Current value of `key`, if the record defines it.
    fn get_property(&self, key: &str) -> Option<Self::Value>;

    /// Assign `value` to `key` through the record's native assignment path.
    ///
    /// # Errors
    ///
    /// Returns the value back when the record cannot store it.
    fn set_property(&mut self, key: &str, value: Self::Value) -> Result<(), Self::Value>;

    /// The record's own `finalize` member, if it declares one.
    fn own_finalize(&self) -> Option<FinalizeMember<Self>> {
        None
    }

    /// Short rendering of the record for diagnostics.
    fn describe(&self) -> String;
}

impl Record for Value {
    type Value = Value;

    fn kind(&self) -> RecordKind {
        match self {
            Value::Object(_) => RecordKind::Object,
            Value::Array(_) => RecordKind::Array,
            Value::Null => RecordKind::Null,
            Value::Bool(_) => RecordKind::Bool,
            Value::Number(_) => RecordKind::Number,
            Value::String(_) => RecordKind::String,
        }
    }

    fn has_property(&self, key: &str) -> bool {
        self.as_object().is_some_and(|map| map.contains_key(key))
    }

    fn get_property(&self, key: &str) -> Option<Value> {
        self.as_object().and_then(|map| map.get(key)).cloned()
    }

    fn set_property(&mut self, key: &str, value: Value) -> Result<(), Value> {
        match self {
            Value::Object(map) => {
                map.insert(key.to_owned(), value);
                Ok(())
            }
            _ => Err(value),
        }
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl Record for Map<String, Value> {
    type Value = Value;

    fn has_property(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn get_property(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }

    fn set_property(&mut self, key: &str, value: Value) -> Result<(), Value> {
        self.insert(key.to_owned(), value);
        Ok(())
    }

    fn describe(&self) -> String {
        // Cloning keeps `describe` infallible; it only runs on error paths.
        Value::Object(self.clone()).to_string()
    }
}

impl<V: Clone + fmt::Debug> Record for BTreeMap<String, V> {
    type Value = V;

    fn has_property(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn get_property(&self, key: &str) -> Option<V> {
        self.get(key).cloned()
    }

    fn set_property(&mut self, key: &str, value: V) -> Result<(), V> {
        self.insert(key.to_owned(), value);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

impl<V: Clone + fmt::Debug> Record for HashMap<String, V> {
    type Value = V;

    fn has_property(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn get_property(&self, key: &str) -> Option<V> {
        self.get(key).cloned()
    }

    fn set_property(&mut self, key: &str, value: V) -> Result<(), V> {
        self.insert(key.to_owned(), value);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

/// Implement [`Record`] for a struct by listing its draftable fields.
///
/// Field values travel as [`serde_json::Value`], so every listed field must be
/// `Serialize + DeserializeOwned`. Unlisted fields are invisible to drafts.
///
/// Append `finalize = path` to declare that the struct has its own `finalize`
/// member. `Draft::finalize` then calls that member instead of merging, and
/// only the free function [`finalize`](crate::finalize) merges. A member
/// result that does not serialize is logged at `warn` and reported as null.
///
/// # Examples
///
/// ```
/// use draft_state_core::{draft_state_for, finalize, record, shared};
///
/// #[derive(Debug)]
/// struct Profile {
///     name: String,
///     age: u32,
/// }
///
/// record!(Profile { name, age });
///
/// let original = shared(Profile { name: "Chris".into(), age: 34 });
/// let draft = draft_state_for(&original).unwrap();
/// draft.set("age", 35.into()).unwrap();
/// assert_eq!(original.borrow().age, 34);
///
/// finalize(&draft);
/// assert_eq!(original.borrow().age, 35);
/// ```
#[macro_export]
macro_rules! record {
    (@impl $ty:ty { $($field:ident),+ } { $($extra:tt)* }) => {
        impl $crate::record::Record for $ty {
            type Value = $crate::serde_json::Value;

            fn has_property(&self, key: &str) -> bool {
                [$(stringify!($field)),+].contains(&key)
            }

            fn get_property(&self, key: &str) -> ::core::option::Option<Self::Value> {
                match key {
                    $(k if k == stringify!($field) => $crate::serde_json::to_value(&self.$field).ok(),)+
                    _ => ::core::option::Option::None,
                }
            }

            fn set_property(
                &mut self,
                key: &str,
                value: Self::Value,
            ) -> ::core::result::Result<(), Self::Value> {
                $(
                    if key == stringify!($field) {
                        return match $crate::serde_json::from_value(value.clone()) {
                            ::core::result::Result::Ok(decoded) => {
                                self.$field = decoded;
                                ::core::result::Result::Ok(())
                            }
                            ::core::result::Result::Err(_) => ::core::result::Result::Err(value),
                        };
                    }
                )+
                ::core::result::Result::Err(value)
            }

            fn describe(&self) -> ::std::string::String {
                let mut fields = $crate::serde_json::Map::new();
                $(
                    if let ::core::result::Result::Ok(value) = $crate::serde_json::to_value(&self.$field) {
                        fields.insert(stringify!($field).to_owned(), value);
                    }
                )+
                $crate::serde_json::Value::Object(fields).to_string()
            }

            $($extra)*
        }
    };
    ($ty:ty { $($field:ident),+ $(,)? } finalize = $member:path) => {
        $crate::record!(@impl $ty { $($field),+ } {
            fn own_finalize(&self) -> ::core::option::Option<$crate::record::FinalizeMember<Self>> {
                ::core::option::Option::Some(|record: &mut $ty| {
                    match $crate::serde_json::to_value($member(record)) {
                        ::core::result::Result::Ok(value) => value,
                        ::core::result::Result::Err(err) => {
                            $crate::tracing::warn!(
                                %err,
                                "own `finalize` result does not convert to a value; returning null"
                            );
                            $crate::serde_json::Value::Null
                        }
                    }
                })
            }
        });
    };
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        $crate::record!(@impl $ty { $($field),+ } {});
    };
}
