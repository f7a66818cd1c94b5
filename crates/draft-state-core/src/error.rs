#![forbid(unsafe_code)]

//! Errors raised by draft construction and property access.
//!
//! Every error is local to the call that raised it: a failed `get`, `set`, or
//! construction leaves both the overlay and the original untouched.

use std::fmt;

use crate::record::Record;

/// Errors from draft operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DraftError {
    /// The original is not an object (null, a scalar, or an array).
    Construction {
        /// Rendering of the rejected argument.
        argument: String,
    },
    /// A strict draft was asked for a property the original does not define.
    Access {
        /// The missing key.
        key: String,
        /// Rendering of the original.
        target: String,
    },
    /// The fork store already holds an active overlay for this original.
    AlreadyForked {
        /// Rendering of the original.
        target: String,
    },
    /// A typed field could not be converted to or from the record's values.
    Field {
        /// The field key.
        key: String,
        /// Conversion failure detail.
        message: String,
    },
}

impl DraftError {
    pub(crate) fn construction<R: Record>(record: &R) -> Self {
        Self::Construction {
            argument: record.describe(),
        }
    }

    pub(crate) fn access<R: Record>(key: &str, record: &R) -> Self {
        Self::Access {
            key: key.to_owned(),
            target: record.describe(),
        }
    }

    pub(crate) fn field(key: &str, message: impl fmt::Display) -> Self {
        Self::Field {
            key: key.to_owned(),
            message: message.to_string(),
        }
    }

    /// Whether this error rejected a draft before it existed.
    #[must_use]
    pub fn is_construction(&self) -> bool {
        matches!(self, Self::Construction { .. } | Self::AlreadyForked { .. })
    }
}

impl fmt::Display for DraftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construction { argument } => {
                write!(f, "Attempted to construct a DraftState with \"{argument}\"")
            }
            Self::Access { key, target } => {
                write!(f, "Attempting to access {key} on object {target}")
            }
            Self::AlreadyForked { target } => {
                write!(f, "a draft overlay is already active for {target}")
            }
            Self::Field { key, message } => write!(f, "field '{key}': {message}"),
        }
    }
}

impl std::error::Error for DraftError {}
