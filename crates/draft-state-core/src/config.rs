#![forbid(unsafe_code)]

//! Draft access configuration.
//!
//! Two access modes exist:
//!
//! - [`AccessMode::Strict`] rejects reads and writes of keys the original does
//!   not define with [`DraftError::Access`](crate::DraftError::Access).
//! - [`AccessMode::Permissive`] logs a `warn` diagnostic on such writes and
//!   stages them anyway; reads of such keys only see what the draft staged.
//!
//! The mode can be taken from the `DRAFT_STATE_ACCESS` environment variable
//! with [`DraftConfig::from_env`].

use std::env;
use std::fmt;

/// Environment variable consulted by [`DraftConfig::from_env`].
pub const ACCESS_ENV: &str = "DRAFT_STATE_ACCESS";

/// How a draft treats keys the original does not define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    /// Unknown keys are an error.
    #[default]
    Strict,
    /// Unknown keys are staged with a diagnostic.
    Permissive,
}

impl AccessMode {
    /// Parse a mode name. Accepts `strict` and `permissive`, case-insensitive.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("strict") {
            Some(Self::Strict)
        } else if raw.eq_ignore_ascii_case("permissive") {
            Some(Self::Permissive)
        } else {
            None
        }
    }

    /// Lowercase mode name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Permissive => "permissive",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration applied when a draft is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DraftConfig {
    /// Treatment of keys the original does not define.
    /// Default: [`AccessMode::Strict`]
    pub access: AccessMode,
}

impl DraftConfig {
    /// Strict access (the default).
    #[must_use]
    pub fn strict() -> Self {
        Self {
            access: AccessMode::Strict,
        }
    }

    /// Permissive access.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            access: AccessMode::Permissive,
        }
    }

    /// Replace the access mode.
    #[must_use]
    pub fn with_access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    /// Read the configuration from the process environment.
    ///
    /// Unset or unrecognized values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let access = env::var(ACCESS_ENV).ok();
        Self::from_env_value(access.as_deref())
    }

    fn from_env_value(access: Option<&str>) -> Self {
        let parsed = access.and_then(AccessMode::parse);
        if let (None, Some(raw)) = (parsed, access) {
            tracing::debug!(value = raw, "ignoring unrecognized {ACCESS_ENV}");
        }
        Self {
            access: parsed.unwrap_or_default(),
        }
    }
}
