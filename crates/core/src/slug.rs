use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Stable string identifier of a permission or role (e.g. `"users.update"`).
///
/// Slugs are the unit of comparison in every authorization check; display
/// names never are.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(Cow<'static, str>);

impl Slug {
    /// Build a slug without validation. Intended for constants and values read
    /// back from storage.
    pub const fn from_static(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    pub fn new(value: impl Into<Cow<'static, str>>) -> Self {
        Self(value.into())
    }

    /// Validate user input: non-empty, lowercase ascii, digits and `._-`.
    pub fn parse(value: impl Into<Cow<'static, str>>) -> DomainResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::validation("slug must not be empty"));
        }
        let valid = value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(DomainError::validation(format!(
                "slug '{value}' may only contain lowercase letters, digits, '.', '_' and '-'"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Slug {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for Slug {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Slug {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}
