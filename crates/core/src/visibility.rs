//! Soft-delete visibility scope.
//!
//! Every read path takes a `Visibility` argument; there is no hidden global
//! filter that a query could forget to apply.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// `deleted_at IS NULL` (the default for every read).
    #[default]
    Active,
    /// No filter: active and trashed rows.
    WithTrashed,
    /// `deleted_at IS NOT NULL`.
    OnlyTrashed,
}

impl Visibility {
    /// Whether a row with the given `deleted_at` is visible in this scope.
    pub fn admits(self, deleted_at: Option<DateTime<Utc>>) -> bool {
        match self {
            Visibility::Active => deleted_at.is_none(),
            Visibility::WithTrashed => true,
            Visibility::OnlyTrashed => deleted_at.is_some(),
        }
    }

    /// SQL predicate over `<alias>.deleted_at`, or `None` when unfiltered.
    pub fn sql_predicate(self, alias: &str) -> Option<String> {
        match self {
            Visibility::Active => Some(format!("{alias}.deleted_at IS NULL")),
            Visibility::WithTrashed => None,
            Visibility::OnlyTrashed => Some(format!("{alias}.deleted_at IS NOT NULL")),
        }
    }
}

impl FromStr for Visibility {
    type Err = DomainError;

    /// Accepts the `trashed` query values used by admin listings:
    /// `with`, `only`, or empty / `active`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "active" => Ok(Visibility::Active),
            "with" | "with_trashed" => Ok(Visibility::WithTrashed),
            "only" | "only_trashed" => Ok(Visibility::OnlyTrashed),
            other => Err(DomainError::validation(format!(
                "unknown trashed scope '{other}' (expected 'with' or 'only')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_matches_scope() {
        let now = Some(Utc::now());
        assert!(Visibility::Active.admits(None));
        assert!(!Visibility::Active.admits(now));
        assert!(Visibility::WithTrashed.admits(None));
        assert!(Visibility::WithTrashed.admits(now));
        assert!(!Visibility::OnlyTrashed.admits(None));
        assert!(Visibility::OnlyTrashed.admits(now));
    }

    #[test]
    fn parses_trashed_query_values() {
        assert_eq!("with".parse::<Visibility>().unwrap(), Visibility::WithTrashed);
        assert_eq!("only".parse::<Visibility>().unwrap(), Visibility::OnlyTrashed);
        assert_eq!("".parse::<Visibility>().unwrap(), Visibility::Active);
        assert!("all".parse::<Visibility>().is_err());
    }

    #[test]
    fn sql_predicate_per_scope() {
        assert_eq!(Visibility::Active.sql_predicate("r").as_deref(), Some("r.deleted_at IS NULL"));
        assert_eq!(Visibility::WithTrashed.sql_predicate("r"), None);
    }
}
