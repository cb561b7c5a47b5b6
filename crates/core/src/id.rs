//! Strongly-typed record identifiers.
//!
//! Every persisted record uses a positive 64-bit integer key. The newtypes keep
//! a role id from being passed where a principal id is expected.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a principal (user account, actor identity).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(i64);

/// Identifier of a role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(i64);

/// Identifier of a permission record in the catalog.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(i64);

/// Identifier of an audit log row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLogId(i64);

macro_rules! impl_record_id {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw key. Validation happens at input boundaries (`FromStr`,
            /// bulk id parsing), not here.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::validation(format!("{}: {}", $name, e)))?;
                if raw <= 0 {
                    return Err(DomainError::validation(format!(
                        "{}: must be positive, got {raw}",
                        $name
                    )));
                }
                Ok(Self(raw))
            }
        }
    };
}

impl_record_id!(PrincipalId, "PrincipalId");
impl_record_id!(RoleId, "RoleId");
impl_record_id!(PermissionId, "PermissionId");
impl_record_id!(AuditLogId, "AuditLogId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_ids() {
        let id: RoleId = " 17 ".parse().unwrap();
        assert_eq!(id.get(), 17);
        assert_eq!(id.to_string(), "17");
    }

    #[test]
    fn rejects_non_positive_and_garbage() {
        assert!("0".parse::<PrincipalId>().is_err());
        assert!("-3".parse::<PrincipalId>().is_err());
        assert!("abc".parse::<PermissionId>().is_err());
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&AuditLogId::new(9)).unwrap();
        assert_eq!(json, "9");
    }
}
