//! Error model shared by every gatehouse crate.

use thiserror::Error;

/// Result type used across the access-control layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Failure of an administrative or access-control operation.
///
/// Everything here propagates synchronously to the caller. Audit write
/// failures are deliberately *not* part of this enum: they travel on an
/// out-of-band reporting path (see `gatehouse-audit`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input, rejected before any storage access.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The entity does not exist (or is hidden by the requested visibility).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Authorization denial. Never names the missing slugs.
    #[error("insufficient permissions to access this resource")]
    InsufficientPermission,

    /// The caller tried to grant permissions it does not hold itself.
    #[error("cannot grant permissions you do not possess: {}", .disallowed.join(", "))]
    GrantEscalation { disallowed: Vec<String> },

    /// Requested permission slugs are not in the catalog.
    #[error("grant targets not found: {}", .missing.join(", "))]
    GrantTargetNotFound { missing: Vec<String> },

    /// A uniqueness constraint was violated (email, slug).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The storage adapter failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether the error is safe to retry (only storage failures are).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_permission_message_is_generic() {
        let msg = DomainError::InsufficientPermission.to_string();
        assert_eq!(msg, "insufficient permissions to access this resource");
    }

    #[test]
    fn escalation_discloses_slugs() {
        let err = DomainError::GrantEscalation {
            disallowed: vec!["roles.delete".into(), "users.delete".into()],
        };
        assert!(err.to_string().contains("roles.delete, users.delete"));
    }

    #[test]
    fn not_found_names_entity_and_id() {
        let err = DomainError::not_found("Role", 42);
        assert_eq!(err.to_string(), "Role not found: 42");
        assert!(!err.is_transient());
    }
}
