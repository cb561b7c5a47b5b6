//! `gatehouse-core` — shared building blocks for the identity backend.
//!
//! This crate contains **pure** primitives (no storage or transport concerns):
//! identifiers, the error taxonomy, soft-delete visibility and listing types.

pub mod entity;
pub mod error;
pub mod id;
pub mod listing;
pub mod slug;
pub mod visibility;

pub use entity::{Entity, EntityKind, SoftDeletable};
pub use error::{DomainError, DomainResult};
pub use id::{AuditLogId, PermissionId, PrincipalId, RoleId};
pub use listing::{Page, PageMeta, PageRequest, SortOrder};
pub use slug::Slug;
pub use visibility::Visibility;
