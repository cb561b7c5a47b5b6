//! `gatehouse-lifecycle` — the soft-delete lifecycle shared by users, roles
//! and permissions.
//!
//! States: `Active ⇄ Trashed → Purged`. One manager serves every
//! soft-deletable entity; the entity is selected by its [`EntityKind`].
//!
//! [`EntityKind`]: gatehouse_core::EntityKind

pub mod bulk;
pub mod manager;
pub mod store;

pub use bulk::BulkIds;
pub use manager::LifecycleManager;
pub use store::{RowState, SoftDeleteStore, TrashedField};
