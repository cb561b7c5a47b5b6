//! Entity traits: identity plus the soft-delete marker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + Into<i64>;

    /// Table identity of this entity type.
    const KIND: EntityKind;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}

/// An entity with a nullable `deleted_at` timestamp.
///
/// `deleted_at == None` means active, `Some(_)` means trashed.
pub trait SoftDeletable: Entity {
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn is_trashed(&self) -> bool {
        self.deleted_at().is_some()
    }
}

/// Identity of a soft-deletable table.
///
/// The lifecycle manager is parameterized by this value instead of having
/// per-entity bulk helpers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Role,
    Permission,
}

impl EntityKind {
    /// Physical table name.
    pub const fn table(self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Role => "roles",
            EntityKind::Permission => "permissions",
        }
    }

    /// Resource type recorded in audit rows and error messages.
    pub const fn resource_type(self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Role => "Role",
            EntityKind::Permission => "Permission",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.resource_type())
    }
}
