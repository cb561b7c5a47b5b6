use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gatehouse_core::{DomainError, DomainResult, Entity, EntityKind, PermissionId, Slug, SoftDeletable};

/// A permission record from the catalog.
///
/// `slug` is what grants and checks compare; `name` is display-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub slug: Slug,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Permission {
    type Id = PermissionId;
    const KIND: EntityKind = EntityKind::Permission;

    fn id(&self) -> PermissionId {
        self.id
    }
}

impl SoftDeletable for Permission {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// Input for creating a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPermission {
    pub name: String,
    pub slug: Slug,
}

impl NewPermission {
    pub fn new(name: impl Into<String>, slug: &str) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("permission name must not be empty"));
        }
        Ok(Self {
            name,
            slug: Slug::parse(slug.to_string())?,
        })
    }
}

/// Partial update of a catalog entry; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionChanges {
    pub name: Option<String>,
    pub slug: Option<Slug>,
}
