use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gatehouse_core::{DomainError, DomainResult, Entity, EntityKind, RoleId, Slug, SoftDeletable};

/// A named bundle of permissions that principals can be members of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub slug: Slug,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Role {
    type Id = RoleId;
    const KIND: EntityKind = EntityKind::Role;

    fn id(&self) -> RoleId {
        self.id
    }
}

impl SoftDeletable for Role {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub slug: Slug,
}

impl NewRole {
    pub fn new(name: impl Into<String>, slug: &str) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("role name must not be empty"));
        }
        Ok(Self {
            name,
            slug: Slug::parse(slug.to_string())?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub slug: Option<Slug>,
}
