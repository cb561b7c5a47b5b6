use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gatehouse_core::{DomainError, DomainResult, Entity, EntityKind, PrincipalId, SoftDeletable};

/// A user account: the identity that authenticates and acts.
///
/// The password hash is produced by the host's credential layer and is never
/// serialized, so it cannot leak into audit snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn actor_ref(&self) -> ActorRef {
        ActorRef {
            id: self.id,
            email: self.email.clone(),
        }
    }
}

impl Entity for Principal {
    type Id = PrincipalId;
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> PrincipalId {
        self.id
    }
}

impl SoftDeletable for Principal {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// The acting principal as recorded in audit rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: PrincipalId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrincipal {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
}

impl NewPrincipal {
    pub fn new(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        full_name: Option<String>,
    ) -> DomainResult<Self> {
        let email = normalize_email(email.into())?;
        let password_hash = password_hash.into();
        if password_hash.is_empty() {
            return Err(DomainError::validation("password hash must not be empty"));
        }
        Ok(Self {
            email,
            password_hash,
            full_name,
        })
    }
}

/// Partial update of an account. `full_name: Some(None)` clears the name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub full_name: Option<Option<String>>,
}

impl PrincipalChanges {
    pub fn validate(mut self) -> DomainResult<Self> {
        if let Some(email) = self.email.take() {
            self.email = Some(normalize_email(email)?);
        }
        if matches!(self.password_hash.as_deref(), Some("")) {
            return Err(DomainError::validation("password hash must not be empty"));
        }
        Ok(self)
    }
}

fn normalize_email(email: String) -> DomainResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(DomainError::validation(format!("invalid email address '{email}'"))),
    }
}
