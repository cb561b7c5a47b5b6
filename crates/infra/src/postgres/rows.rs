// SQLx row types

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use sqlx::postgres::PgRow;

use gatehouse_audit::{AuditRecord, RequestMeta, as_json_object};
use gatehouse_auth::{Permission, Principal, Role};
use gatehouse_core::{AuditLogId, PermissionId, PrincipalId, RoleId, Slug};

pub(super) const USER_COLUMNS: &str =
    "t.id, t.email, t.password_hash, t.full_name, t.created_at, t.updated_at, t.deleted_at";
pub(super) const CATALOG_COLUMNS: &str = "t.id, t.name, t.slug, t.created_at, t.updated_at, t.deleted_at";
pub(super) const AUDIT_COLUMNS: &str = "t.id, t.actor_id, t.actor_email, t.action, t.resource_type, \
     t.resource_id, t.before, t.after, t.context, t.ip, t.user_agent, t.method, t.path, t.created_at";

pub(super) struct UserRow(pub Principal);

impl<'r> sqlx::FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow(Principal {
            id: PrincipalId::new(row.try_get("id")?),
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            full_name: row.try_get("full_name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        }))
    }
}

/// Roles and permissions share their column layout.
pub(super) struct CatalogRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for CatalogRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CatalogRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl From<CatalogRow> for Role {
    fn from(row: CatalogRow) -> Self {
        Role {
            id: RoleId::new(row.id),
            name: row.name,
            slug: Slug::new(row.slug),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

impl From<CatalogRow> for Permission {
    fn from(row: CatalogRow) -> Self {
        Permission {
            id: PermissionId::new(row.id),
            name: row.name,
            slug: Slug::new(row.slug),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

pub(super) struct AuditRow(pub AuditRecord);

impl<'r> sqlx::FromRow<'r, PgRow> for AuditRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let actor_id: Option<i64> = row.try_get("actor_id")?;
        let before: Option<Value> = row.try_get("before")?;
        let after: Option<Value> = row.try_get("after")?;
        let context: Option<Value> = row.try_get("context")?;

        Ok(AuditRow(AuditRecord {
            id: AuditLogId::new(row.try_get("id")?),
            actor_id: actor_id.map(PrincipalId::new),
            actor_email: row.try_get("actor_email")?,
            action: row.try_get("action")?,
            resource_type: row.try_get("resource_type")?,
            resource_id: row.try_get("resource_id")?,
            before: as_json_object(before),
            after: as_json_object(after),
            context: as_json_object(context),
            meta: RequestMeta {
                ip: row.try_get("ip")?,
                user_agent: row.try_get("user_agent")?,
                method: row.try_get("method")?,
                path: row.try_get("path")?,
            },
            created_at: row.try_get("created_at")?,
        }))
    }
}
