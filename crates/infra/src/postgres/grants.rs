use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use sqlx::Row;
use tracing::{Span, instrument};

use gatehouse_auth::{GrantChange, GrantSource, GrantStore, Permission, Role};
use gatehouse_core::{DomainResult, PermissionId, PrincipalId, RoleId, Slug};

use super::rows::{CATALOG_COLUMNS, CatalogRow};
use super::{PostgresStore, map_sqlx_error};

/// A many-to-many pivot table.
struct Pivot {
    table: &'static str,
    owner: &'static str,
    member: &'static str,
}

const ROLE_PERMISSIONS: Pivot = Pivot {
    table: "role_permissions",
    owner: "role_id",
    member: "permission_id",
};
const USER_PERMISSIONS: Pivot = Pivot {
    table: "user_permissions",
    owner: "user_id",
    member: "permission_id",
};
const USER_ROLES: Pivot = Pivot {
    table: "user_roles",
    owner: "user_id",
    member: "role_id",
};

impl PostgresStore {
    /// Apply one membership change inside a single transaction.
    async fn apply_pivot(&self, pivot: &Pivot, owner: i64, change: GrantChange<i64>) -> DomainResult<()> {
        let Pivot { table, owner: owner_col, member: member_col } = pivot;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if let GrantChange::Sync(_) = change {
            sqlx::query(&format!("DELETE FROM {table} WHERE {owner_col} = $1"))
                .bind(owner)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("sync_clear", e))?;
        }

        match &change {
            GrantChange::Attach(members) | GrantChange::Sync(members) => {
                sqlx::query(&format!(
                    "INSERT INTO {table} ({owner_col}, {member_col}) \
                     SELECT $1, m FROM UNNEST($2::BIGINT[]) AS m \
                     ON CONFLICT DO NOTHING"
                ))
                .bind(owner)
                .bind(members)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("attach_members", e))?;
            }
            GrantChange::Detach(members) => {
                sqlx::query(&format!(
                    "DELETE FROM {table} WHERE {owner_col} = $1 AND {member_col} = ANY($2)"
                ))
                .bind(owner)
                .bind(members)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("detach_members", e))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn active_catalog_by_slugs(&self, table: &'static str, slugs: &[Slug]) -> DomainResult<Vec<CatalogRow>> {
        let slugs: Vec<&str> = slugs.iter().map(Slug::as_str).collect();
        sqlx::query_as::<_, CatalogRow>(&format!(
            "SELECT {CATALOG_COLUMNS} FROM {table} t WHERE t.slug = ANY($1) AND t.deleted_at IS NULL ORDER BY t.slug"
        ))
        .bind(&slugs)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_slugs", e))
    }

    async fn fetch_slugs(&self, sql: &str, id: i64, operation: &str) -> DomainResult<Vec<Slug>> {
        let slugs: Vec<String> = sqlx::query_scalar(sql)
            .bind(id)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(slugs.into_iter().map(Slug::new).collect())
    }
}

fn ids<I: Copy + Into<i64>>(change: GrantChange<I>) -> GrantChange<i64> {
    let members = change.members().iter().map(|m| (*m).into()).collect();
    change.with_members(members)
}

const DIRECT_SLUGS_SQL: &str = r#"
    SELECT p.slug
    FROM user_permissions up
    JOIN permissions p ON p.id = up.permission_id AND p.deleted_at IS NULL
    WHERE up.user_id = $1
    ORDER BY p.slug
"#;

const ROLE_SLUGS_SQL: &str = r#"
    SELECT p.slug
    FROM role_permissions rp
    JOIN permissions p ON p.id = rp.permission_id AND p.deleted_at IS NULL
    WHERE rp.role_id = $1
    ORDER BY p.slug
"#;

const MEMBER_ROLE_SLUGS_SQL: &str = r#"
    SELECT r.slug
    FROM user_roles ur
    JOIN roles r ON r.id = ur.role_id AND r.deleted_at IS NULL
    WHERE ur.user_id = $1
    ORDER BY r.slug
"#;

#[async_trait]
impl GrantSource for PostgresStore {
    #[instrument(skip(self), fields(operation = tracing::field::Empty), err)]
    async fn fetch_direct_permission_slugs(&self, principal: PrincipalId) -> DomainResult<BTreeSet<Slug>> {
        Span::current().record("operation", "fetch_direct_permission_slugs");
        let slugs = self
            .fetch_slugs(DIRECT_SLUGS_SQL, principal.get(), "fetch_direct_permission_slugs")
            .await?;
        Ok(slugs.into_iter().collect())
    }

    #[instrument(skip(self), fields(operation = tracing::field::Empty, role_count = tracing::field::Empty), err)]
    async fn fetch_role_slugs_and_their_permissions(
        &self,
        principal: PrincipalId,
    ) -> DomainResult<Vec<(Slug, BTreeSet<Slug>)>> {
        let span = Span::current();
        span.record("operation", "fetch_role_slugs_and_their_permissions");

        let rows = sqlx::query(
            r#"
            SELECT r.slug AS role_slug, p.slug AS permission_slug
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id AND r.deleted_at IS NULL
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id AND p.deleted_at IS NULL
            WHERE ur.user_id = $1
            "#,
        )
        .bind(principal.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_role_slugs_and_their_permissions", e))?;

        let mut roles: BTreeMap<String, BTreeSet<Slug>> = BTreeMap::new();
        for row in rows {
            let role: String = row
                .try_get("role_slug")
                .map_err(|e| map_sqlx_error("decode_role_slug", e))?;
            let permission: Option<String> = row
                .try_get("permission_slug")
                .map_err(|e| map_sqlx_error("decode_permission_slug", e))?;
            let granted = roles.entry(role).or_default();
            if let Some(permission) = permission {
                granted.insert(Slug::new(permission));
            }
        }

        span.record("role_count", roles.len());
        Ok(roles.into_iter().map(|(role, granted)| (Slug::new(role), granted)).collect())
    }
}

#[async_trait]
impl GrantStore for PostgresStore {
    #[instrument(skip(self, slugs), fields(requested = slugs.len()), err)]
    async fn find_permissions_by_slugs(&self, slugs: &[Slug]) -> DomainResult<Vec<Permission>> {
        let rows = self.active_catalog_by_slugs("permissions", slugs).await?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    #[instrument(skip(self, slugs), fields(requested = slugs.len()), err)]
    async fn find_roles_by_slugs(&self, slugs: &[Slug]) -> DomainResult<Vec<Role>> {
        let rows = self.active_catalog_by_slugs("roles", slugs).await?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn role_permission_slugs(&self, role: RoleId) -> DomainResult<Vec<Slug>> {
        self.fetch_slugs(ROLE_SLUGS_SQL, role.get(), "role_permission_slugs").await
    }

    #[instrument(skip(self), err)]
    async fn principal_permission_slugs(&self, principal: PrincipalId) -> DomainResult<Vec<Slug>> {
        self.fetch_slugs(DIRECT_SLUGS_SQL, principal.get(), "principal_permission_slugs")
            .await
    }

    #[instrument(skip(self), err)]
    async fn principal_role_slugs(&self, principal: PrincipalId) -> DomainResult<Vec<Slug>> {
        self.fetch_slugs(MEMBER_ROLE_SLUGS_SQL, principal.get(), "principal_role_slugs")
            .await
    }

    #[instrument(skip(self, change), fields(change = change.label(), members = change.members().len()), err)]
    async fn apply_role_permissions(
        &self,
        role: RoleId,
        change: GrantChange<PermissionId>,
    ) -> DomainResult<()> {
        self.apply_pivot(&ROLE_PERMISSIONS, role.get(), ids(change)).await
    }

    #[instrument(skip(self, change), fields(change = change.label(), members = change.members().len()), err)]
    async fn apply_principal_permissions(
        &self,
        principal: PrincipalId,
        change: GrantChange<PermissionId>,
    ) -> DomainResult<()> {
        self.apply_pivot(&USER_PERMISSIONS, principal.get(), ids(change)).await
    }

    #[instrument(skip(self, change), fields(change = change.label(), members = change.members().len()), err)]
    async fn apply_principal_roles(
        &self,
        principal: PrincipalId,
        change: GrantChange<RoleId>,
    ) -> DomainResult<()> {
        self.apply_pivot(&USER_ROLES, principal.get(), ids(change)).await
    }
}
