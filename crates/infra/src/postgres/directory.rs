use async_trait::async_trait;
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::{Span, instrument};

use gatehouse_auth::{
    DirectoryQuery, NewPermission, NewPrincipal, NewRole, Permission, PermissionCatalog,
    PermissionChanges, PermissionSort, Principal, PrincipalChanges, Role, RoleChanges,
    RoleDirectory, RoleSort, UserDirectory, UserSort,
};
use gatehouse_core::{DomainError, DomainResult, Page, PermissionId, PrincipalId, RoleId, Visibility};

use super::rows::{CATALOG_COLUMNS, CatalogRow, USER_COLUMNS, UserRow};
use super::{PostgresStore, map_sqlx_error, push_search, push_visibility};

/// Which table a listing reads and how its rows are searched.
struct Listing {
    table: &'static str,
    columns: &'static str,
    searchable: &'static [&'static str],
}

const USERS: Listing = Listing {
    table: "users",
    columns: USER_COLUMNS,
    searchable: &["t.email", "t.full_name"],
};
const ROLES: Listing = Listing {
    table: "roles",
    columns: CATALOG_COLUMNS,
    searchable: &["t.name", "t.slug"],
};
const PERMISSIONS: Listing = Listing {
    table: "permissions",
    columns: CATALOG_COLUMNS,
    searchable: &["t.name", "t.slug"],
};

impl PostgresStore {
    /// Count and fetch one page; rows are decoded as `R`.
    async fn list_page<S, R>(
        &self,
        listing: &Listing,
        query: &DirectoryQuery<S>,
        sort_column: &str,
    ) -> DomainResult<(Vec<R>, u64)>
    where
        S: Sync,
        R: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let term = query.search_term();

        let mut count = QueryBuilder::<Postgres>::new(format!(
            "SELECT COUNT(*) FROM {} t WHERE 1=1",
            listing.table
        ));
        push_visibility(&mut count, query.visibility);
        push_search(&mut count, term.as_deref(), listing.searchable);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_rows", e))?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {} t WHERE 1=1",
            listing.columns, listing.table
        ));
        push_visibility(&mut select, query.visibility);
        push_search(&mut select, term.as_deref(), listing.searchable);
        let order = query.order.as_sql();
        select
            .push(format!(" ORDER BY t.{sort_column} {order}, t.id {order} LIMIT "))
            .push_bind(i64::from(query.page.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.page.offset()).unwrap_or(i64::MAX));

        let rows = select
            .build_query_as::<R>()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_rows", e))?;

        Ok((rows, u64::try_from(total).unwrap_or(0)))
    }

    async fn find_catalog_row(
        &self,
        table: &'static str,
        id: i64,
        visibility: Visibility,
    ) -> DomainResult<Option<CatalogRow>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {CATALOG_COLUMNS} FROM {table} t WHERE t.id = "
        ));
        qb.push_bind(id);
        push_visibility(&mut qb, visibility);
        qb.build_query_as::<CatalogRow>()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_row", e))
    }

    async fn insert_catalog_row(&self, table: &'static str, name: &str, slug: &str) -> DomainResult<CatalogRow> {
        sqlx::query_as::<_, CatalogRow>(&format!(
            "INSERT INTO {table} AS t (name, slug) VALUES ($1, $2) RETURNING {CATALOG_COLUMNS}"
        ))
        .bind(name)
        .bind(slug)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_row", e))
    }

    async fn update_catalog_row(
        &self,
        table: &'static str,
        entity: &'static str,
        id: i64,
        name: Option<&str>,
        slug: Option<&str>,
    ) -> DomainResult<CatalogRow> {
        sqlx::query_as::<_, CatalogRow>(&format!(
            r#"
            UPDATE {table} AS t
            SET name = COALESCE($2, t.name),
                slug = COALESCE($3, t.slug),
                updated_at = now()
            WHERE t.id = $1 AND t.deleted_at IS NULL
            RETURNING {CATALOG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(slug)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_row", e))?
        .ok_or_else(|| DomainError::not_found(entity, id))
    }
}

#[async_trait]
impl UserDirectory for PostgresStore {
    #[instrument(skip(self, input), fields(operation = tracing::field::Empty), err)]
    async fn create_user(&self, input: NewPrincipal) -> DomainResult<Principal> {
        Span::current().record("operation", "create_user");
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users AS t (email, password_hash, full_name) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.full_name)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;
        Ok(row.0)
    }

    #[instrument(skip(self, changes), fields(user_id = %id), err)]
    async fn update_user(&self, id: PrincipalId, changes: PrincipalChanges) -> DomainResult<Principal> {
        let (set_name, full_name) = match changes.full_name {
            Some(name) => (true, name),
            None => (false, None),
        };
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users AS t
            SET email = COALESCE($2, t.email),
                password_hash = COALESCE($3, t.password_hash),
                full_name = CASE WHEN $4 THEN $5 ELSE t.full_name END,
                updated_at = now()
            WHERE t.id = $1 AND t.deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .bind(set_name)
        .bind(full_name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?
        .ok_or_else(|| DomainError::not_found("User", id))?;
        Ok(row.0)
    }

    #[instrument(skip(self), err)]
    async fn find_user(&self, id: PrincipalId, visibility: Visibility) -> DomainResult<Option<Principal>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users t WHERE t.id = "));
        qb.push_bind(id.get());
        push_visibility(&mut qb, visibility);
        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;
        Ok(row.map(|r| r.0))
    }

    #[instrument(skip(self, query), err)]
    async fn list_users(&self, query: &DirectoryQuery<UserSort>) -> DomainResult<Page<Principal>> {
        let (rows, total) = self
            .list_page::<_, UserRow>(&USERS, query, query.sort.column())
            .await?;
        Ok(Page::new(rows.into_iter().map(|r| r.0).collect(), total, query.page))
    }
}

#[async_trait]
impl RoleDirectory for PostgresStore {
    #[instrument(skip(self, input), fields(slug = %input.slug), err)]
    async fn create_role(&self, input: NewRole) -> DomainResult<Role> {
        Ok(self.insert_catalog_row("roles", &input.name, input.slug.as_str()).await?.into())
    }

    #[instrument(skip(self, changes), fields(role_id = %id), err)]
    async fn update_role(&self, id: RoleId, changes: RoleChanges) -> DomainResult<Role> {
        let row = self
            .update_catalog_row(
                "roles",
                "Role",
                id.get(),
                changes.name.as_deref(),
                changes.slug.as_ref().map(|s| s.as_str()),
            )
            .await?;
        Ok(row.into())
    }

    #[instrument(skip(self), err)]
    async fn find_role(&self, id: RoleId, visibility: Visibility) -> DomainResult<Option<Role>> {
        Ok(self
            .find_catalog_row("roles", id.get(), visibility)
            .await?
            .map(Role::from))
    }

    #[instrument(skip(self, query), err)]
    async fn list_roles(&self, query: &DirectoryQuery<RoleSort>) -> DomainResult<Page<Role>> {
        let (rows, total) = self
            .list_page::<_, CatalogRow>(&ROLES, query, query.sort.column())
            .await?;
        Ok(Page::new(rows.into_iter().map(Role::from).collect(), total, query.page))
    }
}

#[async_trait]
impl PermissionCatalog for PostgresStore {
    #[instrument(skip(self, input), fields(slug = %input.slug), err)]
    async fn create_permission(&self, input: NewPermission) -> DomainResult<Permission> {
        Ok(self
            .insert_catalog_row("permissions", &input.name, input.slug.as_str())
            .await?
            .into())
    }

    #[instrument(skip(self, changes), fields(permission_id = %id), err)]
    async fn update_permission(
        &self,
        id: PermissionId,
        changes: PermissionChanges,
    ) -> DomainResult<Permission> {
        let row = self
            .update_catalog_row(
                "permissions",
                "Permission",
                id.get(),
                changes.name.as_deref(),
                changes.slug.as_ref().map(|s| s.as_str()),
            )
            .await?;
        Ok(row.into())
    }

    #[instrument(skip(self), err)]
    async fn find_permission(
        &self,
        id: PermissionId,
        visibility: Visibility,
    ) -> DomainResult<Option<Permission>> {
        Ok(self
            .find_catalog_row("permissions", id.get(), visibility)
            .await?
            .map(Permission::from))
    }

    #[instrument(skip(self, query), err)]
    async fn list_permissions(
        &self,
        query: &DirectoryQuery<PermissionSort>,
    ) -> DomainResult<Page<Permission>> {
        let (rows, total) = self
            .list_page::<_, CatalogRow>(&PERMISSIONS, query, query.sort.column())
            .await?;
        Ok(Page::new(
            rows.into_iter().map(Permission::from).collect(),
            total,
            query.page,
        ))
    }
}
