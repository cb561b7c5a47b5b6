//! Idempotent installation of the default catalog and the admin role.

use serde::Serialize;
use tracing::{info, instrument, warn};

use gatehouse_auth::catalog::DEFAULT_PERMISSIONS;
use gatehouse_auth::catalog::users;
use gatehouse_auth::{DirectoryQuery, GrantChange, NewPermission, NewPrincipal, NewRole, Permission, PermissionSort};
use gatehouse_core::{DomainError, DomainResult, PageRequest, PrincipalId, RoleId, Slug};

use crate::service::Backend;

pub const ADMIN_ROLE: Slug = Slug::from_static("admin");
pub const USER_ROLE: Slug = Slug::from_static("user");

/// What the `user` role is guaranteed to hold.
const USER_ROLE_GRANTS: [Slug; 2] = [users::LIST, users::READ];

/// What a seeding run changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub permissions_created: usize,
    pub admin_role: RoleId,
    pub admin_role_created: bool,
    pub user_role: RoleId,
    pub admin_user: Option<PrincipalId>,
}

/// Install the default permissions, an `admin` role granting the whole active
/// catalog, a `user` role with read access to users and, when `admin` is
/// given, an account holding the `admin` role. Running it again only fills in
/// what is missing; permissions added since the last run are granted to
/// `admin` too.
#[instrument(skip(store, admin), err)]
pub async fn seed_defaults<B: Backend>(store: &B, admin: Option<NewPrincipal>) -> DomainResult<SeedReport> {
    let wanted: Vec<Slug> = DEFAULT_PERMISSIONS.iter().map(|(_, slug)| slug.clone()).collect();
    let mut catalog = store.find_permissions_by_slugs(&wanted).await?;

    let mut permissions_created = 0;
    for (name, slug) in DEFAULT_PERMISSIONS {
        if catalog.iter().any(|p| p.slug == *slug) {
            continue;
        }
        let input = NewPermission {
            name: (*name).to_owned(),
            slug: slug.clone(),
        };
        match store.create_permission(input).await {
            Ok(permission) => {
                permissions_created += 1;
                catalog.push(permission);
            }
            // A trashed row still owns the slug; leave it trashed.
            Err(DomainError::Conflict(_)) => warn!(%slug, "default permission exists in trash, skipped"),
            Err(err) => return Err(err),
        }
    }

    let (admin_role, admin_role_created) = ensure_role(store, "Administrator", ADMIN_ROLE).await?;
    let (user_role, _) = ensure_role(store, "User", USER_ROLE).await?;

    let everything = active_catalog(store).await?;
    store
        .apply_role_permissions(admin_role, GrantChange::Sync(everything.iter().map(|p| p.id).collect()))
        .await?;
    let basics = everything
        .iter()
        .filter(|p| USER_ROLE_GRANTS.contains(&p.slug))
        .map(|p| p.id)
        .collect();
    store
        .apply_role_permissions(user_role, GrantChange::Attach(basics))
        .await?;

    let admin_user = match admin {
        None => None,
        Some(account) => {
            let email = account.email.clone();
            match store.create_user(account).await {
                Ok(user) => {
                    store
                        .apply_principal_roles(user.id, GrantChange::Attach(vec![admin_role]))
                        .await?;
                    Some(user.id)
                }
                Err(DomainError::Conflict(_)) => {
                    info!(%email, "admin account already exists");
                    None
                }
                Err(err) => return Err(err),
            }
        }
    };

    Ok(SeedReport {
        permissions_created,
        admin_role,
        admin_role_created,
        user_role,
        admin_user,
    })
}

/// Find the active role with `slug`, creating it when absent.
async fn ensure_role<B: Backend>(store: &B, name: &str, slug: Slug) -> DomainResult<(RoleId, bool)> {
    let existing = store.find_roles_by_slugs(std::slice::from_ref(&slug)).await?;
    if let Some(role) = existing.into_iter().next() {
        return Ok((role.id, false));
    }
    let role = store
        .create_role(NewRole {
            name: name.to_owned(),
            slug,
        })
        .await?;
    Ok((role.id, true))
}

/// Every active permission, page by page.
async fn active_catalog<B: Backend>(store: &B) -> DomainResult<Vec<Permission>> {
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let query = DirectoryQuery::<PermissionSort> {
            page: PageRequest::new(Some(page), Some(PageRequest::MAX_LIMIT)),
            ..Default::default()
        };
        let batch = store.list_permissions(&query).await?;
        let done = batch.items.is_empty() || page >= batch.meta.last_page;
        all.extend(batch.items);
        if done {
            return Ok(all);
        }
        page += 1;
    }
}
