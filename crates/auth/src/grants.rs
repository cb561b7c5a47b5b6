//! Storage contracts for grants (direct and role-derived).

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use gatehouse_core::{DomainResult, PermissionId, PrincipalId, RoleId, Slug};

use crate::{Permission, Role};

/// Read side of the grant model, consumed by the permission resolver.
///
/// Implementations must read current data on every call and apply the default
/// (active-only) visibility to roles and permissions: a trashed role or a
/// trashed permission grants nothing.
#[async_trait]
pub trait GrantSource: Send + Sync {
    /// Slugs granted directly to the principal.
    async fn fetch_direct_permission_slugs(
        &self,
        principal: PrincipalId,
    ) -> DomainResult<BTreeSet<Slug>>;

    /// The principal's roles, each with the slugs it grants.
    async fn fetch_role_slugs_and_their_permissions(
        &self,
        principal: PrincipalId,
    ) -> DomainResult<Vec<(Slug, BTreeSet<Slug>)>>;
}

#[async_trait]
impl<S> GrantSource for Arc<S>
where
    S: GrantSource + ?Sized,
{
    async fn fetch_direct_permission_slugs(
        &self,
        principal: PrincipalId,
    ) -> DomainResult<BTreeSet<Slug>> {
        (**self).fetch_direct_permission_slugs(principal).await
    }

    async fn fetch_role_slugs_and_their_permissions(
        &self,
        principal: PrincipalId,
    ) -> DomainResult<Vec<(Slug, BTreeSet<Slug>)>> {
        (**self).fetch_role_slugs_and_their_permissions(principal).await
    }
}

/// A membership change applied to a pivot table in one atomic operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantChange<I> {
    /// Add the given members, keeping existing ones.
    Attach(Vec<I>),
    /// Replace the membership with exactly the given members.
    Sync(Vec<I>),
    /// Remove the given members.
    Detach(Vec<I>),
}

impl<I> GrantChange<I> {
    pub fn members(&self) -> &[I] {
        match self {
            GrantChange::Attach(m) | GrantChange::Sync(m) | GrantChange::Detach(m) => m,
        }
    }

    /// Whether this change can widen what the target is granted.
    pub fn grants(&self) -> bool {
        !matches!(self, GrantChange::Detach(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            GrantChange::Attach(_) => "attach",
            GrantChange::Sync(_) => "sync",
            GrantChange::Detach(_) => "detach",
        }
    }

    pub fn with_members<J>(&self, members: Vec<J>) -> GrantChange<J> {
        match self {
            GrantChange::Attach(_) => GrantChange::Attach(members),
            GrantChange::Sync(_) => GrantChange::Sync(members),
            GrantChange::Detach(_) => GrantChange::Detach(members),
        }
    }
}

/// Write side of the grant model plus the lookups grant operations need.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Active catalog entries among `slugs` (unknown or trashed slugs are absent).
    async fn find_permissions_by_slugs(&self, slugs: &[Slug]) -> DomainResult<Vec<Permission>>;

    /// Active roles among `slugs`.
    async fn find_roles_by_slugs(&self, slugs: &[Slug]) -> DomainResult<Vec<Role>>;

    /// Active permission slugs granted by a role, sorted.
    async fn role_permission_slugs(&self, role: RoleId) -> DomainResult<Vec<Slug>>;

    /// Active permission slugs granted directly to a principal, sorted.
    async fn principal_permission_slugs(&self, principal: PrincipalId) -> DomainResult<Vec<Slug>>;

    /// Active role slugs the principal is a member of, sorted.
    async fn principal_role_slugs(&self, principal: PrincipalId) -> DomainResult<Vec<Slug>>;

    async fn apply_role_permissions(
        &self,
        role: RoleId,
        change: GrantChange<PermissionId>,
    ) -> DomainResult<()>;

    async fn apply_principal_permissions(
        &self,
        principal: PrincipalId,
        change: GrantChange<PermissionId>,
    ) -> DomainResult<()>;

    async fn apply_principal_roles(
        &self,
        principal: PrincipalId,
        change: GrantChange<RoleId>,
    ) -> DomainResult<()>;
}
