//! Directory repositories for principals, roles and the permission catalog.
//!
//! Every read takes an explicit `Visibility`; callers that do not care pass
//! `Visibility::default()` (active only).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gatehouse_core::{
    DomainResult, Page, PageRequest, PermissionId, PrincipalId, RoleId, SortOrder, Visibility,
};

use crate::{
    NewPermission, NewPrincipal, NewRole, Permission, PermissionChanges, Principal,
    PrincipalChanges, Role, RoleChanges,
};

/// Listing parameters shared by the directory listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryQuery<S> {
    /// Case-insensitive substring filter.
    pub search: Option<String>,
    pub sort: S,
    pub order: SortOrder,
    pub page: PageRequest,
    pub visibility: Visibility,
}

impl<S: Default> Default for DirectoryQuery<S> {
    fn default() -> Self {
        Self {
            search: None,
            sort: S::default(),
            order: SortOrder::default(),
            page: PageRequest::default(),
            visibility: Visibility::default(),
        }
    }
}

impl<S> DirectoryQuery<S> {
    /// Trimmed, non-empty, lowercased search term.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

macro_rules! sort_enum {
    ($name:ident { $($variant:ident => ($key:literal, $column:literal)),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            #[default]
            CreatedAt,
            $($variant),+
        }

        impl $name {
            /// Unknown keys fall back to `createdAt`.
            pub fn parse_lenient(raw: &str) -> Self {
                match raw.trim() {
                    $($key => Self::$variant,)+
                    _ => Self::CreatedAt,
                }
            }

            pub fn column(self) -> &'static str {
                match self {
                    Self::CreatedAt => "created_at",
                    $(Self::$variant => $column),+
                }
            }
        }
    };
}

sort_enum!(UserSort { Email => ("email", "email"), FullName => ("fullName", "full_name") });
sort_enum!(RoleSort { Name => ("name", "name"), Slug => ("slug", "slug") });
sort_enum!(PermissionSort { Name => ("name", "name"), Slug => ("slug", "slug") });

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fails with `Conflict` when the email is taken (trashed rows included).
    async fn create_user(&self, input: NewPrincipal) -> DomainResult<Principal>;

    /// Updates an active principal; `NotFound` otherwise.
    async fn update_user(&self, id: PrincipalId, changes: PrincipalChanges) -> DomainResult<Principal>;

    async fn find_user(&self, id: PrincipalId, visibility: Visibility) -> DomainResult<Option<Principal>>;

    async fn list_users(&self, query: &DirectoryQuery<UserSort>) -> DomainResult<Page<Principal>>;
}

#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn create_role(&self, input: NewRole) -> DomainResult<Role>;

    async fn update_role(&self, id: RoleId, changes: RoleChanges) -> DomainResult<Role>;

    async fn find_role(&self, id: RoleId, visibility: Visibility) -> DomainResult<Option<Role>>;

    async fn list_roles(&self, query: &DirectoryQuery<RoleSort>) -> DomainResult<Page<Role>>;
}

#[async_trait]
pub trait PermissionCatalog: Send + Sync {
    async fn create_permission(&self, input: NewPermission) -> DomainResult<Permission>;

    async fn update_permission(
        &self,
        id: PermissionId,
        changes: PermissionChanges,
    ) -> DomainResult<Permission>;

    async fn find_permission(
        &self,
        id: PermissionId,
        visibility: Visibility,
    ) -> DomainResult<Option<Permission>>;

    async fn list_permissions(
        &self,
        query: &DirectoryQuery<PermissionSort>,
    ) -> DomainResult<Page<Permission>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_keys_parse_leniently() {
        assert_eq!(UserSort::parse_lenient("fullName"), UserSort::FullName);
        assert_eq!(UserSort::parse_lenient("password"), UserSort::CreatedAt);
        assert_eq!(RoleSort::parse_lenient("slug").column(), "slug");
    }

    #[test]
    fn blank_search_is_ignored() {
        let q = DirectoryQuery::<RoleSort> {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(q.search_term(), None);

        let q = DirectoryQuery::<RoleSort> {
            search: Some(" Edit ".into()),
            ..Default::default()
        };
        assert_eq!(q.search_term().as_deref(), Some("edit"));
    }
}
