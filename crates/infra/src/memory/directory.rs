use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::Utc;

use gatehouse_auth::{
    DirectoryQuery, NewPermission, NewPrincipal, NewRole, Permission, PermissionCatalog,
    PermissionChanges, PermissionSort, Principal, PrincipalChanges, Role, RoleChanges,
    RoleDirectory, RoleSort, UserDirectory, UserSort,
};
use gatehouse_core::{
    DomainError, DomainResult, Page, PermissionId, PrincipalId, RoleId, SortOrder, Visibility,
};

use super::InMemoryStore;

fn contains_ci(field: Option<&str>, term: &str) -> bool {
    field.is_some_and(|f| f.to_lowercase().contains(term))
}

/// Filter by scope and search, sort, then slice one page.
fn page_of<T, S, F, C>(
    rows: impl Iterator<Item = T>,
    query: &DirectoryQuery<S>,
    deleted_at: F,
    searchable: impl Fn(&T) -> [Option<&str>; 2],
    compare: C,
) -> Page<T>
where
    S: Copy,
    F: Fn(&T) -> Option<chrono::DateTime<Utc>>,
    C: Fn(S, &T, &T) -> Ordering,
{
    let term = query.search_term();
    let mut matched: Vec<T> = rows
        .filter(|row| query.visibility.admits(deleted_at(row)))
        .filter(|row| match &term {
            Some(term) => searchable(row).into_iter().any(|f| contains_ci(f, term)),
            None => true,
        })
        .collect();

    matched.sort_by(|a, b| {
        let ord = compare(query.sort, a, b);
        match query.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
    Page::from_sorted(matched, query.page)
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn create_user(&self, input: NewPrincipal) -> DomainResult<Principal> {
        let mut t = self.write()?;
        if t.users.values().any(|u| u.email == input.email) {
            return Err(DomainError::conflict(format!("email '{}' is already taken", input.email)));
        }
        let id = t.next_id("users");
        let user = Principal {
            id: PrincipalId::new(id),
            email: input.email,
            password_hash: input.password_hash,
            full_name: input.full_name,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        };
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: PrincipalId, changes: PrincipalChanges) -> DomainResult<Principal> {
        let mut t = self.write()?;
        if let Some(email) = &changes.email {
            if t.users.values().any(|u| u.email == *email && u.id != id) {
                return Err(DomainError::conflict(format!("email '{email}' is already taken")));
            }
        }
        let user = t
            .users
            .get_mut(&id.get())
            .filter(|u| u.deleted_at.is_none())
            .ok_or_else(|| DomainError::not_found("User", id))?;

        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name;
        }
        user.updated_at = Some(Utc::now());
        Ok(user.clone())
    }

    async fn find_user(&self, id: PrincipalId, visibility: Visibility) -> DomainResult<Option<Principal>> {
        let t = self.read()?;
        Ok(t.users
            .get(&id.get())
            .filter(|u| visibility.admits(u.deleted_at))
            .cloned())
    }

    async fn list_users(&self, query: &DirectoryQuery<UserSort>) -> DomainResult<Page<Principal>> {
        let t = self.read()?;
        Ok(page_of(
            t.users.values().cloned(),
            query,
            |u| u.deleted_at,
            |u| [Some(u.email.as_str()), u.full_name.as_deref()],
            |sort, a, b| {
                let primary = match sort {
                    UserSort::CreatedAt => a.created_at.cmp(&b.created_at),
                    UserSort::Email => a.email.cmp(&b.email),
                    UserSort::FullName => a.full_name.cmp(&b.full_name),
                };
                primary.then_with(|| a.id.cmp(&b.id))
            },
        ))
    }
}

#[async_trait]
impl RoleDirectory for InMemoryStore {
    async fn create_role(&self, input: NewRole) -> DomainResult<Role> {
        let mut t = self.write()?;
        if t.roles.values().any(|r| r.slug == input.slug) {
            return Err(DomainError::conflict(format!("role slug '{}' is already taken", input.slug)));
        }
        let id = t.next_id("roles");
        let role = Role {
            id: RoleId::new(id),
            name: input.name,
            slug: input.slug,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        };
        t.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: RoleId, changes: RoleChanges) -> DomainResult<Role> {
        let mut t = self.write()?;
        if let Some(slug) = &changes.slug {
            if t.roles.values().any(|r| r.slug == *slug && r.id != id) {
                return Err(DomainError::conflict(format!("role slug '{slug}' is already taken")));
            }
        }
        let role = t
            .roles
            .get_mut(&id.get())
            .filter(|r| r.deleted_at.is_none())
            .ok_or_else(|| DomainError::not_found("Role", id))?;

        if let Some(name) = changes.name {
            role.name = name;
        }
        if let Some(slug) = changes.slug {
            role.slug = slug;
        }
        role.updated_at = Some(Utc::now());
        Ok(role.clone())
    }

    async fn find_role(&self, id: RoleId, visibility: Visibility) -> DomainResult<Option<Role>> {
        let t = self.read()?;
        Ok(t.roles
            .get(&id.get())
            .filter(|r| visibility.admits(r.deleted_at))
            .cloned())
    }

    async fn list_roles(&self, query: &DirectoryQuery<RoleSort>) -> DomainResult<Page<Role>> {
        let t = self.read()?;
        Ok(page_of(
            t.roles.values().cloned(),
            query,
            |r| r.deleted_at,
            |r| [Some(r.name.as_str()), Some(r.slug.as_str())],
            |sort, a, b| {
                let primary = match sort {
                    RoleSort::CreatedAt => a.created_at.cmp(&b.created_at),
                    RoleSort::Name => a.name.cmp(&b.name),
                    RoleSort::Slug => a.slug.cmp(&b.slug),
                };
                primary.then_with(|| a.id.cmp(&b.id))
            },
        ))
    }
}

#[async_trait]
impl PermissionCatalog for InMemoryStore {
    async fn create_permission(&self, input: NewPermission) -> DomainResult<Permission> {
        let mut t = self.write()?;
        if t.permissions.values().any(|p| p.slug == input.slug) {
            return Err(DomainError::conflict(format!(
                "permission slug '{}' is already taken",
                input.slug
            )));
        }
        let id = t.next_id("permissions");
        let permission = Permission {
            id: PermissionId::new(id),
            name: input.name,
            slug: input.slug,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        };
        t.permissions.insert(id, permission.clone());
        Ok(permission)
    }

    async fn update_permission(
        &self,
        id: PermissionId,
        changes: PermissionChanges,
    ) -> DomainResult<Permission> {
        let mut t = self.write()?;
        if let Some(slug) = &changes.slug {
            if t.permissions.values().any(|p| p.slug == *slug && p.id != id) {
                return Err(DomainError::conflict(format!("permission slug '{slug}' is already taken")));
            }
        }
        let permission = t
            .permissions
            .get_mut(&id.get())
            .filter(|p| p.deleted_at.is_none())
            .ok_or_else(|| DomainError::not_found("Permission", id))?;

        if let Some(name) = changes.name {
            permission.name = name;
        }
        if let Some(slug) = changes.slug {
            permission.slug = slug;
        }
        permission.updated_at = Some(Utc::now());
        Ok(permission.clone())
    }

    async fn find_permission(
        &self,
        id: PermissionId,
        visibility: Visibility,
    ) -> DomainResult<Option<Permission>> {
        let t = self.read()?;
        Ok(t.permissions
            .get(&id.get())
            .filter(|p| visibility.admits(p.deleted_at))
            .cloned())
    }

    async fn list_permissions(
        &self,
        query: &DirectoryQuery<PermissionSort>,
    ) -> DomainResult<Page<Permission>> {
        let t = self.read()?;
        Ok(page_of(
            t.permissions.values().cloned(),
            query,
            |p| p.deleted_at,
            |p| [Some(p.name.as_str()), Some(p.slug.as_str())],
            |sort, a, b| {
                let primary = match sort {
                    PermissionSort::CreatedAt => a.created_at.cmp(&b.created_at),
                    PermissionSort::Name => a.name.cmp(&b.name),
                    PermissionSort::Slug => a.slug.cmp(&b.slug),
                };
                primary.then_with(|| a.id.cmp(&b.id))
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_core::PageRequest;

    use super::*;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (name, slug) in [("Editor", "editor"), ("Admin", "admin"), ("Viewer", "viewer")] {
            store.create_role(NewRole::new(name, slug).unwrap()).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn duplicate_slug_conflicts_even_when_trashed() {
        let store = seeded().await;
        {
            let mut t = store.write().unwrap();
            t.roles.get_mut(&1).unwrap().deleted_at = Some(Utc::now());
        }
        let err = store
            .create_role(NewRole::new("Editor 2", "editor").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn list_applies_search_sort_and_scope() {
        let store = seeded().await;
        let query = DirectoryQuery {
            sort: RoleSort::Name,
            order: SortOrder::Asc,
            ..Default::default()
        };
        let page = store.list_roles(&query).await.unwrap();
        let names: Vec<&str> = page.items.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Admin", "Editor", "Viewer"]);
        assert_eq!(page.meta.total, 3);

        let query = DirectoryQuery::<RoleSort> {
            search: Some("EDIT".into()),
            ..Default::default()
        };
        assert_eq!(store.list_roles(&query).await.unwrap().items.len(), 1);

        let query = DirectoryQuery::<RoleSort> {
            visibility: Visibility::OnlyTrashed,
            ..Default::default()
        };
        assert!(store.list_roles(&query).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn pagination_slices_results() {
        let store = seeded().await;
        let query = DirectoryQuery::<RoleSort> {
            page: PageRequest::new(Some(2), Some(2)),
            ..Default::default()
        };
        let page = store.list_roles(&query).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.meta.last_page, 2);
    }

    #[tokio::test]
    async fn update_of_trashed_user_is_not_found() {
        let store = InMemoryStore::new();
        let user = store
            .create_user(NewPrincipal::new("a@example.com", "h", None).unwrap())
            .await
            .unwrap();
        store.write().unwrap().users.get_mut(&user.id.get()).unwrap().deleted_at = Some(Utc::now());

        let err = store
            .update_user(user.id, PrincipalChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
