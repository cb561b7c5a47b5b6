use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use gatehouse_auth::{GrantChange, GrantSource, GrantStore, Permission, Role};
use gatehouse_core::{DomainError, DomainResult, PermissionId, PrincipalId, RoleId, Slug};

use super::{InMemoryStore, Tables};

/// Apply a membership change for `owner` to a pivot set.
fn apply_pivot<O, M>(pivot: &mut BTreeSet<(O, M)>, owner: O, change: GrantChange<M>)
where
    O: Ord + Copy,
    M: Ord + Copy,
{
    match change {
        GrantChange::Attach(members) => {
            pivot.extend(members.into_iter().map(|m| (owner, m)));
        }
        GrantChange::Sync(members) => {
            pivot.retain(|(o, _)| *o != owner);
            pivot.extend(members.into_iter().map(|m| (owner, m)));
        }
        GrantChange::Detach(members) => {
            for m in members {
                pivot.remove(&(owner, m));
            }
        }
    }
}

impl Tables {
    fn role_grants(&self, role: RoleId) -> BTreeSet<Slug> {
        self.role_permissions
            .iter()
            .filter(|(r, _)| *r == role)
            .filter_map(|(_, p)| self.active_permission(*p))
            .map(|p| p.slug.clone())
            .collect()
    }

    fn direct_grants(&self, principal: PrincipalId) -> BTreeSet<Slug> {
        self.user_permissions
            .iter()
            .filter(|(u, _)| *u == principal)
            .filter_map(|(_, p)| self.active_permission(*p))
            .map(|p| p.slug.clone())
            .collect()
    }

    fn active_roles_of(&self, principal: PrincipalId) -> Vec<&Role> {
        self.user_roles
            .iter()
            .filter(|(u, _)| *u == principal)
            .filter_map(|(_, r)| self.active_role(*r))
            .collect()
    }

    fn ensure_user(&self, principal: PrincipalId) -> DomainResult<()> {
        if self.users.contains_key(&principal.get()) {
            Ok(())
        } else {
            Err(DomainError::not_found("User", principal))
        }
    }

    fn ensure_role(&self, role: RoleId) -> DomainResult<()> {
        if self.roles.contains_key(&role.get()) {
            Ok(())
        } else {
            Err(DomainError::not_found("Role", role))
        }
    }

    /// Members must reference existing rows, like a foreign key would.
    fn ensure_permissions(&self, ids: &[PermissionId]) -> DomainResult<()> {
        match ids.iter().find(|id| !self.permissions.contains_key(&id.get())) {
            Some(id) => Err(DomainError::not_found("Permission", id)),
            None => Ok(()),
        }
    }

    fn ensure_roles(&self, ids: &[RoleId]) -> DomainResult<()> {
        match ids.iter().find(|id| !self.roles.contains_key(&id.get())) {
            Some(id) => Err(DomainError::not_found("Role", id)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GrantSource for InMemoryStore {
    async fn fetch_direct_permission_slugs(&self, principal: PrincipalId) -> DomainResult<BTreeSet<Slug>> {
        Ok(self.read()?.direct_grants(principal))
    }

    async fn fetch_role_slugs_and_their_permissions(
        &self,
        principal: PrincipalId,
    ) -> DomainResult<Vec<(Slug, BTreeSet<Slug>)>> {
        let t = self.read()?;
        Ok(t.active_roles_of(principal)
            .into_iter()
            .map(|role| (role.slug.clone(), t.role_grants(role.id)))
            .collect())
    }
}

#[async_trait]
impl GrantStore for InMemoryStore {
    async fn find_permissions_by_slugs(&self, slugs: &[Slug]) -> DomainResult<Vec<Permission>> {
        let t = self.read()?;
        let by_slug: BTreeMap<&Slug, &Permission> = t
            .permissions
            .values()
            .filter(|p| p.deleted_at.is_none())
            .map(|p| (&p.slug, p))
            .collect();
        Ok(slugs
            .iter()
            .filter_map(|s| by_slug.get(s).map(|p| (*p).clone()))
            .collect())
    }

    async fn find_roles_by_slugs(&self, slugs: &[Slug]) -> DomainResult<Vec<Role>> {
        let t = self.read()?;
        let by_slug: BTreeMap<&Slug, &Role> = t
            .roles
            .values()
            .filter(|r| r.deleted_at.is_none())
            .map(|r| (&r.slug, r))
            .collect();
        Ok(slugs
            .iter()
            .filter_map(|s| by_slug.get(s).map(|r| (*r).clone()))
            .collect())
    }

    async fn role_permission_slugs(&self, role: RoleId) -> DomainResult<Vec<Slug>> {
        Ok(self.read()?.role_grants(role).into_iter().collect())
    }

    async fn principal_permission_slugs(&self, principal: PrincipalId) -> DomainResult<Vec<Slug>> {
        Ok(self.read()?.direct_grants(principal).into_iter().collect())
    }

    async fn principal_role_slugs(&self, principal: PrincipalId) -> DomainResult<Vec<Slug>> {
        let t = self.read()?;
        let mut slugs: Vec<Slug> = t
            .active_roles_of(principal)
            .into_iter()
            .map(|r| r.slug.clone())
            .collect();
        slugs.sort();
        Ok(slugs)
    }

    async fn apply_role_permissions(
        &self,
        role: RoleId,
        change: GrantChange<PermissionId>,
    ) -> DomainResult<()> {
        let mut t = self.write()?;
        t.ensure_role(role)?;
        t.ensure_permissions(change.members())?;
        apply_pivot(&mut t.role_permissions, role, change);
        Ok(())
    }

    async fn apply_principal_permissions(
        &self,
        principal: PrincipalId,
        change: GrantChange<PermissionId>,
    ) -> DomainResult<()> {
        let mut t = self.write()?;
        t.ensure_user(principal)?;
        t.ensure_permissions(change.members())?;
        apply_pivot(&mut t.user_permissions, principal, change);
        Ok(())
    }

    async fn apply_principal_roles(
        &self,
        principal: PrincipalId,
        change: GrantChange<RoleId>,
    ) -> DomainResult<()> {
        let mut t = self.write()?;
        t.ensure_user(principal)?;
        t.ensure_roles(change.members())?;
        apply_pivot(&mut t.user_roles, principal, change);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use gatehouse_auth::{
        NewPermission, NewPrincipal, NewRole, PermissionCatalog, RoleDirectory, UserDirectory,
        resolve_effective_slugs,
    };

    use super::*;

    struct Fixture {
        store: InMemoryStore,
        user: PrincipalId,
        editor: RoleId,
        update: PermissionId,
        delete: PermissionId,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let user = store
            .create_user(NewPrincipal::new("ed@example.com", "h", None).unwrap())
            .await
            .unwrap()
            .id;
        let editor = store.create_role(NewRole::new("Editor", "editor").unwrap()).await.unwrap().id;
        let update = store
            .create_permission(NewPermission::new("Update docs", "docs.update").unwrap())
            .await
            .unwrap()
            .id;
        let delete = store
            .create_permission(NewPermission::new("Delete docs", "docs.delete").unwrap())
            .await
            .unwrap()
            .id;
        Fixture { store, user, editor, update, delete }
    }

    #[tokio::test]
    async fn role_grants_reach_members_on_next_resolution() {
        let f = fixture().await;
        f.store.apply_principal_roles(f.user, GrantChange::Sync(vec![f.editor])).await.unwrap();
        assert!(resolve_effective_slugs(&f.store, f.user).await.unwrap().is_empty());

        f.store
            .apply_role_permissions(f.editor, GrantChange::Attach(vec![f.update]))
            .await
            .unwrap();
        let effective = resolve_effective_slugs(&f.store, f.user).await.unwrap();
        assert!(effective.contains("docs.update"));
        assert!(!effective.contains("docs.delete"));
    }

    #[tokio::test]
    async fn trashed_role_and_permission_grant_nothing() {
        let f = fixture().await;
        f.store.apply_principal_roles(f.user, GrantChange::Attach(vec![f.editor])).await.unwrap();
        f.store
            .apply_role_permissions(f.editor, GrantChange::Attach(vec![f.update]))
            .await
            .unwrap();
        f.store
            .apply_principal_permissions(f.user, GrantChange::Attach(vec![f.delete]))
            .await
            .unwrap();

        {
            let mut t = f.store.write().unwrap();
            t.roles.get_mut(&f.editor.get()).unwrap().deleted_at = Some(Utc::now());
            t.permissions.get_mut(&f.delete.get()).unwrap().deleted_at = Some(Utc::now());
        }

        assert!(resolve_effective_slugs(&f.store, f.user).await.unwrap().is_empty());
        assert!(f.store.principal_role_slugs(f.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sync_replaces_and_detach_removes() {
        let f = fixture().await;
        f.store
            .apply_principal_permissions(f.user, GrantChange::Attach(vec![f.update, f.delete]))
            .await
            .unwrap();
        f.store
            .apply_principal_permissions(f.user, GrantChange::Sync(vec![f.delete]))
            .await
            .unwrap();
        assert_eq!(
            f.store.principal_permission_slugs(f.user).await.unwrap(),
            vec![Slug::from_static("docs.delete")]
        );

        f.store
            .apply_principal_permissions(f.user, GrantChange::Detach(vec![f.delete]))
            .await
            .unwrap();
        assert!(f.store.principal_permission_slugs(f.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookups_skip_unknown_and_trashed_slugs() {
        let f = fixture().await;
        f.store.write().unwrap().permissions.get_mut(&f.delete.get()).unwrap().deleted_at = Some(Utc::now());

        let found = f
            .store
            .find_permissions_by_slugs(&[
                Slug::from_static("docs.update"),
                Slug::from_static("docs.delete"),
                Slug::from_static("docs.nope"),
            ])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, f.update);
    }

    #[tokio::test]
    async fn unknown_member_fails_without_changes() {
        let f = fixture().await;
        let err = f
            .store
            .apply_role_permissions(f.editor, GrantChange::Attach(vec![f.update, PermissionId::new(99)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert!(f.store.role_permission_slugs(f.editor).await.unwrap().is_empty());
    }
}
