//! User actions.

use tracing::instrument;

use gatehouse_audit::{AuditAction, AuditEntry};
use gatehouse_auth::{DirectoryQuery, GrantChange, NewPrincipal, Principal, PrincipalChanges, UserSort};
use gatehouse_core::{DomainError, DomainResult, EntityKind, Page, PrincipalId, Slug, Visibility};

use crate::actions::AdminAction;
use crate::caller::Caller;
use crate::service::{AdminService, Backend, Transition, applied, ids_of, settle, slugs_of};
use crate::views::{UserGrants, UserView};

const COMPONENT: &str = "users";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUser {
    pub account: NewPrincipal,
    /// Direct grants installed with the account.
    pub permissions: Vec<Slug>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateUser {
    pub changes: PrincipalChanges,
    /// `Some` replaces the direct grants.
    pub permissions: Option<Vec<Slug>>,
}

impl<B: Backend> AdminService<B> {
    pub(crate) async fn user_view(&self, id: PrincipalId, scope: Visibility) -> DomainResult<Option<UserView>> {
        let Some(user) = self.store.find_user(id, scope).await? else {
            return Ok(None);
        };
        Ok(Some(UserView {
            permissions: self.store.principal_permission_slugs(id).await?,
            roles: self.store.principal_role_slugs(id).await?,
            user,
        }))
    }

    async fn active_user_view(&self, id: PrincipalId) -> DomainResult<UserView> {
        self.user_view(id, Visibility::Active)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))
    }

    pub async fn list_users(
        &self,
        caller: &Caller,
        query: &DirectoryQuery<UserSort>,
    ) -> DomainResult<Page<Principal>> {
        self.require(caller, AdminAction::ListUsers).await?;
        self.store.list_users(query).await
    }

    pub async fn show_user(&self, caller: &Caller, id: PrincipalId) -> DomainResult<UserView> {
        self.require(caller, AdminAction::ShowUser).await?;
        self.active_user_view(id).await
    }

    #[instrument(skip(self, caller, input), fields(actor = %caller.principal_id), err)]
    pub async fn create_user(&self, caller: &Caller, input: CreateUser) -> DomainResult<UserView> {
        self.require(caller, AdminAction::CreateUser).await?;
        let grants = if input.permissions.is_empty() {
            Vec::new()
        } else {
            self.grantable_permissions(caller, &input.permissions, true).await?
        };

        let user = self.store.create_user(input.account).await?;
        let id = user.id;
        let granted = if grants.is_empty() {
            Ok(Vec::new())
        } else {
            self.store
                .apply_principal_permissions(id, GrantChange::Sync(ids_of(&grants)))
                .await
                .map(|()| slugs_of(&grants))
        };

        let known = UserView {
            user,
            permissions: granted.clone().unwrap_or_default(),
            roles: Vec::new(),
        };
        let after = settle(self.user_view(id, Visibility::WithTrashed), known).await;
        self.audit(
            AuditEntry::for_entity(AuditAction::Create, EntityKind::User, id)
                .actor(Some(caller.actor()))
                .meta(caller.meta.clone())
                .after(&after)
                .context(COMPONENT, "create"),
        )
        .await;
        granted?;
        Ok(after)
    }

    /// The account fields and the grant sync commit separately. When the sync
    /// fails the committed field change is still audited before the error is
    /// returned.
    #[instrument(skip(self, caller, input), fields(actor = %caller.principal_id), err)]
    pub async fn update_user(&self, caller: &Caller, id: PrincipalId, input: UpdateUser) -> DomainResult<UserView> {
        self.require(caller, AdminAction::UpdateUser).await?;
        let changes = input.changes.validate()?;
        let before = self.active_user_view(id).await?;
        let grants = match &input.permissions {
            Some(slugs) => Some(self.grantable_permissions(caller, slugs, true).await?),
            None => None,
        };

        let user = self.store.update_user(id, changes).await?;
        let granted = match &grants {
            Some(grants) => self
                .store
                .apply_principal_permissions(id, GrantChange::Sync(ids_of(grants)))
                .await
                .map(|()| slugs_of(grants)),
            None => Ok(before.permissions.clone()),
        };

        let known = UserView {
            user,
            permissions: granted.clone().unwrap_or_else(|_| before.permissions.clone()),
            roles: before.roles.clone(),
        };
        let after = settle(self.user_view(id, Visibility::WithTrashed), known).await;
        self.audit(
            AuditEntry::for_entity(AuditAction::Update, EntityKind::User, id)
                .actor(Some(caller.actor()))
                .meta(caller.meta.clone())
                .before(&before)
                .after(&after)
                .context(COMPONENT, "update")
                .with_changed_fields(),
        )
        .await;
        granted?;
        Ok(after)
    }

    pub async fn trash_user(&self, caller: &Caller, id: PrincipalId) -> DomainResult<()> {
        self.transition(caller, EntityKind::User, Transition::Trash, id.get()).await
    }

    /// Restoring an active user succeeds and changes nothing.
    pub async fn restore_user(&self, caller: &Caller, id: PrincipalId) -> DomainResult<UserView> {
        self.transition(caller, EntityKind::User, Transition::Restore, id.get()).await?;
        self.active_user_view(id).await
    }

    pub async fn force_delete_user(&self, caller: &Caller, id: PrincipalId) -> DomainResult<()> {
        self.transition(caller, EntityKind::User, Transition::ForceDelete, id.get()).await
    }

    pub async fn bulk_trash_users(&self, caller: &Caller, ids: Vec<i64>) -> DomainResult<u64> {
        self.bulk_transition(caller, EntityKind::User, Transition::Trash, ids).await
    }

    pub async fn bulk_restore_users(&self, caller: &Caller, ids: Vec<i64>) -> DomainResult<u64> {
        self.bulk_transition(caller, EntityKind::User, Transition::Restore, ids).await
    }

    pub async fn bulk_force_delete_users(&self, caller: &Caller, ids: Vec<i64>) -> DomainResult<u64> {
        self.bulk_transition(caller, EntityKind::User, Transition::ForceDelete, ids).await
    }

    pub async fn user_grants(&self, caller: &Caller, id: PrincipalId) -> DomainResult<UserGrants> {
        self.require(caller, AdminAction::ReadUserPermissions).await?;
        let view = self.active_user_view(id).await?;
        let effective = gatehouse_auth::resolve_effective_slugs(self.store.as_ref(), id).await?;
        Ok(UserGrants {
            direct: view.permissions,
            roles: view.roles,
            effective: effective.into_sorted_vec(),
        })
    }

    pub async fn attach_user_permissions(
        &self,
        caller: &Caller,
        id: PrincipalId,
        slugs: &[Slug],
    ) -> DomainResult<Vec<Slug>> {
        self.change_user_permissions(caller, id, GrantChange::Attach(slugs.to_vec())).await
    }

    pub async fn sync_user_permissions(
        &self,
        caller: &Caller,
        id: PrincipalId,
        slugs: &[Slug],
    ) -> DomainResult<Vec<Slug>> {
        self.change_user_permissions(caller, id, GrantChange::Sync(slugs.to_vec())).await
    }

    /// Detaching never widens a grant and is not escalation-checked.
    pub async fn detach_user_permissions(
        &self,
        caller: &Caller,
        id: PrincipalId,
        slugs: &[Slug],
    ) -> DomainResult<Vec<Slug>> {
        self.change_user_permissions(caller, id, GrantChange::Detach(slugs.to_vec())).await
    }

    #[instrument(skip(self, caller, change), fields(actor = %caller.principal_id, change = change.label()), err)]
    async fn change_user_permissions(
        &self,
        caller: &Caller,
        id: PrincipalId,
        change: GrantChange<Slug>,
    ) -> DomainResult<Vec<Slug>> {
        self.require(caller, AdminAction::ManageUserPermissions).await?;
        if change.members().is_empty() && !matches!(change, GrantChange::Sync(_)) {
            return Err(DomainError::validation("permissions must be a non-empty array"));
        }
        self.active_user_view(id).await?;

        let before = self.store.principal_permission_slugs(id).await?;
        let grants = self
            .grantable_permissions(caller, change.members(), change.grants())
            .await?;
        self.store
            .apply_principal_permissions(id, change.with_members(ids_of(&grants)))
            .await?;
        let known = applied(&before, &change.with_members(slugs_of(&grants)));
        let after = settle(
            async { self.store.principal_permission_slugs(id).await.map(Some) },
            known,
        )
        .await;

        self.audit(
            AuditEntry::for_entity(AuditAction::Update, EntityKind::User, id)
                .actor(Some(caller.actor()))
                .meta(caller.meta.clone())
                .before_value(serde_json::json!({ "permissions": before }))
                .after_value(serde_json::json!({ "permissions": after }))
                .context(COMPONENT, &format!("permissions.{}", change.label()))
                .with_changed_fields(),
        )
        .await;
        Ok(after)
    }

    /// Replace the user's role memberships. The caller must hold every slug
    /// the assigned roles grant.
    #[instrument(skip(self, caller, role_slugs), fields(actor = %caller.principal_id), err)]
    pub async fn sync_user_roles(
        &self,
        caller: &Caller,
        id: PrincipalId,
        role_slugs: &[Slug],
    ) -> DomainResult<Vec<Slug>> {
        self.require(caller, AdminAction::ManageUserRoles).await?;
        self.active_user_view(id).await?;

        let before = self.store.principal_role_slugs(id).await?;
        let roles = self.grantable_roles(caller, role_slugs).await?;
        self.store
            .apply_principal_roles(id, GrantChange::Sync(roles.iter().map(|r| r.id).collect()))
            .await?;
        let mut known: Vec<Slug> = roles.into_iter().map(|r| r.slug).collect();
        known.sort();
        let after = settle(async { self.store.principal_role_slugs(id).await.map(Some) }, known).await;

        self.audit(
            AuditEntry::for_entity(AuditAction::Update, EntityKind::User, id)
                .actor(Some(caller.actor()))
                .meta(caller.meta.clone())
                .before_value(serde_json::json!({ "roles": before }))
                .after_value(serde_json::json!({ "roles": after }))
                .context(COMPONENT, "roles.sync")
                .with_changed_fields(),
        )
        .await;
        Ok(after)
    }
}
