//! Role actions.

use tracing::instrument;

use gatehouse_audit::{AuditAction, AuditEntry};
use gatehouse_auth::{DirectoryQuery, GrantChange, NewRole, Role, RoleChanges, RoleSort};
use gatehouse_core::{DomainError, DomainResult, EntityKind, Page, RoleId, Slug, Visibility};

use crate::actions::AdminAction;
use crate::caller::Caller;
use crate::service::{AdminService, Backend, Transition, ids_of, settle, slugs_of};
use crate::views::RoleView;

const COMPONENT: &str = "roles";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRole {
    pub role: NewRole,
    pub permissions: Vec<Slug>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRole {
    pub changes: RoleChanges,
    /// `Some` replaces what the role grants.
    pub permissions: Option<Vec<Slug>>,
}

impl<B: Backend> AdminService<B> {
    pub(crate) async fn role_view(&self, id: RoleId, scope: Visibility) -> DomainResult<Option<RoleView>> {
        let Some(role) = self.store.find_role(id, scope).await? else {
            return Ok(None);
        };
        Ok(Some(RoleView {
            permissions: self.store.role_permission_slugs(id).await?,
            role,
        }))
    }

    async fn active_role_view(&self, id: RoleId) -> DomainResult<RoleView> {
        self.role_view(id, Visibility::Active)
            .await?
            .ok_or_else(|| DomainError::not_found("Role", id))
    }

    pub async fn list_roles(&self, caller: &Caller, query: &DirectoryQuery<RoleSort>) -> DomainResult<Page<Role>> {
        self.require(caller, AdminAction::ListRoles).await?;
        self.store.list_roles(query).await
    }

    pub async fn show_role(&self, caller: &Caller, id: RoleId) -> DomainResult<RoleView> {
        self.require(caller, AdminAction::ShowRole).await?;
        self.active_role_view(id).await
    }

    #[instrument(skip(self, caller, input), fields(actor = %caller.principal_id, slug = %input.role.slug), err)]
    pub async fn create_role(&self, caller: &Caller, input: CreateRole) -> DomainResult<RoleView> {
        self.require(caller, AdminAction::CreateRole).await?;
        let grants = if input.permissions.is_empty() {
            Vec::new()
        } else {
            self.grantable_permissions(caller, &input.permissions, true).await?
        };

        let role = self.store.create_role(input.role).await?;
        let id = role.id;
        let granted = if grants.is_empty() {
            Ok(Vec::new())
        } else {
            self.store
                .apply_role_permissions(id, GrantChange::Sync(ids_of(&grants)))
                .await
                .map(|()| slugs_of(&grants))
        };

        let known = RoleView {
            role,
            permissions: granted.clone().unwrap_or_default(),
        };
        let after = settle(self.role_view(id, Visibility::WithTrashed), known).await;
        self.audit(
            AuditEntry::for_entity(AuditAction::Create, EntityKind::Role, id)
                .actor(Some(caller.actor()))
                .meta(caller.meta.clone())
                .after(&after)
                .context(COMPONENT, "create"),
        )
        .await;
        granted?;
        Ok(after)
    }

    #[instrument(skip(self, caller, input), fields(actor = %caller.principal_id), err)]
    pub async fn update_role(&self, caller: &Caller, id: RoleId, input: UpdateRole) -> DomainResult<RoleView> {
        self.require(caller, AdminAction::UpdateRole).await?;
        if input.changes.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::validation("role name must not be empty"));
        }
        let before = self.active_role_view(id).await?;
        let grants = match &input.permissions {
            Some(slugs) => Some(self.grantable_permissions(caller, slugs, true).await?),
            None => None,
        };

        let role = self.store.update_role(id, input.changes).await?;
        let granted = match &grants {
            Some(grants) => self
                .store
                .apply_role_permissions(id, GrantChange::Sync(ids_of(grants)))
                .await
                .map(|()| slugs_of(grants)),
            None => Ok(before.permissions.clone()),
        };

        let known = RoleView {
            role,
            permissions: granted.clone().unwrap_or_else(|_| before.permissions.clone()),
        };
        let after = settle(self.role_view(id, Visibility::WithTrashed), known).await;
        self.audit(
            AuditEntry::for_entity(AuditAction::Update, EntityKind::Role, id)
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

    pub async fn trash_role(&self, caller: &Caller, id: RoleId) -> DomainResult<()> {
        self.transition(caller, EntityKind::Role, Transition::Trash, id.get()).await
    }

    pub async fn restore_role(&self, caller: &Caller, id: RoleId) -> DomainResult<RoleView> {
        self.transition(caller, EntityKind::Role, Transition::Restore, id.get()).await?;
        self.active_role_view(id).await
    }

    pub async fn force_delete_role(&self, caller: &Caller, id: RoleId) -> DomainResult<()> {
        self.transition(caller, EntityKind::Role, Transition::ForceDelete, id.get()).await
    }

    pub async fn bulk_trash_roles(&self, caller: &Caller, ids: Vec<i64>) -> DomainResult<u64> {
        self.bulk_transition(caller, EntityKind::Role, Transition::Trash, ids).await
    }

    pub async fn bulk_restore_roles(&self, caller: &Caller, ids: Vec<i64>) -> DomainResult<u64> {
        self.bulk_transition(caller, EntityKind::Role, Transition::Restore, ids).await
    }

    pub async fn bulk_force_delete_roles(&self, caller: &Caller, ids: Vec<i64>) -> DomainResult<u64> {
        self.bulk_transition(caller, EntityKind::Role, Transition::ForceDelete, ids).await
    }
}
