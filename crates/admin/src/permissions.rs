//! Permission catalog actions.

use tracing::instrument;

use gatehouse_audit::{AuditAction, AuditEntry};
use gatehouse_auth::{DirectoryQuery, NewPermission, Permission, PermissionChanges, PermissionSort};
use gatehouse_core::{DomainError, DomainResult, EntityKind, Page, PermissionId, Visibility};

use crate::actions::AdminAction;
use crate::caller::Caller;
use crate::service::{AdminService, Backend, Transition};

const COMPONENT: &str = "permissions";

impl<B: Backend> AdminService<B> {
    async fn active_permission(&self, id: PermissionId) -> DomainResult<Permission> {
        self.store
            .find_permission(id, Visibility::Active)
            .await?
            .ok_or_else(|| DomainError::not_found("Permission", id))
    }

    pub async fn list_permissions(
        &self,
        caller: &Caller,
        query: &DirectoryQuery<PermissionSort>,
    ) -> DomainResult<Page<Permission>> {
        self.require(caller, AdminAction::ListPermissions).await?;
        self.store.list_permissions(query).await
    }

    pub async fn show_permission(&self, caller: &Caller, id: PermissionId) -> DomainResult<Permission> {
        self.require(caller, AdminAction::ShowPermission).await?;
        self.active_permission(id).await
    }

    #[instrument(skip(self, caller, input), fields(actor = %caller.principal_id, slug = %input.slug), err)]
    pub async fn create_permission(&self, caller: &Caller, input: NewPermission) -> DomainResult<Permission> {
        self.require(caller, AdminAction::CreatePermission).await?;
        let permission = self.store.create_permission(input).await?;
        self.audit(
            AuditEntry::for_entity(AuditAction::Create, EntityKind::Permission, permission.id)
                .actor(Some(caller.actor()))
                .meta(caller.meta.clone())
                .after(&permission)
                .context(COMPONENT, "create"),
        )
        .await;
        Ok(permission)
    }

    #[instrument(skip(self, caller, changes), fields(actor = %caller.principal_id), err)]
    pub async fn update_permission(
        &self,
        caller: &Caller,
        id: PermissionId,
        changes: PermissionChanges,
    ) -> DomainResult<Permission> {
        self.require(caller, AdminAction::UpdatePermission).await?;
        if changes.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::validation("permission name must not be empty"));
        }
        let before = self.active_permission(id).await?;
        let after = self.store.update_permission(id, changes).await?;
        self.audit(
            AuditEntry::for_entity(AuditAction::Update, EntityKind::Permission, id)
                .actor(Some(caller.actor()))
                .meta(caller.meta.clone())
                .before(&before)
                .after(&after)
                .context(COMPONENT, "update")
                .with_changed_fields(),
        )
        .await;
        Ok(after)
    }

    pub async fn trash_permission(&self, caller: &Caller, id: PermissionId) -> DomainResult<()> {
        self.transition(caller, EntityKind::Permission, Transition::Trash, id.get()).await
    }

    pub async fn restore_permission(&self, caller: &Caller, id: PermissionId) -> DomainResult<Permission> {
        self.transition(caller, EntityKind::Permission, Transition::Restore, id.get()).await?;
        self.active_permission(id).await
    }

    pub async fn force_delete_permission(&self, caller: &Caller, id: PermissionId) -> DomainResult<()> {
        self.transition(caller, EntityKind::Permission, Transition::ForceDelete, id.get()).await
    }

    pub async fn bulk_trash_permissions(&self, caller: &Caller, ids: Vec<i64>) -> DomainResult<u64> {
        self.bulk_transition(caller, EntityKind::Permission, Transition::Trash, ids).await
    }

    pub async fn bulk_restore_permissions(&self, caller: &Caller, ids: Vec<i64>) -> DomainResult<u64> {
        self.bulk_transition(caller, EntityKind::Permission, Transition::Restore, ids).await
    }

    pub async fn bulk_force_delete_permissions(&self, caller: &Caller, ids: Vec<i64>) -> DomainResult<u64> {
        self.bulk_transition(caller, EntityKind::Permission, Transition::ForceDelete, ids).await
    }
}
