//! The admin service and the plumbing its actions share.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{instrument, warn};

use gatehouse_audit::{
    AuditAction, AuditEntry, AuditErrorReporter, AuditLogReader, AuditRecorder, AuditSink,
};
use gatehouse_auth::{
    AccessGuard, GrantChange, GrantSource, GrantStore, Permission, PermissionCatalog, Role, RoleDirectory,
    UserDirectory,
};
use gatehouse_core::{DomainError, DomainResult, EntityKind, PermissionId, PrincipalId, RoleId, Slug, Visibility};
use gatehouse_lifecycle::{BulkIds, LifecycleManager, SoftDeleteStore};

use crate::actions::AdminAction;
use crate::caller::Caller;

/// Everything the admin actions need from storage.
pub trait Backend:
    UserDirectory
    + RoleDirectory
    + PermissionCatalog
    + GrantSource
    + GrantStore
    + SoftDeleteStore
    + AuditSink
    + AuditLogReader
    + 'static
{
}

impl<T> Backend for T where
    T: UserDirectory
        + RoleDirectory
        + PermissionCatalog
        + GrantSource
        + GrantStore
        + SoftDeleteStore
        + AuditSink
        + AuditLogReader
        + 'static
{
}

/// A state transition of one soft-deletable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Trash,
    Restore,
    ForceDelete,
}

impl Transition {
    fn audit_action(self, bulk: bool) -> AuditAction {
        match (self, bulk) {
            (Transition::Trash, false) => AuditAction::SoftDelete,
            (Transition::Restore, false) => AuditAction::Restore,
            (Transition::ForceDelete, false) => AuditAction::ForceDelete,
            (Transition::Trash, true) => AuditAction::SoftDeleteBulk,
            (Transition::Restore, true) => AuditAction::RestoreBulk,
            (Transition::ForceDelete, true) => AuditAction::ForceDeleteBulk,
        }
    }

    fn operation(self, bulk: bool) -> &'static str {
        match (self, bulk) {
            (Transition::Trash, false) => "trash",
            (Transition::Restore, false) => "restore",
            (Transition::ForceDelete, false) => "force_delete",
            (Transition::Trash, true) => "bulk_trash",
            (Transition::Restore, true) => "bulk_restore",
            (Transition::ForceDelete, true) => "bulk_force_delete",
        }
    }

    /// Scope used to read the row before the transition.
    fn lookup_scope(self) -> Visibility {
        match self {
            Transition::Trash => Visibility::Active,
            Transition::Restore | Transition::ForceDelete => Visibility::WithTrashed,
        }
    }

    fn admin_action(self, kind: EntityKind, bulk: bool) -> AdminAction {
        use AdminAction::*;
        match (kind, self, bulk) {
            (EntityKind::User, Transition::Trash, false) => TrashUser,
            (EntityKind::User, Transition::Restore, false) => RestoreUser,
            (EntityKind::User, Transition::ForceDelete, false) => ForceDeleteUser,
            (EntityKind::User, Transition::Trash, true) => BulkTrashUsers,
            (EntityKind::User, Transition::Restore, true) => BulkRestoreUsers,
            (EntityKind::User, Transition::ForceDelete, true) => BulkForceDeleteUsers,
            (EntityKind::Role, Transition::Trash, false) => TrashRole,
            (EntityKind::Role, Transition::Restore, false) => RestoreRole,
            (EntityKind::Role, Transition::ForceDelete, false) => ForceDeleteRole,
            (EntityKind::Role, Transition::Trash, true) => BulkTrashRoles,
            (EntityKind::Role, Transition::Restore, true) => BulkRestoreRoles,
            (EntityKind::Role, Transition::ForceDelete, true) => BulkForceDeleteRoles,
            (EntityKind::Permission, Transition::Trash, false) => TrashPermission,
            (EntityKind::Permission, Transition::Restore, false) => RestorePermission,
            (EntityKind::Permission, Transition::ForceDelete, false) => ForceDeletePermission,
            (EntityKind::Permission, Transition::Trash, true) => BulkTrashPermissions,
            (EntityKind::Permission, Transition::Restore, true) => BulkRestorePermissions,
            (EntityKind::Permission, Transition::ForceDelete, true) => BulkForceDeletePermissions,
        }
    }
}

/// Administrative actions composed from the guard, the lifecycle manager and
/// the audit recorder.
pub struct AdminService<B> {
    pub(crate) store: Arc<B>,
    guard: AccessGuard<Arc<B>>,
    lifecycle: [LifecycleManager<Arc<B>>; 3],
    recorder: AuditRecorder,
}

impl<B> Clone for AdminService<B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            guard: self.guard.clone(),
            lifecycle: self.lifecycle.clone(),
            recorder: self.recorder.clone(),
        }
    }
}

impl<B: Backend> AdminService<B> {
    pub fn new(store: Arc<B>) -> Self {
        let sink: Arc<dyn AuditSink> = store.clone();
        Self {
            guard: AccessGuard::new(Arc::clone(&store)),
            lifecycle: [EntityKind::User, EntityKind::Role, EntityKind::Permission]
                .map(|kind| LifecycleManager::new(Arc::clone(&store), kind)),
            recorder: AuditRecorder::new(sink),
            store,
        }
    }

    /// Persist audit records somewhere other than the backing store. Resets
    /// the error reporter to the default.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.recorder = AuditRecorder::new(sink);
        self
    }

    /// Route audit write failures somewhere other than the log.
    pub fn with_audit_reporter(mut self, reporter: Arc<dyn AuditErrorReporter>) -> Self {
        self.recorder = self.recorder.with_reporter(reporter);
        self
    }

    pub fn store(&self) -> &Arc<B> {
        &self.store
    }

    pub(crate) fn lifecycle(&self, kind: EntityKind) -> &LifecycleManager<Arc<B>> {
        match kind {
            EntityKind::User => &self.lifecycle[0],
            EntityKind::Role => &self.lifecycle[1],
            EntityKind::Permission => &self.lifecycle[2],
        }
    }

    /// Deny unless the caller holds everything `action` requires.
    pub(crate) async fn require(&self, caller: &Caller, action: AdminAction) -> DomainResult<()> {
        self.guard
            .authorize_action(caller.principal_id, &action)
            .await
            .map_err(|err| {
                tracing::info!(actor = %caller.principal_id, ?action, "admin action denied");
                DomainError::from(err)
            })
    }

    /// Persist an audit entry on a runtime task and wait for it. A dropped
    /// caller does not cancel the write; a failed write does not fail the
    /// action.
    pub(crate) async fn audit(&self, entry: AuditEntry) {
        if let Err(err) = self.recorder.record_detached(entry).await {
            tracing::error!(error = %err, "audit task did not complete");
        }
    }

    /// Escalation-check `requested`, then resolve it against the active
    /// catalog. Unknown slugs fail the whole operation.
    pub(crate) async fn grantable_permissions(
        &self,
        caller: &Caller,
        requested: &[Slug],
        escalation_checked: bool,
    ) -> DomainResult<Vec<Permission>> {
        let requested = dedup(requested);
        if escalation_checked {
            self.guard
                .authorize_grant(caller.principal_id, &requested)
                .await?;
        }

        let found: Vec<Permission> = self.store.find_permissions_by_slugs(&requested).await?;
        let missing: Vec<String> = requested
            .iter()
            .filter(|slug| !found.iter().any(|p| p.slug == **slug))
            .map(Slug::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(DomainError::GrantTargetNotFound { missing });
        }
        Ok(found)
    }

    /// Resolve role slugs and escalation-check the union of what they grant.
    pub(crate) async fn grantable_roles(&self, caller: &Caller, requested: &[Slug]) -> DomainResult<Vec<Role>> {
        let requested = dedup(requested);
        let found = self.store.find_roles_by_slugs(&requested).await?;
        let missing: Vec<String> = requested
            .iter()
            .filter(|slug| !found.iter().any(|r| r.slug == **slug))
            .map(Slug::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(DomainError::GrantTargetNotFound { missing });
        }

        let mut granted: Vec<Slug> = Vec::new();
        for role in &found {
            granted.extend(self.store.role_permission_slugs(role.id).await?);
        }
        let granted = dedup(&granted);
        self.guard
            .authorize_grant(caller.principal_id, &granted)
            .await?;

        Ok(found)
    }

    /// JSON snapshot of a row (with its grants) for audit purposes.
    pub(crate) async fn snapshot(&self, kind: EntityKind, id: i64, scope: Visibility) -> DomainResult<Option<Value>> {
        let value = match kind {
            EntityKind::User => self.user_view(PrincipalId::new(id), scope).await?.map(|v| to_json(&v)),
            EntityKind::Role => self.role_view(RoleId::new(id), scope).await?.map(|v| to_json(&v)),
            EntityKind::Permission => self
                .store
                .find_permission(PermissionId::new(id), scope)
                .await?
                .map(|v| to_json(&v)),
        };
        Ok(value)
    }

    /// Trash, restore or force-delete one row and audit it.
    #[instrument(skip(self, caller), fields(actor = %caller.principal_id), err)]
    pub(crate) async fn transition(
        &self,
        caller: &Caller,
        kind: EntityKind,
        transition: Transition,
        id: i64,
    ) -> DomainResult<()> {
        self.require(caller, transition.admin_action(kind, false)).await?;

        let before = self
            .snapshot(kind, id, transition.lookup_scope())
            .await?
            .ok_or_else(|| DomainError::not_found(kind.resource_type(), id))?;

        let manager = self.lifecycle(kind);
        match transition {
            Transition::Trash => manager.trash(id).await?,
            Transition::Restore => manager.restore(id).await?,
            Transition::ForceDelete => manager.force_delete(id).await?,
        };

        let mut entry = AuditEntry::for_entity(transition.audit_action(false), kind, id)
            .actor(Some(caller.actor()))
            .meta(caller.meta.clone())
            .before_value(before)
            .context(kind.table(), transition.operation(false));
        if transition != Transition::ForceDelete {
            match self.snapshot(kind, id, Visibility::WithTrashed).await {
                Ok(Some(after)) => entry = entry.after_value(after),
                Ok(None) => {}
                Err(err) => warn!(error = %err, %kind, id, "after snapshot failed, auditing without it"),
            }
        }
        self.audit(entry).await;
        Ok(())
    }

    /// Bulk variant of [`transition`](Self::transition). Returns the affected count.
    #[instrument(skip(self, caller, ids), fields(actor = %caller.principal_id), err)]
    pub(crate) async fn bulk_transition(
        &self,
        caller: &Caller,
        kind: EntityKind,
        transition: Transition,
        ids: Vec<i64>,
    ) -> DomainResult<u64> {
        let ids = BulkIds::new(ids)?;
        self.require(caller, transition.admin_action(kind, true)).await?;

        let manager = self.lifecycle(kind);
        let affected = match transition {
            Transition::Trash => manager.bulk_trash(&ids).await?,
            Transition::Restore => manager.bulk_restore(&ids).await?,
            Transition::ForceDelete => manager.bulk_force_delete(&ids).await?,
        };

        let entry = AuditEntry::for_bulk(transition.audit_action(true), kind, ids.as_slice(), affected)
            .actor(Some(caller.actor()))
            .meta(caller.meta.clone())
            .context(kind.table(), transition.operation(true));
        self.audit(entry).await;
        Ok(affected)
    }
}

/// Re-read a committed row. A failed or empty read falls back to `known`,
/// the state the writes themselves reported.
pub(crate) async fn settle<T, F>(read: F, known: T) -> T
where
    F: Future<Output = DomainResult<Option<T>>>,
{
    match read.await {
        Ok(Some(value)) => value,
        Ok(None) => known,
        Err(err) => {
            warn!(error = %err, "re-read after commit failed");
            known
        }
    }
}

/// What `change` leaves behind when applied to `before`.
pub(crate) fn applied(before: &[Slug], change: &GrantChange<Slug>) -> Vec<Slug> {
    let mut out: Vec<Slug> = match change {
        GrantChange::Attach(members) => before.iter().chain(members).cloned().collect(),
        GrantChange::Sync(members) => members.clone(),
        GrantChange::Detach(members) => before
            .iter()
            .filter(|slug| !members.contains(slug))
            .cloned()
            .collect(),
    };
    out.sort();
    out.dedup();
    out
}

pub(crate) fn ids_of(permissions: &[Permission]) -> Vec<PermissionId> {
    permissions.iter().map(|p| p.id).collect()
}

/// Sorted, like the store's slug reads.
pub(crate) fn slugs_of(permissions: &[Permission]) -> Vec<Slug> {
    let mut slugs: Vec<Slug> = permissions.iter().map(|p| p.slug.clone()).collect();
    slugs.sort();
    slugs
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// First occurrence wins.
pub(crate) fn dedup(slugs: &[Slug]) -> Vec<Slug> {
    let mut seen = HashSet::new();
    slugs
        .iter()
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}
