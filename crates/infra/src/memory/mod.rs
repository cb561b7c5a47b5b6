//! In-memory store.
//!
//! Intended for tests/dev. All tables live behind one `RwLock`, so every
//! operation (bulk statements and grant syncs included) is atomic.

mod audit;
mod directory;
mod grants;
mod lifecycle;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use gatehouse_audit::AuditRecord;
use gatehouse_auth::{Permission, Principal, Role};
use gatehouse_core::{DomainError, DomainResult, PermissionId, PrincipalId, RoleId, SoftDeletable};

/// Mutable access to the soft-delete column of a stored row.
trait Trashable: SoftDeletable {
    fn deleted_at_mut(&mut self) -> &mut Option<DateTime<Utc>>;
}

impl Trashable for Principal {
    fn deleted_at_mut(&mut self) -> &mut Option<DateTime<Utc>> {
        &mut self.deleted_at
    }
}

impl Trashable for Role {
    fn deleted_at_mut(&mut self) -> &mut Option<DateTime<Utc>> {
        &mut self.deleted_at
    }
}

impl Trashable for Permission {
    fn deleted_at_mut(&mut self) -> &mut Option<DateTime<Utc>> {
        &mut self.deleted_at
    }
}

#[derive(Debug, Default)]
struct Tables {
    last_id: BTreeMap<&'static str, i64>,
    users: BTreeMap<i64, Principal>,
    roles: BTreeMap<i64, Role>,
    permissions: BTreeMap<i64, Permission>,
    role_permissions: BTreeSet<(RoleId, PermissionId)>,
    user_permissions: BTreeSet<(PrincipalId, PermissionId)>,
    user_roles: BTreeSet<(PrincipalId, RoleId)>,
    audit_logs: Vec<AuditRecord>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let id = self.last_id.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn active_permission(&self, id: PermissionId) -> Option<&Permission> {
        self.permissions.get(&id.get()).filter(|p| p.deleted_at.is_none())
    }

    fn active_role(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(&id.get()).filter(|r| r.deleted_at.is_none())
    }

    /// Pivot rows reference their owners with `ON DELETE CASCADE` semantics.
    fn cascade_user(&mut self, id: PrincipalId) {
        self.user_permissions.retain(|(u, _)| *u != id);
        self.user_roles.retain(|(u, _)| *u != id);
    }

    fn cascade_role(&mut self, id: RoleId) {
        self.role_permissions.retain(|(r, _)| *r != id);
        self.user_roles.retain(|(_, r)| *r != id);
    }

    fn cascade_permission(&mut self, id: PermissionId) {
        self.role_permissions.retain(|(_, p)| *p != id);
        self.user_permissions.retain(|(_, p)| *p != id);
    }
}

/// In-memory implementation of every storage contract.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| DomainError::storage("lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| DomainError::storage("lock poisoned"))
    }
}
