use std::collections::BTreeMap;

use async_trait::async_trait;

use gatehouse_core::{DomainResult, EntityKind, PermissionId, PrincipalId, RoleId, Visibility};
use gatehouse_lifecycle::{RowState, SoftDeleteStore, TrashedField};

use super::{InMemoryStore, Tables, Trashable};

fn locate_in<T: Trashable>(rows: &BTreeMap<i64, T>, id: i64, scope: Visibility) -> Option<RowState> {
    rows.get(&id)
        .map(|row| row.deleted_at())
        .filter(|deleted_at| scope.admits(*deleted_at))
        .map(|deleted_at| RowState { id, deleted_at })
}

fn update_in<T: Trashable>(
    rows: &mut BTreeMap<i64, T>,
    ids: &[i64],
    scope: Visibility,
    field: TrashedField,
) -> u64 {
    let mut affected = 0;
    for id in ids {
        if let Some(slot) = rows.get_mut(id).map(Trashable::deleted_at_mut) {
            if scope.admits(*slot) {
                *slot = field.value();
                affected += 1;
            }
        }
    }
    affected
}

/// Remove matching rows and return the removed ids.
fn delete_in<T: Trashable>(rows: &mut BTreeMap<i64, T>, ids: &[i64], scope: Visibility) -> Vec<i64> {
    let mut removed = Vec::new();
    for id in ids {
        let matches = rows.get(id).is_some_and(|row| scope.admits(row.deleted_at()));
        if matches {
            rows.remove(id);
            removed.push(*id);
        }
    }
    removed
}

impl Tables {
    fn purge(&mut self, kind: EntityKind, ids: &[i64], scope: Visibility) -> u64 {
        let removed = match kind {
            EntityKind::User => delete_in(&mut self.users, ids, scope),
            EntityKind::Role => delete_in(&mut self.roles, ids, scope),
            EntityKind::Permission => delete_in(&mut self.permissions, ids, scope),
        };
        for id in &removed {
            match kind {
                EntityKind::User => self.cascade_user(PrincipalId::new(*id)),
                EntityKind::Role => self.cascade_role(RoleId::new(*id)),
                EntityKind::Permission => self.cascade_permission(PermissionId::new(*id)),
            }
        }
        removed.len() as u64
    }
}

#[async_trait]
impl SoftDeleteStore for InMemoryStore {
    async fn locate(&self, kind: EntityKind, id: i64, scope: Visibility) -> DomainResult<Option<RowState>> {
        let t = self.read()?;
        Ok(match kind {
            EntityKind::User => locate_in(&t.users, id, scope),
            EntityKind::Role => locate_in(&t.roles, id, scope),
            EntityKind::Permission => locate_in(&t.permissions, id, scope),
        })
    }

    async fn execute_scoped_update(
        &self,
        kind: EntityKind,
        ids: &[i64],
        scope: Visibility,
        field: TrashedField,
    ) -> DomainResult<u64> {
        let mut t = self.write()?;
        Ok(match kind {
            EntityKind::User => update_in(&mut t.users, ids, scope, field),
            EntityKind::Role => update_in(&mut t.roles, ids, scope, field),
            EntityKind::Permission => update_in(&mut t.permissions, ids, scope, field),
        })
    }

    async fn execute_scoped_delete(&self, kind: EntityKind, ids: &[i64], scope: Visibility) -> DomainResult<u64> {
        Ok(self.write()?.purge(kind, ids, scope))
    }
}
