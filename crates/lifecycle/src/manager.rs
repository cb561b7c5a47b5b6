//! Trash / restore / force-delete for any soft-deletable entity.

use chrono::Utc;
use tracing::instrument;

use gatehouse_core::{DomainError, DomainResult, Entity, EntityKind, Visibility};

use crate::bulk::BulkIds;
use crate::store::{RowState, SoftDeleteStore, TrashedField};

/// Lifecycle manager bound to one entity table.
#[derive(Debug, Clone)]
pub struct LifecycleManager<S> {
    store: S,
    kind: EntityKind,
}

impl<S> LifecycleManager<S>
where
    S: SoftDeleteStore,
{
    pub fn new(store: S, kind: EntityKind) -> Self {
        Self { store, kind }
    }

    pub fn for_entity<E: Entity>(store: S) -> Self {
        Self::new(store, E::KIND)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    fn not_found(&self, id: i64) -> DomainError {
        DomainError::not_found(self.kind.resource_type(), id)
    }

    /// Move an active row to the trash.
    ///
    /// Already-trashed rows are invisible to the default scope and therefore
    /// `NotFound`.
    #[instrument(skip(self, id), fields(kind = %self.kind, id = tracing::field::Empty), err)]
    pub async fn trash(&self, id: impl Into<i64>) -> DomainResult<RowState> {
        let id = id.into();
        tracing::Span::current().record("id", id);

        let row = self
            .store
            .locate(self.kind, id, Visibility::Active)
            .await?
            .ok_or_else(|| self.not_found(id))?;

        let now = Utc::now();
        let affected = self
            .store
            .execute_scoped_update(self.kind, &[row.id], Visibility::Active, TrashedField::Set(now))
            .await?;
        if affected == 0 {
            // Trashed or purged concurrently between locate and update.
            return Err(self.not_found(id));
        }

        Ok(RowState {
            id: row.id,
            deleted_at: Some(now),
        })
    }

    /// Bring a trashed row back. Restoring an active row succeeds without a write.
    #[instrument(skip(self, id), fields(kind = %self.kind, id = tracing::field::Empty), err)]
    pub async fn restore(&self, id: impl Into<i64>) -> DomainResult<RowState> {
        let id = id.into();
        tracing::Span::current().record("id", id);

        let row = self
            .store
            .locate(self.kind, id, Visibility::WithTrashed)
            .await?
            .ok_or_else(|| self.not_found(id))?;

        if !row.is_trashed() {
            tracing::debug!("restore of active row is a no-op");
            return Ok(row);
        }

        self.store
            .execute_scoped_update(self.kind, &[row.id], Visibility::WithTrashed, TrashedField::Clear)
            .await?;

        Ok(RowState {
            id: row.id,
            deleted_at: None,
        })
    }

    /// Remove a row permanently, whether it is active or trashed.
    ///
    /// Returns the state the row had before removal.
    #[instrument(skip(self, id), fields(kind = %self.kind, id = tracing::field::Empty), err)]
    pub async fn force_delete(&self, id: impl Into<i64>) -> DomainResult<RowState> {
        let id = id.into();
        tracing::Span::current().record("id", id);

        let row = self
            .store
            .locate(self.kind, id, Visibility::WithTrashed)
            .await?
            .ok_or_else(|| self.not_found(id))?;

        let affected = self
            .store
            .execute_scoped_delete(self.kind, &[row.id], Visibility::WithTrashed)
            .await?;
        if affected == 0 {
            return Err(self.not_found(id));
        }

        Ok(row)
    }

    /// Trash every matching row in one statement. Rows already in the trash
    /// get a fresh timestamp and are counted.
    #[instrument(skip(self, ids), fields(kind = %self.kind, requested = ids.len()), err)]
    pub async fn bulk_trash(&self, ids: &BulkIds) -> DomainResult<u64> {
        let affected = self
            .store
            .execute_scoped_update(
                self.kind,
                ids.as_slice(),
                Visibility::WithTrashed,
                TrashedField::Set(Utc::now()),
            )
            .await?;
        tracing::info!(affected, "bulk trash");
        Ok(affected)
    }

    #[instrument(skip(self, ids), fields(kind = %self.kind, requested = ids.len()), err)]
    pub async fn bulk_restore(&self, ids: &BulkIds) -> DomainResult<u64> {
        let affected = self
            .store
            .execute_scoped_update(self.kind, ids.as_slice(), Visibility::WithTrashed, TrashedField::Clear)
            .await?;
        tracing::info!(affected, "bulk restore");
        Ok(affected)
    }

    #[instrument(skip(self, ids), fields(kind = %self.kind, requested = ids.len()), err)]
    pub async fn bulk_force_delete(&self, ids: &BulkIds) -> DomainResult<u64> {
        let affected = self
            .store
            .execute_scoped_delete(self.kind, ids.as_slice(), Visibility::WithTrashed)
            .await?;
        tracing::info!(affected, "bulk force delete");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;

    /// Single-table fake; the kind argument is ignored.
    #[derive(Default)]
    struct Rows(Mutex<BTreeMap<i64, Option<DateTime<Utc>>>>);

    impl Rows {
        fn with_active(ids: &[i64]) -> Self {
            Self(Mutex::new(ids.iter().map(|id| (*id, None)).collect()))
        }

        fn state(&self, id: i64) -> Option<Option<DateTime<Utc>>> {
            self.0.lock().unwrap().get(&id).copied()
        }
    }

    #[async_trait]
    impl SoftDeleteStore for Rows {
        async fn locate(&self, _: EntityKind, id: i64, scope: Visibility) -> DomainResult<Option<RowState>> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .get(&id)
                .filter(|d| scope.admits(**d))
                .map(|d| RowState { id, deleted_at: *d }))
        }

        async fn execute_scoped_update(
            &self,
            _: EntityKind,
            ids: &[i64],
            scope: Visibility,
            field: TrashedField,
        ) -> DomainResult<u64> {
            let mut rows = self.0.lock().unwrap();
            let mut n = 0;
            for id in ids {
                if let Some(d) = rows.get_mut(id).filter(|d| scope.admits(**d)) {
                    *d = field.value();
                    n += 1;
                }
            }
            Ok(n)
        }

        async fn execute_scoped_delete(&self, _: EntityKind, ids: &[i64], scope: Visibility) -> DomainResult<u64> {
            let mut rows = self.0.lock().unwrap();
            let mut n = 0;
            for id in ids {
                if rows.get(id).is_some_and(|d| scope.admits(*d)) {
                    rows.remove(id);
                    n += 1;
                }
            }
            Ok(n)
        }
    }

    fn manager(ids: &[i64]) -> LifecycleManager<Rows> {
        LifecycleManager::new(Rows::with_active(ids), EntityKind::Role)
    }

    #[tokio::test]
    async fn trash_then_restore_round_trips_visibility() {
        let m = manager(&[1]);

        let trashed = m.trash(1).await.unwrap();
        assert!(trashed.is_trashed());
        assert!(m.store.locate(EntityKind::Role, 1, Visibility::Active).await.unwrap().is_none());
        assert!(m.store.locate(EntityKind::Role, 1, Visibility::OnlyTrashed).await.unwrap().is_some());

        let restored = m.restore(1).await.unwrap();
        assert!(!restored.is_trashed());
        assert_eq!(m.store.state(1), Some(None));
    }

    #[tokio::test]
    async fn trashing_twice_is_not_found() {
        let m = manager(&[1]);
        m.trash(1).await.unwrap();
        let err = m.trash(1).await.unwrap_err();
        assert_eq!(err, DomainError::not_found("Role", 1));
    }

    #[tokio::test]
    async fn restore_of_active_row_is_noop_success() {
        let m = manager(&[4]);
        let state = m.restore(4).await.unwrap();
        assert_eq!(state, RowState { id: 4, deleted_at: None });
    }

    #[tokio::test]
    async fn restore_and_force_delete_of_unknown_id_are_not_found() {
        let m = manager(&[]);
        assert!(matches!(m.restore(9).await, Err(DomainError::NotFound { .. })));
        assert!(matches!(m.force_delete(9).await, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn force_delete_reaches_trashed_rows() {
        let m = manager(&[2]);
        m.trash(2).await.unwrap();
        let before = m.force_delete(2).await.unwrap();
        assert!(before.is_trashed());
        assert_eq!(m.store.state(2), None);
    }

    #[tokio::test]
    async fn bulk_trash_counts_matched_ids_on_every_call() {
        let m = manager(&[1, 2, 3]);
        let ids = BulkIds::new([1, 2, 99]).unwrap();

        assert_eq!(m.bulk_trash(&ids).await.unwrap(), 2);
        let first = m.store.state(1).flatten();
        assert_eq!(m.bulk_trash(&ids).await.unwrap(), 2);
        assert!(m.store.state(1).flatten() >= first);
        assert_eq!(m.store.state(3), Some(None));
    }

    #[tokio::test]
    async fn bulk_restore_and_force_delete_span_both_states() {
        let m = manager(&[1, 2, 3]);
        m.trash(1).await.unwrap();

        let ids = BulkIds::new([1, 2]).unwrap();
        assert_eq!(m.bulk_restore(&ids).await.unwrap(), 2);
        assert_eq!(m.store.state(1), Some(None));

        m.trash(2).await.unwrap();
        assert_eq!(m.bulk_force_delete(&ids).await.unwrap(), 2);
        assert_eq!(m.store.state(1), None);
        assert_eq!(m.store.state(2), None);
        assert_eq!(m.store.state(3), Some(None));
    }
}
