//! Storage contract for soft-delete transitions.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gatehouse_core::{DomainResult, EntityKind, Visibility};

/// Minimal view of a row as far as its lifecycle is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowState {
    pub id: i64,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RowState {
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// The value written to `deleted_at` by a scoped update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrashedField {
    Set(DateTime<Utc>),
    Clear,
}

impl TrashedField {
    pub fn value(self) -> Option<DateTime<Utc>> {
        match self {
            TrashedField::Set(at) => Some(at),
            TrashedField::Clear => None,
        }
    }
}

/// Row-level operations the lifecycle manager needs from storage.
///
/// Each scoped operation is a single atomic statement; ids that do not match
/// the scope are silently excluded from the affected count.
#[async_trait]
pub trait SoftDeleteStore: Send + Sync {
    async fn locate(
        &self,
        kind: EntityKind,
        id: i64,
        scope: Visibility,
    ) -> DomainResult<Option<RowState>>;

    async fn execute_scoped_update(
        &self,
        kind: EntityKind,
        ids: &[i64],
        scope: Visibility,
        field: TrashedField,
    ) -> DomainResult<u64>;

    async fn execute_scoped_delete(
        &self,
        kind: EntityKind,
        ids: &[i64],
        scope: Visibility,
    ) -> DomainResult<u64>;
}

#[async_trait]
impl<S> SoftDeleteStore for Arc<S>
where
    S: SoftDeleteStore + ?Sized,
{
    async fn locate(
        &self,
        kind: EntityKind,
        id: i64,
        scope: Visibility,
    ) -> DomainResult<Option<RowState>> {
        (**self).locate(kind, id, scope).await
    }

    async fn execute_scoped_update(
        &self,
        kind: EntityKind,
        ids: &[i64],
        scope: Visibility,
        field: TrashedField,
    ) -> DomainResult<u64> {
        (**self).execute_scoped_update(kind, ids, scope, field).await
    }

    async fn execute_scoped_delete(
        &self,
        kind: EntityKind,
        ids: &[i64],
        scope: Visibility,
    ) -> DomainResult<u64> {
        (**self).execute_scoped_delete(kind, ids, scope).await
    }
}
