use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::{Span, instrument};

use gatehouse_core::{DomainResult, EntityKind, Visibility};
use gatehouse_lifecycle::{RowState, SoftDeleteStore, TrashedField};

use super::{PostgresStore, map_sqlx_error, push_visibility};

#[async_trait]
impl SoftDeleteStore for PostgresStore {
    #[instrument(skip(self), fields(table = kind.table()), err)]
    async fn locate(&self, kind: EntityKind, id: i64, scope: Visibility) -> DomainResult<Option<RowState>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT t.id, t.deleted_at FROM {} t WHERE t.id = ",
            kind.table()
        ));
        qb.push_bind(id);
        push_visibility(&mut qb, scope);

        let row = qb
            .build()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("locate", e))?;

        let Some(row) = row else { return Ok(None) };
        let decode = |e| map_sqlx_error("decode_locate", e);
        let deleted_at: Option<DateTime<Utc>> = row.try_get("deleted_at").map_err(decode)?;
        Ok(Some(RowState {
            id: row.try_get("id").map_err(decode)?,
            deleted_at,
        }))
    }

    /// One `UPDATE ... WHERE id = ANY($n)` statement.
    #[instrument(
        skip(self, ids),
        fields(table = kind.table(), requested = ids.len(), affected = tracing::field::Empty),
        err
    )]
    async fn execute_scoped_update(
        &self,
        kind: EntityKind,
        ids: &[i64],
        scope: Visibility,
        field: TrashedField,
    ) -> DomainResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("UPDATE {} AS t SET deleted_at = ", kind.table()));
        qb.push_bind(field.value())
            .push(" WHERE t.id = ANY(")
            .push_bind(ids.to_vec())
            .push(")");
        push_visibility(&mut qb, scope);

        let result = qb
            .build()
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("scoped_update", e))?;

        Span::current().record("affected", result.rows_affected());
        Ok(result.rows_affected())
    }

    #[instrument(
        skip(self, ids),
        fields(table = kind.table(), requested = ids.len(), affected = tracing::field::Empty),
        err
    )]
    async fn execute_scoped_delete(&self, kind: EntityKind, ids: &[i64], scope: Visibility) -> DomainResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("DELETE FROM {} AS t WHERE t.id = ANY(", kind.table()));
        qb.push_bind(ids.to_vec()).push(")");
        push_visibility(&mut qb, scope);

        let result = qb
            .build()
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("scoped_delete", e))?;

        Span::current().record("affected", result.rows_affected());
        Ok(result.rows_affected())
    }
}
