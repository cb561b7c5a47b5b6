use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use tracing::instrument;

use gatehouse_audit::{
    AuditLogQuery, AuditLogReader, AuditRecord, AuditSink, AuditWriteError, NewAuditRecord,
};
use gatehouse_core::{AuditLogId, DomainResult, Page};

use super::rows::{AUDIT_COLUMNS, AuditRow};
use super::{PostgresStore, like_pattern, map_sqlx_error, push_search};

const SEARCHABLE: &[&str] = &[
    "t.action",
    "t.resource_type",
    "t.resource_id",
    "t.actor_email",
    "t.ip",
    "t.user_agent",
    "t.method",
    "t.path",
];

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &AuditLogQuery) {
    push_search(qb, query.search_term().as_deref(), SEARCHABLE);
    if let Some(resource_type) = &query.resource_type {
        qb.push(" AND t.resource_type = ").push_bind(resource_type.clone());
    }
    if let Some(resource_id) = &query.resource_id {
        qb.push(" AND t.resource_id = ").push_bind(resource_id.clone());
    }
    if let Some(action) = &query.action {
        qb.push(" AND t.action = ").push_bind(action.clone());
    }
    if let Some(actor_id) = query.actor_id {
        qb.push(" AND t.actor_id = ").push_bind(actor_id.get());
    }
    if let Some(email) = query.actor_email_term() {
        qb.push(" AND t.actor_email ILIKE ").push_bind(like_pattern(&email));
    }
}

#[async_trait]
impl AuditSink for PostgresStore {
    #[instrument(skip(self, record), fields(action = %record.action, resource_type = %record.resource_type), err)]
    async fn persist_audit_record(&self, record: NewAuditRecord) -> Result<AuditLogId, AuditWriteError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO audit_logs (
                actor_id, actor_email, action, resource_type, resource_id,
                before, after, context, ip, user_agent, method, path
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(record.actor_id.map(|id| id.get()))
        .bind(&record.actor_email)
        .bind(&record.action)
        .bind(&record.resource_type)
        .bind(&record.resource_id)
        .bind(record.before.map(Value::Object))
        .bind(record.after.map(Value::Object))
        .bind(record.context.map(Value::Object))
        .bind(&record.meta.ip)
        .bind(&record.meta.user_agent)
        .bind(&record.meta.method)
        .bind(&record.meta.path)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| AuditWriteError::from(map_sqlx_error("persist_audit_record", e)))?;

        Ok(AuditLogId::new(id))
    }
}

#[async_trait]
impl AuditLogReader for PostgresStore {
    #[instrument(skip(self, query), err)]
    async fn list_audit_logs(&self, query: &AuditLogQuery) -> DomainResult<Page<AuditRecord>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_logs t WHERE 1=1");
        push_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_audit_logs", e))?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {AUDIT_COLUMNS} FROM audit_logs t WHERE 1=1"));
        push_filters(&mut select, query);
        let order = query.order.as_sql();
        select
            .push(format!(" ORDER BY t.{} {order}, t.id {order} LIMIT ", query.sort.column()))
            .push_bind(i64::from(query.page.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.page.offset()).unwrap_or(i64::MAX));

        let rows = select
            .build_query_as::<AuditRow>()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_audit_logs", e))?;

        Ok(Page::new(
            rows.into_iter().map(|r| r.0).collect(),
            u64::try_from(total).unwrap_or(0),
            query.page,
        ))
    }

    #[instrument(skip(self), err)]
    async fn find_audit_log(&self, id: AuditLogId) -> DomainResult<Option<AuditRecord>> {
        let row = sqlx::query_as::<_, AuditRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs t WHERE t.id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_audit_log", e))?;
        Ok(row.map(|r| r.0))
    }
}
