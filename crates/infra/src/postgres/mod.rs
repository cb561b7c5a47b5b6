//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | DomainError |
//! |------------|-----------------|-------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Validation` |
//! | Database (check violation) | `23514` | `Validation` |
//! | Database (other), PoolClosed, anything else | | `Storage` |
//!
//! ## Visibility
//!
//! Every read of `users`, `roles` and `permissions` appends the predicate of
//! the requested `Visibility`. Relation loads used for permission resolution
//! always use the active scope.

mod audit;
mod directory;
mod grants;
mod lifecycle;
mod rows;

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{Span, instrument};

use gatehouse_core::{DomainError, DomainResult, Visibility};

const SCHEMA: &str = include_str!("schema.sql");

/// Postgres implementation of every storage contract.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; the store can be
/// shared behind an `Arc` across tasks.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    #[instrument(skip(url), err)]
    pub async fn connect(url: &str, max_connections: u32) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the schema. Idempotent.
    #[instrument(skip(self), fields(operation = tracing::field::Empty), err)]
    pub async fn migrate(&self) -> DomainResult<()> {
        Span::current().record("operation", "migrate");
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => DomainError::Conflict(msg),
                Some("23503") | Some("23514") => DomainError::Validation(msg),
                _ => DomainError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => DomainError::storage(format!("connection pool closed in {operation}")),
        other => DomainError::storage(format!("sqlx error in {operation}: {other}")),
    }
}

/// `ILIKE` pattern matching `term` as a literal substring.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Append ` AND <visibility predicate>` for alias `t`.
fn push_visibility(qb: &mut QueryBuilder<'_, Postgres>, visibility: Visibility) {
    if let Some(predicate) = visibility.sql_predicate("t") {
        qb.push(" AND ").push(predicate);
    }
}

/// Append ` AND (c1 ILIKE $n OR c2 ILIKE $m ...)` when a search term is set.
fn push_search(qb: &mut QueryBuilder<'_, Postgres>, term: Option<&str>, columns: &[&str]) {
    let Some(term) = term else { return };
    let pattern = like_pattern(term);
    qb.push(" AND (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push(format!("COALESCE({column}, '') ILIKE "))
            .push_bind(pattern.clone());
    }
    qb.push(")");
}
