//! Persistence contract and failure reporting for audit records.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use gatehouse_core::{AuditLogId, DomainError};

use crate::record::NewAuditRecord;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditWriteError {
    #[error("audit record rejected: {0}")]
    Rejected(String),

    #[error("audit storage unavailable: {0}")]
    Unavailable(String),
}

impl From<DomainError> for AuditWriteError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Storage(msg) => AuditWriteError::Unavailable(msg),
            other => AuditWriteError::Rejected(other.to_string()),
        }
    }
}

/// Append-only audit storage.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn persist_audit_record(&self, record: NewAuditRecord) -> Result<AuditLogId, AuditWriteError>;
}

#[async_trait]
impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    async fn persist_audit_record(&self, record: NewAuditRecord) -> Result<AuditLogId, AuditWriteError> {
        (**self).persist_audit_record(record).await
    }
}

/// Out-of-band channel for audit write failures.
pub trait AuditErrorReporter: Send + Sync {
    fn report(&self, error: &AuditWriteError, record: &NewAuditRecord);
}

/// Default reporter: one `error!` event per failed write.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl AuditErrorReporter for TracingReporter {
    fn report(&self, error: &AuditWriteError, record: &NewAuditRecord) {
        tracing::error!(
            error = %error,
            action = %record.action,
            resource_type = %record.resource_type,
            resource_id = %record.resource_id,
            actor_id = ?record.actor_id,
            "failed to persist audit record"
        );
    }
}
