//! Audit trail reads.

use gatehouse_audit::{AuditLogQuery, AuditRecord};
use gatehouse_core::{AuditLogId, DomainError, DomainResult, Page};

use crate::actions::AdminAction;
use crate::caller::Caller;
use crate::service::{AdminService, Backend};

impl<B: Backend> AdminService<B> {
    pub async fn list_audit_logs(&self, caller: &Caller, query: &AuditLogQuery) -> DomainResult<Page<AuditRecord>> {
        self.require(caller, AdminAction::ListAuditLogs).await?;
        self.store.list_audit_logs(query).await
    }

    pub async fn show_audit_log(&self, caller: &Caller, id: AuditLogId) -> DomainResult<AuditRecord> {
        self.require(caller, AdminAction::ShowAuditLog).await?;
        self.store
            .find_audit_log(id)
            .await?
            .ok_or_else(|| DomainError::not_found("AuditLog", id))
    }
}
