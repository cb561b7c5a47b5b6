//! Read side of the audit trail.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gatehouse_core::{AuditLogId, DomainResult, Page, PageRequest, PrincipalId, SortOrder};

use crate::record::AuditRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditSort {
    #[default]
    CreatedAt,
    Action,
    ResourceType,
    ResourceId,
    ActorEmail,
    Method,
    Path,
    Ip,
}

impl AuditSort {
    /// Unknown keys fall back to `createdAt`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim() {
            "action" => Self::Action,
            "resourceType" => Self::ResourceType,
            "resourceId" => Self::ResourceId,
            "actorEmail" => Self::ActorEmail,
            "method" => Self::Method,
            "path" => Self::Path,
            "ip" => Self::Ip,
            _ => Self::CreatedAt,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Action => "action",
            Self::ResourceType => "resource_type",
            Self::ResourceId => "resource_id",
            Self::ActorEmail => "actor_email",
            Self::Method => "method",
            Self::Path => "path",
            Self::Ip => "ip",
        }
    }

    /// Ascending comparison on this key, ties broken by id.
    pub fn compare(self, a: &AuditRecord, b: &AuditRecord) -> Ordering {
        let primary = match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::Action => a.action.cmp(&b.action),
            Self::ResourceType => a.resource_type.cmp(&b.resource_type),
            Self::ResourceId => a.resource_id.cmp(&b.resource_id),
            Self::ActorEmail => a.actor_email.cmp(&b.actor_email),
            Self::Method => a.meta.method.cmp(&b.meta.method),
            Self::Path => a.meta.path.cmp(&b.meta.path),
            Self::Ip => a.meta.ip.cmp(&b.meta.ip),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    /// Case-insensitive substring over the textual columns.
    pub search: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub action: Option<String>,
    pub actor_id: Option<PrincipalId>,
    /// Case-insensitive substring.
    pub actor_email: Option<String>,
    pub sort: AuditSort,
    pub order: SortOrder,
    pub page: PageRequest,
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

fn normalized(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

impl AuditLogQuery {
    pub fn search_term(&self) -> Option<String> {
        normalized(&self.search)
    }

    pub fn actor_email_term(&self) -> Option<String> {
        normalized(&self.actor_email)
    }

    /// In-process evaluation of the filters, for stores without a query engine.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(term) = self.search_term() {
            let hit = [
                Some(record.action.as_str()),
                Some(record.resource_type.as_str()),
                Some(record.resource_id.as_str()),
                record.actor_email.as_deref(),
                record.meta.ip.as_deref(),
                record.meta.user_agent.as_deref(),
                record.meta.method.as_deref(),
                record.meta.path.as_deref(),
            ]
            .into_iter()
            .any(|field| contains_ci(field, &term));
            if !hit {
                return false;
            }
        }
        if self.resource_type.as_ref().is_some_and(|t| *t != record.resource_type) {
            return false;
        }
        if self.resource_id.as_ref().is_some_and(|r| *r != record.resource_id) {
            return false;
        }
        if self.action.as_ref().is_some_and(|a| *a != record.action) {
            return false;
        }
        if self.actor_id.is_some_and(|id| Some(id) != record.actor_id) {
            return false;
        }
        if let Some(term) = self.actor_email_term() {
            if !contains_ci(record.actor_email.as_deref(), &term) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait AuditLogReader: Send + Sync {
    async fn list_audit_logs(&self, query: &AuditLogQuery) -> DomainResult<Page<AuditRecord>>;

    async fn find_audit_log(&self, id: AuditLogId) -> DomainResult<Option<AuditRecord>>;
}

#[async_trait]
impl<S> AuditLogReader for Arc<S>
where
    S: AuditLogReader + ?Sized,
{
    async fn list_audit_logs(&self, query: &AuditLogQuery) -> DomainResult<Page<AuditRecord>> {
        (**self).list_audit_logs(query).await
    }

    async fn find_audit_log(&self, id: AuditLogId) -> DomainResult<Option<AuditRecord>> {
        (**self).find_audit_log(id).await
    }
}
