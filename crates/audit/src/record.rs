//! Audit record shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use gatehouse_auth::ActorRef;
use gatehouse_core::{AuditLogId, EntityKind, PrincipalId};

use crate::diff::compute_changed_fields;

/// The action names written to `audit_logs.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    SoftDelete,
    Restore,
    ForceDelete,
    SoftDeleteBulk,
    RestoreBulk,
    ForceDeleteBulk,
    Register,
    Login,
    Logout,
}

impl AuditAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::SoftDelete => "soft_delete",
            AuditAction::Restore => "restore",
            AuditAction::ForceDelete => "force_delete",
            AuditAction::SoftDeleteBulk => "soft_delete_bulk",
            AuditAction::RestoreBulk => "restore_bulk",
            AuditAction::ForceDeleteBulk => "force_delete_bulk",
            AuditAction::Register => "register",
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
        }
    }

    pub const fn is_bulk(self) -> bool {
        matches!(
            self,
            AuditAction::SoftDeleteBulk | AuditAction::RestoreBulk | AuditAction::ForceDeleteBulk
        )
    }
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request attributes captured alongside the record. All optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
}

/// Keep JSON objects, drop everything else.
pub fn as_json_object(value: Option<Value>) -> Option<Map<String, Value>> {
    match value {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// A record as handed to the sink, before an id and timestamp are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuditRecord {
    pub actor_id: Option<PrincipalId>,
    pub actor_email: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub before: Option<Map<String, Value>>,
    pub after: Option<Map<String, Value>>,
    pub context: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub meta: RequestMeta,
}

/// A persisted audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: AuditLogId,
    pub actor_id: Option<PrincipalId>,
    pub actor_email: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub before: Option<Map<String, Value>>,
    pub after: Option<Map<String, Value>>,
    pub context: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub meta: RequestMeta,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn from_new(id: AuditLogId, record: NewAuditRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            actor_id: record.actor_id,
            actor_email: record.actor_email,
            action: record.action,
            resource_type: record.resource_type,
            resource_id: record.resource_id,
            before: record.before,
            after: record.after,
            context: record.context,
            meta: record.meta,
            created_at,
        }
    }
}

/// Builder for one audit record.
///
/// The actor is always passed explicitly; `None` records a null actor.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    actor: Option<ActorRef>,
    action: String,
    resource_type: String,
    resource_id: String,
    before: Option<Value>,
    after: Option<Value>,
    context: Option<Value>,
    meta: RequestMeta,
}

impl AuditEntry {
    pub fn new(
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl ToString,
    ) -> Self {
        Self {
            actor: None,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.to_string(),
            before: None,
            after: None,
            context: None,
            meta: RequestMeta::default(),
        }
    }

    /// Entry for an action on one entity of `kind`.
    pub fn for_entity(action: AuditAction, kind: EntityKind, id: impl Into<i64>) -> Self {
        let id: i64 = id.into();
        Self::new(action.as_str(), kind.resource_type(), id)
    }

    /// Entry for a bulk action: resource id `0`, `after = {ids, affected}`.
    pub fn for_bulk(action: AuditAction, kind: EntityKind, ids: &[i64], affected: u64) -> Self {
        Self::new(action.as_str(), kind.resource_type(), 0)
            .after_value(json!({ "ids": ids, "affected": affected }))
    }

    pub fn actor(mut self, actor: Option<ActorRef>) -> Self {
        self.actor = actor;
        self
    }

    pub fn meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn before_value(mut self, before: Value) -> Self {
        self.before = Some(before);
        self
    }

    pub fn after_value(mut self, after: Value) -> Self {
        self.after = Some(after);
        self
    }

    pub fn context_value(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Snapshot `before` from any serializable value. A value that fails to
    /// serialize is recorded as null.
    pub fn before<T: Serialize + ?Sized>(self, before: &T) -> Self {
        match snapshot(before, "before") {
            Some(v) => self.before_value(v),
            None => self,
        }
    }

    pub fn after<T: Serialize + ?Sized>(self, after: &T) -> Self {
        match snapshot(after, "after") {
            Some(v) => self.after_value(v),
            None => self,
        }
    }

    /// Set `context = {component, operation}`.
    pub fn context(self, component: &str, operation: &str) -> Self {
        self.context_value(json!({ "component": component, "operation": operation }))
    }

    /// Add `changedFields` to the context, computed from the current
    /// before/after snapshots.
    pub fn with_changed_fields(mut self) -> Self {
        let changed = compute_changed_fields(
            self.before.as_ref().unwrap_or(&Value::Null),
            self.after.as_ref().unwrap_or(&Value::Null),
        );
        let mut context = match self.context.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        context.insert("changedFields".to_owned(), json!(changed));
        self.context = Some(Value::Object(context));
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Normalize into the shape handed to the sink.
    pub fn into_record(self) -> NewAuditRecord {
        let (actor_id, actor_email) = match self.actor {
            Some(actor) => (Some(actor.id), Some(actor.email)),
            None => (None, None),
        };
        NewAuditRecord {
            actor_id,
            actor_email,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            before: as_json_object(self.before),
            after: as_json_object(self.after),
            context: as_json_object(self.context),
            meta: self.meta,
        }
    }
}

fn snapshot<T: Serialize + ?Sized>(value: &T, side: &'static str) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(side, error = %err, "audit snapshot not serializable");
            None
        }
    }
}
