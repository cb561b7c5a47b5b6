//! Self-service account events: sign-up, sign-in, sign-out and the caller's
//! own profile. Credentials and tokens are the host's concern; these only
//! gate and audit.

use serde_json::json;
use tracing::instrument;

use gatehouse_audit::{AuditAction, AuditEntry, RequestMeta};
use gatehouse_auth::{ActorRef, NewPrincipal, Principal};
use gatehouse_core::{DomainError, DomainResult, EntityKind, Visibility};

use crate::actions::AdminAction;
use crate::caller::Caller;
use crate::service::{AdminService, Backend, to_json};
use crate::views::UserView;

const COMPONENT: &str = "auth";
const AUTH_RESOURCE: &str = "Auth";

impl<B: Backend> AdminService<B> {
    /// Self-service sign-up. No permission is required; the new principal is
    /// recorded as the actor.
    #[instrument(skip(self, meta, account), err)]
    pub async fn register(&self, meta: RequestMeta, account: NewPrincipal) -> DomainResult<Principal> {
        let user = self.store.create_user(account).await?;
        self.audit(
            AuditEntry::for_entity(AuditAction::Register, EntityKind::User, user.id)
                .actor(Some(user.actor_ref()))
                .meta(meta)
                .after_value(to_json(&user))
                .context(COMPONENT, "register"),
        )
        .await;
        Ok(user)
    }

    /// The caller's own profile. Being authenticated is enough.
    pub async fn me(&self, caller: &Caller) -> DomainResult<UserView> {
        self.require(caller, AdminAction::Me).await?;
        self.user_view(caller.principal_id, Visibility::Active)
            .await?
            .ok_or_else(|| DomainError::not_found("User", caller.principal_id))
    }

    /// Audit a successful sign-in by `actor`.
    pub async fn record_login(&self, actor: ActorRef, meta: RequestMeta) {
        let entry = AuditEntry::new(AuditAction::Login.as_str(), AUTH_RESOURCE, actor.id)
            .after_value(json!({ "email": actor.email }))
            .context(COMPONENT, "login");
        self.audit(entry.actor(Some(actor)).meta(meta)).await;
    }

    /// Audit a sign-out by `actor`.
    pub async fn record_logout(&self, actor: ActorRef, meta: RequestMeta) {
        let entry = AuditEntry::new(AuditAction::Logout.as_str(), AUTH_RESOURCE, actor.id)
            .before_value(json!({ "email": actor.email }))
            .context(COMPONENT, "logout");
        self.audit(entry.actor(Some(actor)).meta(meta)).await;
    }
}
