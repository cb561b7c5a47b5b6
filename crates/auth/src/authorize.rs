//! The authorization guard.
//!
//! Two decisions are made here:
//! - `authorize`: does the actor hold every required slug (AND semantics)?
//! - `authorize_grant`: is everything the actor is about to grant already
//!   held by the actor (no privilege escalation)?
//!
//! Both only read.

use thiserror::Error;
use tracing::instrument;

use gatehouse_core::{DomainError, PrincipalId, Slug};

use crate::grants::GrantSource;
use crate::resolver::{EffectiveSlugs, resolve_effective_slugs};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// Plain denial. `missing` is kept for operator logs only; the message
    /// shown to callers does not name it.
    #[error("insufficient permissions to access this resource")]
    InsufficientPermission { missing: Vec<Slug> },

    /// Grant escalation. The disallowed slugs are disclosed.
    #[error("cannot grant permissions you do not possess")]
    GrantEscalation { disallowed: Vec<Slug> },

    /// Resolving the actor's grants failed.
    #[error(transparent)]
    Source(#[from] DomainError),
}

impl From<AuthzError> for DomainError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::InsufficientPermission { .. } => DomainError::InsufficientPermission,
            AuthzError::GrantEscalation { disallowed } => DomainError::GrantEscalation {
                disallowed: disallowed.into_iter().map(|s| s.to_string()).collect(),
            },
            AuthzError::Source(e) => e,
        }
    }
}

/// Command-side authorization contract.
///
/// Implement this on actions that require permissions; the guard checks them
/// before the action touches storage.
pub trait RequiresPermissions {
    fn required_permissions(&self) -> &[Slug];
}

/// Pure check of `required ⊆ effective`.
pub fn check_required(effective: &EffectiveSlugs, required: &[Slug]) -> Result<(), AuthzError> {
    let missing = effective.missing(required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AuthzError::InsufficientPermission { missing })
    }
}

/// Pure check of `requested ⊆ effective`, reporting `requested \ effective`.
pub fn check_grant(effective: &EffectiveSlugs, requested: &[Slug]) -> Result<(), AuthzError> {
    let disallowed = effective.missing(requested);
    if disallowed.is_empty() {
        Ok(())
    } else {
        Err(AuthzError::GrantEscalation { disallowed })
    }
}

/// Authorize `actor` for an action requiring every slug in `required`.
///
/// An empty requirement allows without touching storage (being authenticated
/// is enough).
#[instrument(skip(source, required), fields(actor = %actor, required = required.len()))]
pub async fn authorize<S>(source: &S, actor: PrincipalId, required: &[Slug]) -> Result<(), AuthzError>
where
    S: GrantSource + ?Sized,
{
    if required.is_empty() {
        return Ok(());
    }

    let effective = resolve_effective_slugs(source, actor).await?;
    let decision = check_required(&effective, required);
    if let Err(AuthzError::InsufficientPermission { missing }) = &decision {
        tracing::debug!(missing = ?missing, "authorization denied");
    }
    decision
}

/// Authorize `actor` to grant every slug in `requested` to someone else.
#[instrument(skip(source, requested), fields(actor = %actor, requested = requested.len()))]
pub async fn authorize_grant<S>(
    source: &S,
    actor: PrincipalId,
    requested: &[Slug],
) -> Result<(), AuthzError>
where
    S: GrantSource + ?Sized,
{
    if requested.is_empty() {
        return Ok(());
    }

    let effective = resolve_effective_slugs(source, actor).await?;
    let decision = check_grant(&effective, requested);
    if let Err(AuthzError::GrantEscalation { disallowed }) = &decision {
        tracing::info!(disallowed = ?disallowed, "grant escalation rejected");
    }
    decision
}

/// Guard bound to one grant source.
#[derive(Debug, Clone)]
pub struct AccessGuard<S> {
    source: S,
}

impl<S> AccessGuard<S>
where
    S: GrantSource,
{
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub async fn effective_slugs(&self, actor: PrincipalId) -> Result<EffectiveSlugs, DomainError> {
        resolve_effective_slugs(&self.source, actor).await
    }

    pub async fn authorize(&self, actor: PrincipalId, required: &[Slug]) -> Result<(), AuthzError> {
        authorize(&self.source, actor, required).await
    }

    pub async fn authorize_action<A>(&self, actor: PrincipalId, action: &A) -> Result<(), AuthzError>
    where
        A: RequiresPermissions + ?Sized,
    {
        authorize(&self.source, actor, action.required_permissions()).await
    }

    pub async fn authorize_grant(&self, actor: PrincipalId, requested: &[Slug]) -> Result<(), AuthzError> {
        authorize_grant(&self.source, actor, requested).await
    }
}
