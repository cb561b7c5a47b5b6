use gatehouse_audit::RequestMeta;
use gatehouse_auth::ActorRef;
use gatehouse_core::PrincipalId;

/// The authenticated principal invoking an action, with its request
/// attributes. Passed explicitly to every action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub principal_id: PrincipalId,
    pub email: String,
    pub meta: RequestMeta,
}

impl Caller {
    pub fn new(principal_id: PrincipalId, email: impl Into<String>) -> Self {
        Self {
            principal_id,
            email: email.into(),
            meta: RequestMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn actor(&self) -> ActorRef {
        ActorRef {
            id: self.principal_id,
            email: self.email.clone(),
        }
    }
}
