//! Read shapes returned by actions and snapshotted into audit rows.

use serde::Serialize;

use gatehouse_auth::{Principal, Role};
use gatehouse_core::Slug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(flatten)]
    pub user: Principal,
    pub permissions: Vec<Slug>,
    pub roles: Vec<Slug>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Slug>,
}

/// A principal's grants: direct, by role membership, and the effective union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGrants {
    pub direct: Vec<Slug>,
    pub roles: Vec<Slug>,
    pub effective: Vec<Slug>,
}
