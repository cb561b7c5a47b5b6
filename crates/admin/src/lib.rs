//! `gatehouse-admin` — administrative actions over users, roles, permissions
//! and the audit trail.
//!
//! Every action follows the same path: authorize the caller, validate, run the
//! mutation (through the lifecycle manager where it is a state transition),
//! then record an audit entry keyed to the action.

pub mod account;
pub mod actions;
pub mod audit_logs;
pub mod caller;
pub mod permissions;
pub mod roles;
pub mod seed;
pub mod service;
pub mod users;
pub mod views;

pub use actions::AdminAction;
pub use caller::Caller;
pub use roles::{CreateRole, UpdateRole};
pub use seed::{ADMIN_ROLE, SeedReport, USER_ROLE, seed_defaults};
pub use service::{AdminService, Backend};
pub use users::{CreateUser, UpdateUser};
pub use views::{RoleView, UserGrants, UserView};
