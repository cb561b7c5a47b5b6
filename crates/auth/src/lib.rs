//! `gatehouse-auth` — principals, roles, permissions and the authorization guard.
//!
//! This crate is intentionally decoupled from HTTP and storage: it defines the
//! storage contracts it needs (`GrantSource`, the directory traits) and the
//! decision procedures built on top of them.

pub mod authorize;
pub mod catalog;
pub mod directory;
pub mod grants;
pub mod permissions;
pub mod principal;
pub mod resolver;
pub mod roles;

pub use authorize::{AccessGuard, AuthzError, RequiresPermissions, authorize, authorize_grant};
pub use directory::{
    DirectoryQuery, PermissionCatalog, PermissionSort, RoleDirectory, RoleSort, UserDirectory,
    UserSort,
};
pub use grants::{GrantChange, GrantSource, GrantStore};
pub use permissions::{NewPermission, Permission, PermissionChanges};
pub use principal::{ActorRef, NewPrincipal, Principal, PrincipalChanges};
pub use resolver::{EffectiveSlugs, resolve_effective_slugs};
pub use roles::{NewRole, Role, RoleChanges};
