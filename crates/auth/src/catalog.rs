//! Well-known permission slugs and the default catalog.
//!
//! Admin actions refer to these constants; the seeding binary installs
//! `DEFAULT_PERMISSIONS` so a fresh store has something to grant.

use gatehouse_core::Slug;

pub mod users {
    use super::Slug;

    pub const LIST: Slug = Slug::from_static("users.list");
    pub const READ: Slug = Slug::from_static("users.read");
    pub const CREATE: Slug = Slug::from_static("users.create");
    pub const UPDATE: Slug = Slug::from_static("users.update");
    pub const DELETE: Slug = Slug::from_static("users.delete");
    pub const RESTORE: Slug = Slug::from_static("users.restore");
    pub const FORCE_DELETE: Slug = Slug::from_static("users.force_delete");
    pub const BULK_DELETE: Slug = Slug::from_static("users.bulk_delete");
    pub const BULK_RESTORE: Slug = Slug::from_static("users.bulk_restore");
    pub const BULK_FORCE_DELETE: Slug = Slug::from_static("users.bulk_force_delete");
    pub const PERMISSIONS_READ: Slug = Slug::from_static("users.permissions.read");
    pub const PERMISSIONS_MANAGE: Slug = Slug::from_static("users.permissions.manage");
    pub const ROLES_MANAGE: Slug = Slug::from_static("users.roles.manage");
}

pub mod roles {
    use super::Slug;

    pub const LIST: Slug = Slug::from_static("roles.list");
    pub const READ: Slug = Slug::from_static("roles.read");
    pub const CREATE: Slug = Slug::from_static("roles.create");
    pub const UPDATE: Slug = Slug::from_static("roles.update");
    pub const DELETE: Slug = Slug::from_static("roles.delete");
    pub const RESTORE: Slug = Slug::from_static("roles.restore");
    pub const FORCE_DELETE: Slug = Slug::from_static("roles.force_delete");
    pub const BULK_DELETE: Slug = Slug::from_static("roles.bulk_delete");
    pub const BULK_RESTORE: Slug = Slug::from_static("roles.bulk_restore");
    pub const BULK_FORCE_DELETE: Slug = Slug::from_static("roles.bulk_force_delete");
}

pub mod permissions {
    use super::Slug;

    pub const LIST: Slug = Slug::from_static("permissions.list");
    pub const READ: Slug = Slug::from_static("permissions.read");
    pub const CREATE: Slug = Slug::from_static("permissions.create");
    pub const UPDATE: Slug = Slug::from_static("permissions.update");
    pub const DELETE: Slug = Slug::from_static("permissions.delete");
    pub const RESTORE: Slug = Slug::from_static("permissions.restore");
    pub const FORCE_DELETE: Slug = Slug::from_static("permissions.force_delete");
    pub const BULK_DELETE: Slug = Slug::from_static("permissions.bulk_delete");
    pub const BULK_RESTORE: Slug = Slug::from_static("permissions.bulk_restore");
    pub const BULK_FORCE_DELETE: Slug = Slug::from_static("permissions.bulk_force_delete");
}

pub mod audit_logs {
    use super::Slug;

    pub const LIST: Slug = Slug::from_static("audit_logs.list");
    pub const READ: Slug = Slug::from_static("audit_logs.read");
}

/// `(display name, slug)` pairs installed by the seeder.
pub const DEFAULT_PERMISSIONS: &[(&str, Slug)] = &[
    ("List Users", users::LIST),
    ("Read User", users::READ),
    ("Create User", users::CREATE),
    ("Update User", users::UPDATE),
    ("Delete User", users::DELETE),
    ("Restore User", users::RESTORE),
    ("Force Delete User", users::FORCE_DELETE),
    ("Bulk Delete Users", users::BULK_DELETE),
    ("Bulk Restore Users", users::BULK_RESTORE),
    ("Bulk Force Delete Users", users::BULK_FORCE_DELETE),
    ("Read User Permissions", users::PERMISSIONS_READ),
    ("Manage User Permissions", users::PERMISSIONS_MANAGE),
    ("Manage User Roles", users::ROLES_MANAGE),
    ("List Roles", roles::LIST),
    ("Read Role", roles::READ),
    ("Create Role", roles::CREATE),
    ("Update Role", roles::UPDATE),
    ("Delete Role", roles::DELETE),
    ("Restore Role", roles::RESTORE),
    ("Force Delete Role", roles::FORCE_DELETE),
    ("Bulk Delete Roles", roles::BULK_DELETE),
    ("Bulk Restore Roles", roles::BULK_RESTORE),
    ("Bulk Force Delete Roles", roles::BULK_FORCE_DELETE),
    ("List Permissions", permissions::LIST),
    ("Read Permission", permissions::READ),
    ("Create Permission", permissions::CREATE),
    ("Update Permission", permissions::UPDATE),
    ("Delete Permission", permissions::DELETE),
    ("Restore Permission", permissions::RESTORE),
    ("Force Delete Permission", permissions::FORCE_DELETE),
    ("Bulk Delete Permissions", permissions::BULK_DELETE),
    ("Bulk Restore Permissions", permissions::BULK_RESTORE),
    ("Bulk Force Delete Permissions", permissions::BULK_FORCE_DELETE),
    ("List Audit Logs", audit_logs::LIST),
    ("Read Audit Log", audit_logs::READ),
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn default_catalog_slugs_are_unique_and_valid() {
        let mut seen = HashSet::new();
        for (name, slug) in DEFAULT_PERMISSIONS {
            assert!(!name.is_empty());
            assert!(Slug::parse(slug.as_str().to_string()).is_ok(), "{slug}");
            assert!(seen.insert(slug.clone()), "duplicate slug {slug}");
        }
    }
}
