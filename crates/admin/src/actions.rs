//! The administrative action table: what each action requires.

use gatehouse_auth::RequiresPermissions;
use gatehouse_auth::catalog::{audit_logs, permissions, roles, users};
use gatehouse_core::Slug;

macro_rules! admin_actions {
    ($($variant:ident => [$($slug:expr),* $(,)?]),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum AdminAction {
            $($variant),+
        }

        impl RequiresPermissions for AdminAction {
            fn required_permissions(&self) -> &[Slug] {
                match self {
                    $(AdminAction::$variant => {
                        const REQUIRED: &[Slug] = &[$($slug),*];
                        REQUIRED
                    })+
                }
            }
        }
    };
}

admin_actions! {
    ListUsers => [users::LIST],
    ShowUser => [users::READ],
    CreateUser => [users::CREATE],
    UpdateUser => [users::UPDATE],
    TrashUser => [users::DELETE],
    RestoreUser => [users::RESTORE],
    ForceDeleteUser => [users::FORCE_DELETE],
    BulkTrashUsers => [users::BULK_DELETE],
    BulkRestoreUsers => [users::BULK_RESTORE],
    BulkForceDeleteUsers => [users::BULK_FORCE_DELETE],
    ReadUserPermissions => [users::PERMISSIONS_READ],
    ManageUserPermissions => [users::PERMISSIONS_MANAGE],
    ManageUserRoles => [users::ROLES_MANAGE],

    ListRoles => [roles::LIST],
    ShowRole => [roles::READ],
    CreateRole => [roles::CREATE],
    UpdateRole => [roles::UPDATE],
    TrashRole => [roles::DELETE],
    RestoreRole => [roles::RESTORE],
    ForceDeleteRole => [roles::FORCE_DELETE],
    BulkTrashRoles => [roles::BULK_DELETE],
    BulkRestoreRoles => [roles::BULK_RESTORE],
    BulkForceDeleteRoles => [roles::BULK_FORCE_DELETE],

    ListPermissions => [permissions::LIST],
    ShowPermission => [permissions::READ],
    CreatePermission => [permissions::CREATE],
    UpdatePermission => [permissions::UPDATE],
    TrashPermission => [permissions::DELETE],
    RestorePermission => [permissions::RESTORE],
    ForceDeletePermission => [permissions::FORCE_DELETE],
    BulkTrashPermissions => [permissions::BULK_DELETE],
    BulkRestorePermissions => [permissions::BULK_RESTORE],
    BulkForceDeletePermissions => [permissions::BULK_FORCE_DELETE],

    ListAuditLogs => [audit_logs::LIST],
    ShowAuditLog => [audit_logs::READ],

    // Self-service; being authenticated (or the new principal) is enough.
    Me => [],
    Register => [],
}
