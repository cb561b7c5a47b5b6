use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use gatehouse_admin::{AdminService, Caller, CreateRole, CreateUser, UpdateUser, seed_defaults};
use gatehouse_audit::{AuditErrorReporter, AuditLogQuery, AuditRecord, AuditSink, AuditWriteError, NewAuditRecord, RequestMeta};
use gatehouse_auth::catalog::users;
use gatehouse_audit::AuditLogReader;
use gatehouse_auth::{
    DirectoryQuery, GrantChange, GrantSource, GrantStore, NewPermission, NewPrincipal, NewRole, Permission,
    PermissionCatalog, PermissionChanges, PermissionSort, Principal, PrincipalChanges, Role, RoleChanges,
    RoleDirectory, RoleSort, UserDirectory, UserSort,
};
use gatehouse_core::{
    AuditLogId, DomainError, DomainResult, EntityKind, Page, PageRequest, PermissionId, PrincipalId, RoleId, Slug,
    Visibility,
};
use gatehouse_lifecycle::{RowState, SoftDeleteStore, TrashedField};
use gatehouse_infra::InMemoryStore;

const ROOT_EMAIL: &str = "root@example.com";

async fn bootstrap() -> (AdminService<InMemoryStore>, Caller) {
    let store = Arc::new(InMemoryStore::new());
    let account = NewPrincipal::new(ROOT_EMAIL, "hash", None).unwrap();
    let report = seed_defaults(store.as_ref(), Some(account)).await.unwrap();
    let root = Caller::new(report.admin_user.unwrap(), ROOT_EMAIL);
    (AdminService::new(store), root)
}

async fn create_user(service: &AdminService<InMemoryStore>, root: &Caller, email: &str, permissions: &[Slug]) -> Caller {
    let view = service
        .create_user(
            root,
            CreateUser {
                account: NewPrincipal::new(email, "hash", None).unwrap(),
                permissions: permissions.to_vec(),
            },
        )
        .await
        .unwrap();
    Caller::new(view.user.id, email)
}

async fn audit_trail(service: &AdminService<InMemoryStore>, root: &Caller, resource_id: PrincipalId) -> Vec<AuditRecord> {
    let query = AuditLogQuery {
        resource_type: Some("User".into()),
        resource_id: Some(resource_id.to_string()),
        page: PageRequest::new(None, Some(100)),
        ..Default::default()
    };
    service.list_audit_logs(root, &query).await.unwrap().items
}

#[tokio::test]
async fn role_grants_allow_update_but_not_delete() {
    let (service, root) = bootstrap().await;
    service
        .create_role(
            &root,
            CreateRole {
                role: NewRole::new("Editor", "editor").unwrap(),
                permissions: vec![users::READ, users::UPDATE],
            },
        )
        .await
        .unwrap();
    let editor = create_user(&service, &root, "editor@example.com", &[]).await;
    service
        .sync_user_roles(&root, editor.principal_id, &[Slug::from_static("editor")])
        .await
        .unwrap();
    let target = create_user(&service, &root, "target@example.com", &[]).await;

    let changes = UpdateUser {
        changes: PrincipalChanges {
            full_name: Some(Some("Target".into())),
            ..Default::default()
        },
        permissions: None,
    };
    let updated = service
        .update_user(&editor, target.principal_id, changes)
        .await
        .unwrap();
    assert_eq!(updated.user.full_name.as_deref(), Some("Target"));

    let err = service.trash_user(&editor, target.principal_id).await.unwrap_err();
    assert_eq!(err, DomainError::InsufficientPermission);
    assert!(service.show_user(&root, target.principal_id).await.is_ok());
}

#[tokio::test]
async fn granting_what_you_do_not_hold_is_rejected() {
    let (service, root) = bootstrap().await;
    let manager = create_user(
        &service,
        &root,
        "manager@example.com",
        &[users::PERMISSIONS_MANAGE, users::READ],
    )
    .await;
    let target = create_user(&service, &root, "target@example.com", &[]).await;

    let err = service
        .attach_user_permissions(&manager, target.principal_id, &[users::READ, users::DELETE])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DomainError::GrantEscalation {
            disallowed: vec!["users.delete".to_owned()]
        }
    );
    let granted = service
        .store()
        .principal_permission_slugs(target.principal_id)
        .await
        .unwrap();
    assert!(granted.is_empty());

    let granted = service
        .attach_user_permissions(&manager, target.principal_id, &[users::READ])
        .await
        .unwrap();
    assert_eq!(granted, vec![users::READ]);
}

#[tokio::test]
async fn unknown_slugs_fail_the_whole_change() {
    let (service, root) = bootstrap().await;
    let target = create_user(&service, &root, "target@example.com", &[users::READ]).await;

    let err = service
        .detach_user_permissions(&root, target.principal_id, &[users::READ, Slug::from_static("nope.nothing")])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DomainError::GrantTargetNotFound {
            missing: vec!["nope.nothing".to_owned()]
        }
    );
    let granted = service
        .store()
        .principal_permission_slugs(target.principal_id)
        .await
        .unwrap();
    assert_eq!(granted, vec![users::READ]);

    let err = service
        .attach_user_permissions(&root, target.principal_id, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}

#[tokio::test]
async fn trash_restore_and_force_delete_move_visibility() {
    let (service, root) = bootstrap().await;
    let target = create_user(&service, &root, "target@example.com", &[]).await;
    let id = target.principal_id;

    service.trash_user(&root, id).await.unwrap();
    assert!(matches!(
        service.show_user(&root, id).await,
        Err(DomainError::NotFound { .. })
    ));
    let active = service
        .list_users(&root, &DirectoryQuery::<UserSort>::default())
        .await
        .unwrap();
    assert!(active.items.iter().all(|u| u.id != id));
    let trashed = service
        .list_users(
            &root,
            &DirectoryQuery {
                visibility: Visibility::OnlyTrashed,
                ..DirectoryQuery::<UserSort>::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(trashed.items.len(), 1);
    assert_eq!(trashed.items[0].id, id);

    // Trashing twice finds nothing to trash.
    assert!(matches!(
        service.trash_user(&root, id).await,
        Err(DomainError::NotFound { .. })
    ));

    let restored = service.restore_user(&root, id).await.unwrap();
    assert!(restored.user.deleted_at.is_none());
    service.restore_user(&root, id).await.unwrap();

    service.force_delete_user(&root, id).await.unwrap();
    assert!(service.store().find_user(id, Visibility::WithTrashed).await.unwrap().is_none());

    let actions: Vec<String> = audit_trail(&service, &root, id)
        .await
        .into_iter()
        .map(|r| r.action)
        .collect();
    for expected in ["create", "soft_delete", "restore", "force_delete"] {
        assert!(actions.iter().any(|a| a == expected), "missing {expected} in {actions:?}");
    }
}

#[tokio::test]
async fn bulk_transitions_report_affected_rows() {
    let (service, root) = bootstrap().await;
    let a = create_user(&service, &root, "a@example.com", &[]).await.principal_id;
    let b = create_user(&service, &root, "b@example.com", &[]).await.principal_id;

    let affected = service
        .bulk_trash_users(&root, vec![a.get(), b.get(), a.get(), 999_999])
        .await
        .unwrap();
    assert_eq!(affected, 2);
    assert!(service.store().find_user(a, Visibility::Active).await.unwrap().is_none());

    let query = AuditLogQuery {
        action: Some("soft_delete_bulk".into()),
        ..Default::default()
    };
    let records = service.list_audit_logs(&root, &query).await.unwrap().items;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resource_id, "0");
    let after = records[0].after.as_ref().unwrap();
    assert_eq!(after["affected"], 2);

    let affected = service
        .bulk_force_delete_users(&root, vec![a.get(), b.get()])
        .await
        .unwrap();
    assert_eq!(affected, 2);
    assert!(service.store().find_user(b, Visibility::WithTrashed).await.unwrap().is_none());
}

#[tokio::test]
async fn bulk_ids_are_validated_before_authorization() {
    let (service, root) = bootstrap().await;
    let nobody = create_user(&service, &root, "nobody@example.com", &[]).await;

    for ids in [vec![], vec![0], vec![3, -1]] {
        let err = service.bulk_trash_users(&nobody, ids).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)), "{err}");
    }
    let err = service.bulk_trash_users(&nobody, vec![1]).await.unwrap_err();
    assert_eq!(err, DomainError::InsufficientPermission);
}

#[tokio::test]
async fn updates_record_changed_fields() {
    let (service, root) = bootstrap().await;
    let target = create_user(&service, &root, "target@example.com", &[]).await;

    service
        .update_user(
            &root,
            target.principal_id,
            UpdateUser {
                changes: PrincipalChanges {
                    full_name: Some(Some("Ada".into())),
                    ..Default::default()
                },
                permissions: None,
            },
        )
        .await
        .unwrap();

    let update = audit_trail(&service, &root, target.principal_id)
        .await
        .into_iter()
        .find(|r| r.action == "update")
        .expect("update recorded");
    assert_eq!(update.actor_id, Some(root.principal_id));
    assert_eq!(update.actor_email.as_deref(), Some(ROOT_EMAIL));
    let context = update.context.expect("context");
    assert_eq!(context["component"], "users");
    let changed: Vec<&str> = context["changedFields"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(changed.contains(&"fullName"));
    assert!(!changed.contains(&"email"));
}

#[tokio::test]
async fn registration_is_audited_as_the_new_account() {
    let (service, root) = bootstrap().await;
    let meta = RequestMeta {
        ip: Some("203.0.113.9".into()),
        ..Default::default()
    };
    let user = service
        .register(meta, NewPrincipal::new("new@example.com", "hash", None).unwrap())
        .await
        .unwrap();

    let record = audit_trail(&service, &root, user.id)
        .await
        .into_iter()
        .find(|r| r.action == "register")
        .expect("register recorded");
    assert_eq!(record.actor_id, Some(user.id));
    assert_eq!(record.meta.ip.as_deref(), Some("203.0.113.9"));
}

#[tokio::test]
async fn audit_reads_are_guarded() {
    let (service, root) = bootstrap().await;
    let nobody = create_user(&service, &root, "nobody@example.com", &[]).await;

    let err = service
        .list_audit_logs(&nobody, &AuditLogQuery::default())
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::InsufficientPermission);

    let err = service
        .show_audit_log(&root, AuditLogId::new(987_654))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { entity: "AuditLog", .. }));
}

struct DownSink;

#[async_trait]
impl AuditSink for DownSink {
    async fn persist_audit_record(&self, _record: NewAuditRecord) -> Result<AuditLogId, AuditWriteError> {
        Err(AuditWriteError::Unavailable("sink offline".into()))
    }
}

#[derive(Default)]
struct CollectingReporter(Mutex<Vec<String>>);

impl AuditErrorReporter for CollectingReporter {
    fn report(&self, _error: &AuditWriteError, record: &NewAuditRecord) {
        self.0.lock().unwrap().push(record.action.clone());
    }
}

#[tokio::test]
async fn audit_failures_do_not_fail_the_action() {
    let (service, root) = bootstrap().await;
    let reporter = Arc::new(CollectingReporter::default());
    let service = service
        .with_audit_sink(Arc::new(DownSink))
        .with_audit_reporter(reporter.clone());

    let target = create_user(&service, &root, "target@example.com", &[]).await;
    service.trash_user(&root, target.principal_id).await.unwrap();

    assert!(service.store().find_user(target.principal_id, Visibility::OnlyTrashed).await.unwrap().is_some());
    assert_eq!(*reporter.0.lock().unwrap(), vec!["create".to_owned(), "soft_delete".to_owned()]);
}

#[tokio::test]
async fn bulk_trash_counts_matched_rows_on_every_call() {
    let (service, root) = bootstrap().await;
    let a = create_user(&service, &root, "a@example.com", &[]).await.principal_id;

    assert_eq!(service.bulk_trash_users(&root, vec![a.get(), 424_242]).await.unwrap(), 1);
    assert_eq!(service.bulk_trash_users(&root, vec![a.get(), 424_242]).await.unwrap(), 1);
}

#[tokio::test]
async fn role_membership_is_escalation_checked_against_role_grants() {
    let (service, root) = bootstrap().await;
    service
        .create_role(
            &root,
            CreateRole {
                role: NewRole::new("Auditor", "auditor").unwrap(),
                permissions: vec![users::LIST, users::FORCE_DELETE],
            },
        )
        .await
        .unwrap();
    let manager = create_user(&service, &root, "manager@example.com", &[users::ROLES_MANAGE, users::LIST]).await;
    let target = create_user(&service, &root, "target@example.com", &[]).await;

    let err = service
        .sync_user_roles(&manager, target.principal_id, &[Slug::from_static("auditor")])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DomainError::GrantEscalation {
            disallowed: vec!["users.force_delete".to_owned()]
        }
    );

    // Widening a role reaches its members on the next check.
    let role = service
        .create_role(
            &root,
            CreateRole {
                role: NewRole::new("Reader", "reader").unwrap(),
                permissions: vec![],
            },
        )
        .await
        .unwrap();
    service
        .sync_user_roles(&root, target.principal_id, &[Slug::from_static("reader")])
        .await
        .unwrap();
    assert!(service.list_users(&target, &DirectoryQuery::default()).await.is_err());
    service
        .update_role(
            &root,
            role.role.id,
            gatehouse_admin::UpdateRole {
                permissions: Some(vec![users::LIST]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(service.list_users(&target, &DirectoryQuery::default()).await.is_ok());
}

/// Delegates to an in-memory store but fails every grant pivot write.
struct FailingGrantWrites(Arc<InMemoryStore>);

fn connection_reset() -> DomainError {
    DomainError::storage("connection reset")
}

#[async_trait]
impl UserDirectory for FailingGrantWrites {
    async fn create_user(&self, input: NewPrincipal) -> DomainResult<Principal> {
        self.0.create_user(input).await
    }

    async fn update_user(&self, id: PrincipalId, changes: PrincipalChanges) -> DomainResult<Principal> {
        self.0.update_user(id, changes).await
    }

    async fn find_user(&self, id: PrincipalId, visibility: Visibility) -> DomainResult<Option<Principal>> {
        self.0.find_user(id, visibility).await
    }

    async fn list_users(&self, query: &DirectoryQuery<UserSort>) -> DomainResult<Page<Principal>> {
        self.0.list_users(query).await
    }
}

#[async_trait]
impl RoleDirectory for FailingGrantWrites {
    async fn create_role(&self, input: NewRole) -> DomainResult<Role> {
        self.0.create_role(input).await
    }

    async fn update_role(&self, id: RoleId, changes: RoleChanges) -> DomainResult<Role> {
        self.0.update_role(id, changes).await
    }

    async fn find_role(&self, id: RoleId, visibility: Visibility) -> DomainResult<Option<Role>> {
        self.0.find_role(id, visibility).await
    }

    async fn list_roles(&self, query: &DirectoryQuery<RoleSort>) -> DomainResult<Page<Role>> {
        self.0.list_roles(query).await
    }
}

#[async_trait]
impl PermissionCatalog for FailingGrantWrites {
    async fn create_permission(&self, input: NewPermission) -> DomainResult<Permission> {
        self.0.create_permission(input).await
    }

    async fn update_permission(&self, id: PermissionId, changes: PermissionChanges) -> DomainResult<Permission> {
        self.0.update_permission(id, changes).await
    }

    async fn find_permission(&self, id: PermissionId, visibility: Visibility) -> DomainResult<Option<Permission>> {
        self.0.find_permission(id, visibility).await
    }

    async fn list_permissions(&self, query: &DirectoryQuery<PermissionSort>) -> DomainResult<Page<Permission>> {
        self.0.list_permissions(query).await
    }
}

#[async_trait]
impl GrantSource for FailingGrantWrites {
    async fn fetch_direct_permission_slugs(&self, principal: PrincipalId) -> DomainResult<BTreeSet<Slug>> {
        self.0.fetch_direct_permission_slugs(principal).await
    }

    async fn fetch_role_slugs_and_their_permissions(
        &self,
        principal: PrincipalId,
    ) -> DomainResult<Vec<(Slug, BTreeSet<Slug>)>> {
        self.0.fetch_role_slugs_and_their_permissions(principal).await
    }
}

#[async_trait]
impl GrantStore for FailingGrantWrites {
    async fn find_permissions_by_slugs(&self, slugs: &[Slug]) -> DomainResult<Vec<Permission>> {
        self.0.find_permissions_by_slugs(slugs).await
    }

    async fn find_roles_by_slugs(&self, slugs: &[Slug]) -> DomainResult<Vec<Role>> {
        self.0.find_roles_by_slugs(slugs).await
    }

    async fn role_permission_slugs(&self, role: RoleId) -> DomainResult<Vec<Slug>> {
        self.0.role_permission_slugs(role).await
    }

    async fn principal_permission_slugs(&self, principal: PrincipalId) -> DomainResult<Vec<Slug>> {
        self.0.principal_permission_slugs(principal).await
    }

    async fn principal_role_slugs(&self, principal: PrincipalId) -> DomainResult<Vec<Slug>> {
        self.0.principal_role_slugs(principal).await
    }

    async fn apply_role_permissions(&self, _role: RoleId, _change: GrantChange<PermissionId>) -> DomainResult<()> {
        Err(connection_reset())
    }

    async fn apply_principal_permissions(
        &self,
        _principal: PrincipalId,
        _change: GrantChange<PermissionId>,
    ) -> DomainResult<()> {
        Err(connection_reset())
    }

    async fn apply_principal_roles(&self, principal: PrincipalId, change: GrantChange<RoleId>) -> DomainResult<()> {
        self.0.apply_principal_roles(principal, change).await
    }
}

#[async_trait]
impl SoftDeleteStore for FailingGrantWrites {
    async fn locate(&self, kind: EntityKind, id: i64, scope: Visibility) -> DomainResult<Option<RowState>> {
        self.0.locate(kind, id, scope).await
    }

    async fn execute_scoped_update(
        &self,
        kind: EntityKind,
        ids: &[i64],
        scope: Visibility,
        field: TrashedField,
    ) -> DomainResult<u64> {
        self.0.execute_scoped_update(kind, ids, scope, field).await
    }

    async fn execute_scoped_delete(&self, kind: EntityKind, ids: &[i64], scope: Visibility) -> DomainResult<u64> {
        self.0.execute_scoped_delete(kind, ids, scope).await
    }
}

#[async_trait]
impl AuditSink for FailingGrantWrites {
    async fn persist_audit_record(&self, record: NewAuditRecord) -> Result<AuditLogId, AuditWriteError> {
        self.0.persist_audit_record(record).await
    }
}

#[async_trait]
impl AuditLogReader for FailingGrantWrites {
    async fn list_audit_logs(&self, query: &AuditLogQuery) -> DomainResult<Page<AuditRecord>> {
        self.0.list_audit_logs(query).await
    }

    async fn find_audit_log(&self, id: AuditLogId) -> DomainResult<Option<AuditRecord>> {
        self.0.find_audit_log(id).await
    }
}

#[tokio::test]
async fn failed_grant_sync_still_audits_the_committed_change() {
    let inner = Arc::new(InMemoryStore::new());
    let account = NewPrincipal::new(ROOT_EMAIL, "hash", None).unwrap();
    let report = seed_defaults(inner.as_ref(), Some(account)).await.unwrap();
    let root = Caller::new(report.admin_user.unwrap(), ROOT_EMAIL);
    let target = inner
        .create_user(NewPrincipal::new("target@example.com", "hash", None).unwrap())
        .await
        .unwrap();
    let service = AdminService::new(Arc::new(FailingGrantWrites(Arc::clone(&inner))));

    let err = service
        .update_user(
            &root,
            target.id,
            UpdateUser {
                changes: PrincipalChanges {
                    full_name: Some(Some("New".into())),
                    ..Default::default()
                },
                permissions: Some(vec![users::LIST]),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, connection_reset());

    let stored = inner.find_user(target.id, Visibility::Active).await.unwrap().unwrap();
    assert_eq!(stored.full_name.as_deref(), Some("New"));

    let query = AuditLogQuery {
        action: Some("update".into()),
        resource_id: Some(target.id.to_string()),
        ..Default::default()
    };
    let rows = service.list_audit_logs(&root, &query).await.unwrap().items;
    assert_eq!(rows.len(), 1);
    let after = rows[0].after.as_ref().unwrap();
    assert_eq!(after["fullName"], "New");
    assert_eq!(after["permissions"], serde_json::json!([]));
    let changed = &rows[0].context.as_ref().unwrap()["changedFields"];
    assert!(changed.as_array().unwrap().iter().any(|f| f == "fullName"));
    assert!(!changed.as_array().unwrap().iter().any(|f| f == "permissions"));

    let err = service
        .create_role(
            &root,
            CreateRole {
                role: NewRole::new("Support", "support").unwrap(),
                permissions: vec![users::READ],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, connection_reset());
    let created = service
        .list_audit_logs(
            &root,
            &AuditLogQuery {
                action: Some("create".into()),
                resource_type: Some("Role".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .items;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].after.as_ref().unwrap()["slug"], "support");
}

#[tokio::test]
async fn any_authenticated_user_can_read_their_own_profile() {
    let (service, root) = bootstrap().await;
    let nobody = create_user(&service, &root, "nobody@example.com", &[]).await;

    let profile = service.me(&nobody).await.unwrap();
    assert_eq!(profile.user.email, "nobody@example.com");
    assert!(profile.permissions.is_empty());

    service.trash_user(&root, nobody.principal_id).await.unwrap();
    assert!(matches!(service.me(&nobody).await, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn sign_in_and_sign_out_are_audited_against_auth() {
    let (service, root) = bootstrap().await;
    let user = create_user(&service, &root, "user@example.com", &[]).await;
    let meta = RequestMeta {
        user_agent: Some("curl/8".into()),
        ..Default::default()
    };

    service.record_login(user.actor(), meta.clone()).await;
    service.record_logout(user.actor(), meta).await;

    let query = AuditLogQuery {
        resource_type: Some("Auth".into()),
        ..Default::default()
    };
    let rows = service.list_audit_logs(&root, &query).await.unwrap().items;
    assert_eq!(rows.len(), 2);
    let login = rows.iter().find(|r| r.action == "login").expect("login recorded");
    assert_eq!(login.actor_id, Some(user.principal_id));
    assert_eq!(login.resource_id, user.principal_id.to_string());
    assert_eq!(login.after.as_ref().unwrap()["email"], "user@example.com");
    assert_eq!(login.meta.user_agent.as_deref(), Some("curl/8"));
    let logout = rows.iter().find(|r| r.action == "logout").expect("logout recorded");
    assert_eq!(logout.before.as_ref().unwrap()["email"], "user@example.com");
    assert!(logout.after.is_none());
}
