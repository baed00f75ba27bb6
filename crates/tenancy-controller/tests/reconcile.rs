//! Forward reconciliation against the in-memory store.

mod support;

use std::time::Duration;

use serde_json::json;
use support::*;
use tenancy_controller::artifacts::{CLUSTER_SECRET_LABEL, RegistrationConfig};
use tenancy_controller::policy::{MAINTAINER_ROLE, OPERATOR_ROLE, VIEWER_ROLE};
use tenancy_controller::{Action, ReconcileError, ReconcileOutcome, render_policy};
use tenancy_core::{
    AdditionalRoleBinding, AppProject, DynamicObject, ObjectKey, ResourceKind, Secret, SecretType, Service,
    ServiceAccount, Subject, SubjectKind, TENANT_TYPE_LABEL, Tenant, TenantState,
};
use tenancy_store::{Api, OperationResult, ResourceStore, StoreError};
use tenancy_store_memory::InMemoryStore;

fn acme() -> Tenant {
    Tenant::new("acme").with_owner(user("alice"))
}

fn project_key(name: &str) -> ObjectKey {
    ObjectKey::namespaced(ResourceKind::AppProject, ARGOCD, name)
}

#[tokio::test]
async fn test_unknown_tenant_is_not_an_error() {
    let harness = Harness::new().await;
    let outcome = harness.engine.reconcile("ghost").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::NotFound);
    assert_eq!(harness.store.total_writes(), 0);
}

#[tokio::test]
async fn test_first_reconcile_provisions_everything() {
    let harness = Harness::new().await;
    let created = harness.create_tenant(acme()).await;
    let uid = created.metadata.uid.clone().unwrap();

    let outcome = harness.engine.reconcile("acme").await.unwrap();
    let ReconcileOutcome::Synced(report) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(report.identity, OperationResult::Created);
    assert_eq!(report.token_secret, OperationResult::Created);
    assert_eq!(report.endpoint, OperationResult::Created);
    assert_eq!(report.registration, OperationResult::Created);
    assert_eq!(report.project, OperationResult::Created);
    assert_eq!(report.policy, OperationResult::Created);
    assert_eq!(report.synthetic_owner, OperationResult::Updated);

    let account: ServiceAccount = harness
        .get(&ObjectKey::namespaced(ResourceKind::ServiceAccount, "tenants", "acme"))
        .await
        .unwrap();
    assert!(account.metadata.is_owned_by(&uid));

    let token: Secret = harness
        .get(&ObjectKey::namespaced(ResourceKind::Secret, "tenants", "acme"))
        .await
        .unwrap();
    assert_eq!(token.type_, SecretType::ServiceAccountToken);
    assert!(token.metadata.is_owned_by(&uid));
    let token_value = token.data["token"].clone();

    let endpoint: Service = harness
        .get(&ObjectKey::namespaced(ResourceKind::Service, "capsule-system", "acme-proxy"))
        .await
        .unwrap();
    assert_eq!(endpoint.spec.ports[0].port, 9001);
    assert!(endpoint.metadata.is_owned_by(&uid));

    let registration: Secret = harness
        .get(&ObjectKey::namespaced(ResourceKind::Secret, ARGOCD, "acme"))
        .await
        .unwrap();
    assert_eq!(registration.metadata.labels[CLUSTER_SECRET_LABEL], "cluster");
    assert_eq!(
        registration.data["server"],
        "https://acme-proxy.capsule-system.svc:9001"
    );
    let config: RegistrationConfig =
        serde_json::from_str(&registration.data["config"]).unwrap();
    assert_eq!(config, RegistrationConfig::insecure(token_value));
    assert!(registration.metadata.is_owned_by(&uid));

    let project: AppProject = harness.get(&project_key("acme")).await.unwrap();
    assert_eq!(project.spec.description.as_deref(), Some("Application Project acme"));
    assert_eq!(project.role("owners").unwrap().groups, vec!["alice"]);
    assert_eq!(project.spec.destinations[0].server, registration.data["server"]);

    let tenant = harness.tenant("acme").await.unwrap();
    assert!(tenant.metadata.has_finalizer("tenancy.dev/tenancy-controller"));
    assert_eq!(tenant.status.state, Some(TenantState::Active));
    assert!(tenant.spec.owners.iter().any(|owner| {
        owner.kind == SubjectKind::ServiceAccount
            && owner.name == "system:serviceaccount:tenants:acme"
    }));
}

#[tokio::test]
async fn test_policy_entry_for_single_owner() {
    let harness = Harness::new().await;
    harness.create_tenant(acme()).await;
    harness.engine.reconcile("acme").await.unwrap();

    let document = harness.policy_document().await;
    let text = &document.data["policy.acme.csv"];
    assert!(text.contains("p, proj:acme:owners, applications, *, acme/*, allow"));
    assert!(text.contains("g, alice, role:acme-tenant-owner"));
    assert!(!text.contains("role:acme-tenant-maintainer"));
    assert_eq!(document.data[FOREIGN_ENTRY], "g, admins, role:admin\n");
}

#[tokio::test]
async fn test_second_reconcile_writes_nothing() {
    let harness = Harness::new().await;
    harness.create_tenant(acme()).await;
    harness.engine.reconcile("acme").await.unwrap();

    let writes = harness.store.total_writes();
    let document_writes = harness.store.writes_to(&policy_document_key());
    assert_eq!(document_writes, 1);

    let outcome = harness.engine.reconcile("acme").await.unwrap();
    let ReconcileOutcome::Synced(report) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(report.writes(), 0);
    assert_eq!(report.policy, OperationResult::Unchanged);
    assert_eq!(harness.store.total_writes(), writes);
    assert_eq!(harness.store.writes_to(&policy_document_key()), document_writes);
}

#[tokio::test]
async fn test_synthetic_owner_is_never_duplicated() {
    let harness = Harness::new().await;
    harness.create_tenant(acme()).await;

    for _ in 0..3 {
        harness.engine.reconcile("acme").await.unwrap();
    }

    let tenant = harness.tenant("acme").await.unwrap();
    let synthetic = tenant
        .spec
        .owners
        .iter()
        .filter(|owner| owner.kind == SubjectKind::ServiceAccount)
        .count();
    assert_eq!(synthetic, 1);
    assert_eq!(tenant.spec.owners.len(), 2);
}

#[tokio::test]
async fn test_role_lists_follow_latest_bindings() {
    let harness = Harness::new().await;
    harness
        .create_tenant(acme().with_binding(AdditionalRoleBinding::new(
            MAINTAINER_ROLE,
            vec![Subject::new(SubjectKind::User, "bob")],
        )))
        .await;
    harness.engine.reconcile("acme").await.unwrap();

    let project: AppProject = harness.get(&project_key("acme")).await.unwrap();
    assert_eq!(project.role("maintainers").unwrap().groups, vec!["bob"]);

    let mut tenant = harness.tenant("acme").await.unwrap();
    tenant.spec.additional_role_bindings = vec![
        AdditionalRoleBinding::new(MAINTAINER_ROLE, vec![Subject::new(SubjectKind::Group, "devs")]),
        AdditionalRoleBinding::new(OPERATOR_ROLE, vec![Subject::new(SubjectKind::User, "oscar")]),
        AdditionalRoleBinding::new(VIEWER_ROLE, vec![Subject::new(SubjectKind::User, "victor")]),
    ];
    harness.tenants().replace(&tenant).await.unwrap();
    harness.engine.reconcile("acme").await.unwrap();

    let project: AppProject = harness.get(&project_key("acme")).await.unwrap();
    assert_eq!(project.role("maintainers").unwrap().groups, vec!["devs"]);
    assert_eq!(project.role("operators").unwrap().groups, vec!["oscar"]);
    assert_eq!(project.role("viewers").unwrap().groups, vec!["victor"]);

    let text = harness.policy_document().await.data["policy.acme.csv"].clone();
    assert!(text.contains("g, devs, role:acme-tenant-maintainer"));
    assert!(!text.contains("g, bob,"));
    assert!(!text.contains("oscar"));
    assert_eq!(text, render_policy(&harness.tenant("acme").await.unwrap()));
}

#[tokio::test]
async fn test_project_patch_keeps_foreign_fields() {
    let harness = Harness::new().await;
    harness.create_tenant(acme()).await;
    harness.engine.reconcile("acme").await.unwrap();

    let projects = Api::<AppProject>::new(harness.dyn_store());
    let mut project = projects.get_existing(&project_key("acme")).await.unwrap();
    project
        .spec
        .extra
        .insert("syncWindows".to_string(), json!([{"kind": "deny", "schedule": "* * * * *"}]));
    project.spec.description = Some("Edited by hand".to_string());
    project.spec.source_repos = vec!["https://git.example.com/acme".to_string()];
    project.spec.roles[1].groups.push("stale".to_string());
    projects.replace(&project).await.unwrap();

    let outcome = harness.engine.reconcile("acme").await.unwrap();
    let ReconcileOutcome::Synced(report) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(report.project, OperationResult::Updated);

    let project = projects.get_existing(&project_key("acme")).await.unwrap();
    assert_eq!(project.spec.extra["syncWindows"][0]["kind"], "deny");
    assert_eq!(project.spec.description.as_deref(), Some("Edited by hand"));
    assert_eq!(project.spec.source_repos, vec!["*"]);
    assert!(project.role("maintainers").unwrap().groups.is_empty());
}

#[tokio::test]
async fn test_tenant_fields_outside_the_model_survive() {
    let harness = Harness::new().await;
    let raw = DynamicObject::from_value(json!({
        "apiVersion": "capsule.clastix.io/v1beta2",
        "kind": "Tenant",
        "metadata": {
            "name": "acme",
            "annotations": {"capsule.clastix.io/protected": "true"}
        },
        "spec": {
            "owners": [{
                "kind": "User",
                "name": "alice",
                "clusterRoles": ["admin", "capsule-namespace-deleter"]
            }],
            "namespaceOptions": {
                "quota": 3,
                "additionalMetadata": {"labels": {"team": "acme"}}
            },
            "preventDeletion": true
        }
    }))
    .unwrap();
    harness.store.inner.create(&raw).await.unwrap();

    let outcome = harness.engine.reconcile("acme").await.unwrap();
    let ReconcileOutcome::Synced(report) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(report.synthetic_owner, OperationResult::Updated);

    let stored = harness
        .store
        .inner
        .get(&tenant_key("acme"))
        .await
        .unwrap()
        .unwrap();
    let spec = &stored.body["spec"];
    assert_eq!(spec["namespaceOptions"]["quota"], 3);
    assert_eq!(spec["namespaceOptions"]["additionalMetadata"]["labels"]["team"], "acme");
    assert_eq!(spec["owners"][0]["clusterRoles"], json!(["admin", "capsule-namespace-deleter"]));
    assert_eq!(spec["owners"].as_array().unwrap().len(), 2);
    assert_eq!(spec["preventDeletion"], true);
    assert_eq!(
        stored.metadata.annotations["capsule.clastix.io/protected"],
        "true"
    );
    assert!(stored.metadata.has_finalizer("tenancy.dev/tenancy-controller"));
}

#[tokio::test]
async fn test_rejected_write_is_redelivered() {
    let harness = Harness::new().await;
    harness.create_tenant(acme()).await;
    harness.engine.reconcile("acme").await.unwrap();

    let mut tenant = harness.tenant("acme").await.unwrap();
    tenant.spec.additional_role_bindings = vec![AdditionalRoleBinding::new(
        VIEWER_ROLE,
        vec![Subject::new(SubjectKind::User, "victor")],
    )];
    harness.tenants().replace(&tenant).await.unwrap();
    harness.store.reject_patches(project_key("acme"), 1);

    let err = harness.engine.reconcile("acme").await.unwrap_err();
    assert!(matches!(err, ReconcileError::Store(StoreError::Invalid { .. })));
    assert_eq!(
        harness.engine.error_policy(&err),
        Action::Requeue(Duration::from_secs(30))
    );

    harness.engine.reconcile("acme").await.unwrap();
    let project: AppProject = harness.get(&project_key("acme")).await.unwrap();
    assert_eq!(project.role("viewers").unwrap().groups, vec!["victor"]);
}

#[tokio::test]
async fn test_system_tenant_identity_namespace() {
    let harness = Harness::new().await;
    let mut tenant = Tenant::new("infra").with_owner(user("root"));
    tenant
        .metadata
        .labels
        .insert(TENANT_TYPE_LABEL.to_string(), "system".to_string());
    harness.create_tenant(tenant).await;
    harness.engine.reconcile("infra").await.unwrap();

    let account: Option<ServiceAccount> = harness
        .get(&ObjectKey::namespaced(ResourceKind::ServiceAccount, "tenants-system", "infra"))
        .await;
    assert!(account.is_some());
    let tenant = harness.tenant("infra").await.unwrap();
    assert!(tenant
        .spec
        .owners
        .iter()
        .any(|owner| owner.name == "system:serviceaccount:tenants-system:infra"));
}

#[tokio::test]
async fn test_cordoned_tenant_status() {
    let harness = Harness::new().await;
    let mut tenant = acme();
    tenant.spec.cordoned = true;
    harness.create_tenant(tenant).await;

    harness.engine.reconcile("acme").await.unwrap();
    let mut tenant = harness.tenant("acme").await.unwrap();
    assert_eq!(tenant.status.state, Some(TenantState::Cordoned));

    tenant.spec.cordoned = false;
    harness.tenants().replace(&tenant).await.unwrap();
    harness.engine.reconcile("acme").await.unwrap();
    let tenant = harness.tenant("acme").await.unwrap();
    assert_eq!(tenant.status.state, Some(TenantState::Active));
}

#[tokio::test]
async fn test_missing_token_requeues_until_issued() {
    let harness = Harness::with_store(InMemoryStore::new(), test_config()).await;
    harness.create_tenant(acme()).await;

    let err = harness.engine.reconcile("acme").await.unwrap_err();
    assert!(matches!(err, ReconcileError::TokenNotMaterialized { .. }));
    assert_eq!(
        harness.engine.error_policy(&err),
        Action::Requeue(Duration::from_millis(2000))
    );

    // Steps before the token read-back stay applied, later ones did not run.
    let token_key = ObjectKey::namespaced(ResourceKind::Secret, "tenants", "acme");
    assert!(harness.get::<Secret>(&token_key).await.is_some());
    assert!(harness
        .get::<Secret>(&ObjectKey::namespaced(ResourceKind::Secret, ARGOCD, "acme"))
        .await
        .is_none());
    let tenant = harness.tenant("acme").await.unwrap();
    assert!(tenant.metadata.finalizers.is_empty());

    let token = harness
        .store
        .inner
        .issue_service_account_token(&token_key)
        .await
        .unwrap();
    let outcome = harness.engine.reconcile("acme").await.unwrap();
    let ReconcileOutcome::Synced(report) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(report.identity, OperationResult::Unchanged);
    assert_eq!(report.token_secret, OperationResult::Unchanged);

    let registration: Secret = harness
        .get(&ObjectKey::namespaced(ResourceKind::Secret, ARGOCD, "acme"))
        .await
        .unwrap();
    assert!(registration.data["config"].contains(&token));
}

#[tokio::test]
async fn test_shutdown_rejects_work() {
    let harness = Harness::new().await;
    harness.create_tenant(acme()).await;
    harness.engine.shutdown();

    let err = harness.engine.reconcile("acme").await.unwrap_err();
    assert!(matches!(err, ReconcileError::Cancelled));
    assert_eq!(harness.engine.error_policy(&err), Action::AwaitChange);
    assert_eq!(harness.store.total_writes(), 1);
}
