//! Desired shape of every object a tenant owns.
//!
//! Each artifact has a skeleton used when the object does not exist yet and a
//! `reconcile_*` mutation applied to the fetched (or skeleton) object before
//! it is written. Mutations only touch the fields this controller owns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tenancy_core::{
    AppProject, ApplicationDestination, GroupKind, ObjectKey, ObjectMeta, OwnerReference,
    OwnerSpec, ProjectRole, Resource, ResourceKind, Secret, SecretType, Service, ServiceAccount,
    ServicePort, SubjectKind, Tenant, TenantClass, controller_reference,
};

use crate::config::ControllerConfig;
use crate::error::Result;
use crate::policy::Tier;

/// Port exposed by every tenant routing endpoint.
pub const PROXY_PORT: u16 = 9001;
pub const PROXY_PORT_NAME: &str = "proxy";

pub const CONTROLLER_NAME: &str = "tenancy-controller";
pub const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";
pub const CLUSTER_SECRET_LABEL: &str = "argocd.argoproj.io/secret-type";
pub const CLUSTER_SECRET_TYPE: &str = "cluster";

const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";
const NAME_LABEL: &str = "app.kubernetes.io/name";

pub fn common_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        (INSTANCE_LABEL.to_string(), CONTROLLER_NAME.to_string()),
        (NAME_LABEL.to_string(), CONTROLLER_NAME.to_string()),
    ])
}

/// Labels of the shared proxy deployment named `service_name`.
pub fn proxy_selector(service_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (INSTANCE_LABEL.to_string(), service_name.to_string()),
        (NAME_LABEL.to_string(), service_name.to_string()),
    ])
}

/// Payload of the `config` entry in a registration secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationConfig {
    pub bearer_token: String,
    pub tls_client_config: TlsClientConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsClientConfig {
    pub insecure: bool,
}

impl RegistrationConfig {
    pub fn insecure(bearer_token: impl Into<String>) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            tls_client_config: TlsClientConfig { insecure: true },
        }
    }
}

/// Desired artifacts for one persisted tenant.
#[derive(Debug, Clone)]
pub struct TenantArtifacts<'a> {
    tenant: &'a Tenant,
    config: &'a ControllerConfig,
    owner: OwnerReference,
}

impl<'a> TenantArtifacts<'a> {
    /// Fails when the tenant has no uid, since nothing could reference it.
    pub fn new(tenant: &'a Tenant, config: &'a ControllerConfig) -> Result<Self> {
        Ok(Self {
            tenant,
            config,
            owner: controller_reference(tenant)?,
        })
    }

    fn name(&self) -> &str {
        &self.tenant.metadata.name
    }

    pub fn owner_reference(&self) -> &OwnerReference {
        &self.owner
    }

    /// Namespace holding the tenant's identity and token.
    pub fn identity_namespace(&self) -> &str {
        match self.tenant.classification() {
            TenantClass::System => &self.config.namespaces.system_tenants,
            TenantClass::User => &self.config.namespaces.user_tenants,
        }
    }

    pub fn endpoint_name(&self) -> String {
        format!("{}-proxy", self.name())
    }

    pub fn registration_url(&self) -> String {
        format!(
            "https://{}.{}.svc:{PROXY_PORT}",
            self.endpoint_name(),
            self.config.proxy.namespace
        )
    }

    /// Owner entry naming the tenant's own service account.
    pub fn synthetic_owner(&self) -> OwnerSpec {
        OwnerSpec::new(
            SubjectKind::ServiceAccount,
            format!(
                "system:serviceaccount:{}:{}",
                self.identity_namespace(),
                self.name()
            ),
        )
    }

    pub fn identity_key(&self) -> ObjectKey {
        ObjectKey::namespaced(
            ResourceKind::ServiceAccount,
            self.identity_namespace(),
            self.name(),
        )
    }

    pub fn token_key(&self) -> ObjectKey {
        ObjectKey::namespaced(ResourceKind::Secret, self.identity_namespace(), self.name())
    }

    fn identity_meta(&self) -> ObjectMeta {
        ObjectMeta::namespaced(self.name(), self.identity_namespace())
    }

    fn owned(&self, meta: &mut ObjectMeta) {
        meta.labels.extend(common_labels());
        meta.set_owner(self.owner.clone());
    }

    pub fn identity(&self) -> ServiceAccount {
        ServiceAccount::new(self.identity_meta())
    }

    pub fn reconcile_identity(&self, account: &mut ServiceAccount) {
        self.owned(account.metadata_mut());
    }

    pub fn token_secret(&self) -> Secret {
        Secret::new(self.identity_meta(), SecretType::ServiceAccountToken)
    }

    /// Leaves `data` alone; the store fills the token in.
    pub fn reconcile_token_secret(&self, secret: &mut Secret) {
        secret.type_ = SecretType::ServiceAccountToken;
        secret.metadata.annotations.insert(
            SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(),
            self.name().to_string(),
        );
        self.owned(&mut secret.metadata);
    }

    pub fn endpoint(&self) -> Service {
        Service::new(ObjectMeta::namespaced(
            self.endpoint_name(),
            self.config.proxy.namespace.clone(),
        ))
    }

    pub fn reconcile_endpoint(&self, service: &mut Service) {
        service.spec.type_ = "ClusterIP".to_string();
        let mut port = ServicePort::new(PROXY_PORT_NAME, PROXY_PORT, self.config.proxy.target_port);
        if let Some(existing) = service.spec.ports.iter().find(|p| p.name == PROXY_PORT_NAME) {
            port.extra = existing.extra.clone();
        }
        service.spec.ports = vec![port];
        service.spec.selector = proxy_selector(&self.config.proxy.service_name);
        self.owned(&mut service.metadata);
    }

    pub fn registration_secret(&self) -> Secret {
        Secret::new(
            ObjectMeta::namespaced(self.name(), self.config.argocd.namespace.clone()),
            SecretType::Opaque,
        )
    }

    /// Serialized `config` entry of the registration secret.
    pub fn registration_config(&self, token: &str) -> Result<String> {
        Ok(serde_json::to_string(&RegistrationConfig::insecure(token))?)
    }

    pub fn reconcile_registration_secret(&self, secret: &mut Secret, config: &str) {
        secret.type_ = SecretType::Opaque;
        secret.data.insert("name".to_string(), self.name().to_string());
        secret.data.insert("server".to_string(), self.registration_url());
        secret.data.insert("config".to_string(), config.to_string());
        secret.metadata.labels.insert(
            CLUSTER_SECRET_LABEL.to_string(),
            CLUSTER_SECRET_TYPE.to_string(),
        );
        secret.metadata.set_owner(self.owner.clone());
    }

    pub fn project(&self) -> AppProject {
        let mut project = AppProject::new(ObjectMeta::namespaced(
            self.name(),
            self.config.argocd.namespace.clone(),
        ));
        project.spec.description = Some(format!("Application Project {}", self.name()));
        project
    }

    /// Overwrites roles, whitelists, sources and destinations. Everything else
    /// in the spec is kept as found.
    pub fn reconcile_project(&self, project: &mut AppProject) {
        let name = self.name();
        project.spec.roles = Tier::ALL
            .iter()
            .map(|tier| ProjectRole {
                name: tier.role_name().to_string(),
                description: tier.description().to_string(),
                groups: tier.principals(self.tenant),
                policies: tier.policies(name),
            })
            .collect();
        project.spec.cluster_resource_whitelist = vec![GroupKind::wildcard()];
        project.spec.namespace_resource_whitelist = vec![GroupKind::wildcard()];
        project.spec.source_namespaces = vec![format!("{name}-*")];
        project.spec.source_repos = vec!["*".to_string()];
        project.spec.destinations = vec![ApplicationDestination {
            name: name.to_string(),
            namespace: format!("{name}-*"),
            server: self.registration_url(),
        }];
        self.owned(&mut project.metadata);
    }
}
