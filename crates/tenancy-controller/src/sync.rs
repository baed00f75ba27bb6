//! Forward reconciliation: bring every artifact of a tenant to its desired
//! state.
//!
//! Steps run in a fixed order and each one is idempotent. A failing step
//! aborts the remaining ones; whatever was already applied stays in place
//! and the next invocation completes the rest.

use std::sync::Arc;

use tenancy_core::{AppProject, Resource, Secret, Service, ServiceAccount, Tenant};
use tenancy_store::{Api, DynStore, OperationResult};
use tracing::{debug, warn};

use crate::artifacts::TenantArtifacts;
use crate::config::ControllerConfig;
use crate::document::PolicyDocument;
use crate::error::{ReconcileError, Result};
use crate::policy::render_policy;
use crate::retry::ConflictRetry;

/// What each step did during one synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub identity: OperationResult,
    pub token_secret: OperationResult,
    pub endpoint: OperationResult,
    pub registration: OperationResult,
    pub project: OperationResult,
    pub policy: OperationResult,
    pub synthetic_owner: OperationResult,
}

impl SyncReport {
    /// Number of steps that wrote to the store.
    pub fn writes(&self) -> usize {
        [
            self.identity,
            self.token_secret,
            self.endpoint,
            self.registration,
            self.project,
            self.policy,
            self.synthetic_owner,
        ]
        .into_iter()
        .filter(|result| result.wrote())
        .count()
    }
}

#[derive(Clone)]
pub struct ResourceSynchronizer {
    config: Arc<ControllerConfig>,
    tenants: Api<Tenant>,
    service_accounts: Api<ServiceAccount>,
    secrets: Api<Secret>,
    services: Api<Service>,
    projects: Api<AppProject>,
    document: PolicyDocument,
    retry: ConflictRetry,
}

impl ResourceSynchronizer {
    pub fn new(
        store: DynStore,
        config: Arc<ControllerConfig>,
        document: PolicyDocument,
        retry: ConflictRetry,
    ) -> Self {
        Self {
            config,
            tenants: Api::new(store.clone()),
            service_accounts: Api::new(store.clone()),
            secrets: Api::new(store.clone()),
            services: Api::new(store.clone()),
            projects: Api::new(store),
            document,
            retry,
        }
    }

    /// Runs all steps for a persisted tenant.
    pub async fn sync(&self, tenant: &Tenant) -> Result<SyncReport> {
        let artifacts = TenantArtifacts::new(tenant, &self.config)?;

        let (_, identity) = self
            .service_accounts
            .create_or_update(artifacts.identity(), |account| {
                artifacts.reconcile_identity(account);
                Ok(())
            })
            .await?;
        debug!(result = ?identity, "identity");

        let (token_secret, token) = self.materialize_token(&artifacts).await?;
        debug!(result = ?token_secret, "token secret");

        let (_, endpoint) = self
            .services
            .create_or_update(artifacts.endpoint(), |service| {
                artifacts.reconcile_endpoint(service);
                Ok(())
            })
            .await?;
        debug!(result = ?endpoint, "routing endpoint");

        let registration_config = artifacts.registration_config(&token)?;
        let (_, registration) = self
            .secrets
            .create_or_update(artifacts.registration_secret(), |secret| {
                artifacts.reconcile_registration_secret(secret, &registration_config);
                Ok(())
            })
            .await?;
        debug!(result = ?registration, "registration secret");

        let (_, project) = self
            .projects
            .create_or_patch(artifacts.project(), |project| {
                artifacts.reconcile_project(project);
                Ok(())
            })
            .await?;
        debug!(result = ?project, "project descriptor");

        let policy = self.sync_policy(tenant).await?;
        debug!(result = ?policy, "policy entry");

        let synthetic_owner = self.register_synthetic_owner(tenant, &artifacts).await?;
        debug!(result = ?synthetic_owner, "synthetic owner");

        Ok(SyncReport {
            identity,
            token_secret,
            endpoint,
            registration,
            project,
            policy,
            synthetic_owner,
        })
    }

    /// Ensures the token secret exists and reads its value back.
    ///
    /// The store fills the token in asynchronously; until it has, the step
    /// fails with a transient error instead of waiting.
    async fn materialize_token(
        &self,
        artifacts: &TenantArtifacts<'_>,
    ) -> Result<(OperationResult, String)> {
        let (_, result) = self
            .secrets
            .create_or_update(artifacts.token_secret(), |secret| {
                artifacts.reconcile_token_secret(secret);
                Ok(())
            })
            .await?;

        let key = artifacts.token_key();
        let secret = self.secrets.get_existing(&key).await?;
        match secret.data.get("token").filter(|token| !token.is_empty()) {
            Some(token) => Ok((result, token.clone())),
            None => {
                warn!(secret = %key, "service account token not populated yet");
                Err(ReconcileError::token_not_materialized(
                    artifacts.identity_namespace(),
                    key.name,
                ))
            }
        }
    }

    /// Writes the rendered policy unless the stored entry already matches it
    /// byte for byte.
    async fn sync_policy(&self, tenant: &Tenant) -> Result<OperationResult> {
        let name = tenant.metadata.name.as_str();
        let text = render_policy(tenant);
        if self.document.entry(name).await?.as_deref() == Some(text.as_str()) {
            return Ok(OperationResult::Unchanged);
        }
        self.document.upsert(name, &text).await
    }

    /// Adds the tenant's own service account to its owners, once.
    async fn register_synthetic_owner(
        &self,
        tenant: &Tenant,
        artifacts: &TenantArtifacts<'_>,
    ) -> Result<OperationResult> {
        let owner = artifacts.synthetic_owner();
        let owner = &owner;
        let tenants = &self.tenants;
        let tenant_key = tenant.key();
        let tenant_key = &tenant_key;

        self.retry
            .run("register synthetic owner", move || async move {
                let mut tenant = tenants.get_existing(tenant_key).await?;
                if tenant.has_owner(owner) {
                    return Ok(OperationResult::Unchanged);
                }
                tenant.spec.owners.push(owner.clone());
                tenants.replace(&tenant).await?;
                Ok(OperationResult::Updated)
            })
            .await
    }
}
