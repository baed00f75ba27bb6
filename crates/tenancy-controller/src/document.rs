//! The shared policy document: one config map holding an entry per tenant.
//!
//! Every tenant's reconciliation writes to the same object, so all mutations
//! go through [`ConflictRetry`] and re-read the document on each attempt.

use tenancy_core::{ConfigMap, ObjectKey, ResourceKind};
use tenancy_store::{Api, DynStore, OperationResult};
use tracing::debug;

use crate::config::ControllerConfig;
use crate::error::{ReconcileError, Result};
use crate::policy::policy_key;
use crate::retry::ConflictRetry;

#[derive(Clone)]
pub struct PolicyDocument {
    api: Api<ConfigMap>,
    key: ObjectKey,
    retry: ConflictRetry,
}

impl PolicyDocument {
    pub fn new(store: DynStore, config: &ControllerConfig, retry: ConflictRetry) -> Self {
        Self {
            api: Api::new(store),
            key: ObjectKey::namespaced(
                ResourceKind::ConfigMap,
                config.argocd.namespace.clone(),
                config.argocd.policy_config_map.clone(),
            ),
            retry,
        }
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    /// Latest document; a missing document is an error, never created here.
    async fn fetch(&self) -> Result<ConfigMap> {
        self.api
            .get(&self.key)
            .await?
            .ok_or_else(|| ReconcileError::missing_policy_document(&self.key))
    }

    /// Current policy text for `tenant`.
    pub async fn entry(&self, tenant: &str) -> Result<Option<String>> {
        let document = self.fetch().await?;
        Ok(document.data.get(&policy_key(tenant)).cloned())
    }

    /// Stores `text` under the tenant's key. No write happens when the entry
    /// already holds exactly `text`.
    pub async fn upsert(&self, tenant: &str, text: &str) -> Result<OperationResult> {
        let entry = policy_key(tenant);
        let entry = &entry;
        self.retry
            .run("update policy entry", move || async move {
                let mut document = self.fetch().await?;
                let outcome = match document.data.get(entry) {
                    Some(current) if current == text => return Ok(OperationResult::Unchanged),
                    Some(_) => OperationResult::Updated,
                    None => OperationResult::Created,
                };
                document.data.insert(entry.clone(), text.to_string());
                self.api.replace(&document).await?;
                debug!(key = %entry, ?outcome, "policy entry written");
                Ok(outcome)
            })
            .await
    }

    /// Deletes the tenant's entry, leaving every other entry untouched.
    /// Returns whether an entry was removed.
    pub async fn remove(&self, tenant: &str) -> Result<bool> {
        let entry = policy_key(tenant);
        let entry = &entry;
        self.retry
            .run("remove policy entry", move || async move {
                let mut document = self.fetch().await?;
                if document.data.remove(entry).is_none() {
                    return Ok(false);
                }
                self.api.replace(&document).await?;
                debug!(key = %entry, "policy entry removed");
                Ok(true)
            })
            .await
    }
}
