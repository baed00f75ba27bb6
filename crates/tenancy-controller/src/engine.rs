//! Finalizer-gated lifecycle of a tenant.
//!
//! ```text
//! Active ──(deletion requested)──> Deleting ──(finalizer removed)──> Gone
//! ```
//!
//! Every invocation starts from whatever the store holds now, so redelivered
//! or out-of-order requests are harmless.

use std::sync::Arc;

use tenancy_core::{ObjectKey, ResourceKind, Tenant};
use tenancy_store::{Api, DynStore, OperationResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ControllerConfig;
use crate::document::PolicyDocument;
use crate::error::{Action, ReconcileError, Result};
use crate::finalize::finalize;
use crate::retry::{Backoff, ConflictRetry};
use crate::sync::{ResourceSynchronizer, SyncReport};

/// Result of one successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The tenant no longer exists.
    NotFound,
    /// Artifacts converged; the finalizer and status are in place.
    Synced(SyncReport),
    /// Cleanup ran and the finalizer was removed.
    Finalized,
    /// Deletion is in progress but this controller's finalizer is already gone.
    AlreadyFinalized,
}

pub struct ReconciliationEngine {
    config: Arc<ControllerConfig>,
    tenants: Api<Tenant>,
    synchronizer: ResourceSynchronizer,
    document: PolicyDocument,
    retry: ConflictRetry,
    cancel: CancellationToken,
}

impl ReconciliationEngine {
    pub fn new(store: DynStore, config: ControllerConfig) -> Self {
        Self::with_cancellation(store, config, CancellationToken::new())
    }

    /// Builds an engine whose retry loops stop once `cancel` fires.
    pub fn with_cancellation(
        store: DynStore,
        config: ControllerConfig,
        cancel: CancellationToken,
    ) -> Self {
        let config = Arc::new(config);
        let retry = ConflictRetry::new(Backoff::from(&config.retry), cancel.clone());
        let document = PolicyDocument::new(store.clone(), &config, retry.clone());
        let synchronizer = ResourceSynchronizer::new(
            store.clone(),
            config.clone(),
            document.clone(),
            retry.clone(),
        );

        info!(
            backend = store.backend_name(),
            finalizer = %config.finalizer,
            "reconciliation engine ready"
        );

        Self {
            tenants: Api::new(store),
            config,
            synchronizer,
            document,
            retry,
            cancel,
        }
    }

    /// Aborts in-flight retry loops and rejects further invocations.
    pub fn shutdown(&self) {
        info!("reconciliation engine shutting down");
        self.cancel.cancel();
    }

    /// Converges the world to the named tenant's current state.
    #[instrument(skip_all, fields(tenant = %name))]
    pub async fn reconcile(&self, name: &str) -> Result<ReconcileOutcome> {
        if self.cancel.is_cancelled() {
            return Err(ReconcileError::Cancelled);
        }

        let key = ObjectKey::cluster(ResourceKind::Tenant, name);
        let Some(tenant) = self.tenants.get(&key).await? else {
            debug!("tenant not found, nothing to do");
            return Ok(ReconcileOutcome::NotFound);
        };

        if tenant.metadata.is_being_deleted() {
            if !tenant.metadata.has_finalizer(&self.config.finalizer) {
                debug!("deletion in progress and already finalized");
                return Ok(ReconcileOutcome::AlreadyFinalized);
            }
            finalize(&self.document, &tenant).await?;
            self.remove_finalizer(&key).await?;
            info!("tenant finalized");
            return Ok(ReconcileOutcome::Finalized);
        }

        let report = self.synchronizer.sync(&tenant).await?;
        if self.add_finalizer(&key).await?.wrote() {
            info!("finalizer added");
        }
        self.update_status(&key).await?;
        info!(writes = report.writes(), "tenant synchronized");
        Ok(ReconcileOutcome::Synced(report))
    }

    /// Maps a failed invocation onto what the dispatcher should do next.
    ///
    /// Only cancellation stops redelivery. Transient failures come back after
    /// the last backoff step, everything else after the failure delay.
    pub fn error_policy(&self, err: &ReconcileError) -> Action {
        match err {
            err if !err.is_retryable() => {
                debug!(error = %err, "reconciliation stopped, waiting for changes");
                Action::AwaitChange
            }
            ReconcileError::TokenNotMaterialized { .. } => {
                Action::Requeue(self.config.token.requeue_after())
            }
            err => {
                let delay = if err.is_transient() {
                    self.retry.backoff().base_delay(self.retry.backoff().steps)
                } else {
                    self.config.retry.failure_requeue()
                };
                let category = err
                    .store_category()
                    .map_or_else(|| "controller".to_string(), |c| c.to_string());
                warn!(
                    error = %err,
                    %category,
                    delay_ms = delay.as_millis() as u64,
                    "reconciliation failed, requeueing"
                );
                Action::Requeue(delay)
            }
        }
    }

    async fn add_finalizer(&self, key: &ObjectKey) -> Result<OperationResult> {
        let finalizer = self.config.finalizer.as_str();
        let tenants = &self.tenants;
        self.retry
            .run("add finalizer", move || async move {
                let Some(mut tenant) = tenants.get(key).await? else {
                    return Ok(OperationResult::Unchanged);
                };
                if tenant.metadata.is_being_deleted() || !tenant.metadata.add_finalizer(finalizer) {
                    return Ok(OperationResult::Unchanged);
                }
                tenants.replace(&tenant).await?;
                Ok(OperationResult::Updated)
            })
            .await
    }

    async fn remove_finalizer(&self, key: &ObjectKey) -> Result<OperationResult> {
        let finalizer = self.config.finalizer.as_str();
        let tenants = &self.tenants;
        self.retry
            .run("remove finalizer", move || async move {
                let Some(mut tenant) = tenants.get(key).await? else {
                    return Ok(OperationResult::Unchanged);
                };
                if !tenant.metadata.remove_finalizer(finalizer) {
                    return Ok(OperationResult::Unchanged);
                }
                tenants.replace(&tenant).await?;
                Ok(OperationResult::Updated)
            })
            .await
    }

    /// Mirrors the cordoned flag into the status sub-resource.
    async fn update_status(&self, key: &ObjectKey) -> Result<OperationResult> {
        let tenants = &self.tenants;
        self.retry
            .run("update status", move || async move {
                let Some(mut tenant) = tenants.get(key).await? else {
                    return Ok(OperationResult::Unchanged);
                };
                let desired = tenant.desired_state();
                if tenant.status.state == Some(desired) {
                    return Ok(OperationResult::Unchanged);
                }
                tenant.status.state = Some(desired);
                tenants.replace_status(&tenant).await?;
                debug!(state = ?desired, "status updated");
                Ok(OperationResult::Updated)
            })
            .await
    }
}
