//! # tenancy-controller
//!
//! Reconciles `Tenant` resources into the artifacts a CD controller needs to
//! operate on a tenant-scoped view of a shared cluster: a service account and
//! its token, a routing endpoint through the shared proxy, a cluster
//! registration secret, an access-control project and an entry in the shared
//! RBAC policy document.
//!
//! The watch/dispatch loop is not part of this crate. A dispatcher calls
//! [`ReconciliationEngine::reconcile`] with a tenant name, guaranteeing that
//! no two invocations for the same name overlap, and feeds failures through
//! [`ReconciliationEngine::error_policy`] to decide when to try again.
//!
//! ```ignore
//! let config = tenancy_controller::bootstrap(Some("tenancy.toml"))?;
//! let engine = ReconciliationEngine::new(store, config);
//! match engine.reconcile("acme").await {
//!     Ok(outcome) => tracing::info!(?outcome, "done"),
//!     Err(err) => schedule(engine.error_policy(&err)),
//! }
//! ```

pub mod artifacts;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod finalize;
pub mod observability;
pub mod policy;
pub mod retry;
pub mod sync;

pub use config::{ConfigError, ControllerConfig};
pub use document::PolicyDocument;
pub use engine::{ReconcileOutcome, ReconciliationEngine};
pub use error::{Action, ReconcileError, Result};
pub use policy::{Tier, policy_key, render_policy};
pub use retry::{Backoff, ConflictRetry};
pub use sync::{ResourceSynchronizer, SyncReport};

/// Installs the tracing subscriber, loads configuration and switches the log
/// level to the configured one.
pub fn bootstrap(config_path: Option<&str>) -> std::result::Result<ControllerConfig, ConfigError> {
    observability::init_tracing(&config::LoggingConfig::default());
    let config = match config::loader::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration rejected");
            return Err(e);
        }
    };
    observability::apply_logging_config(&config.logging);
    tracing::info!(
        user_tenants = %config.namespaces.user_tenants,
        system_tenants = %config.namespaces.system_tenants,
        argocd = %config.argocd.namespace,
        "configuration loaded"
    );
    Ok(config)
}

/// Re-reads configuration and applies the log level from it.
///
/// The rest of the returned configuration only affects engines built from
/// it afterwards. On error the running log level is left untouched.
pub fn reload(config_path: Option<&str>) -> std::result::Result<ControllerConfig, ConfigError> {
    let config = config::loader::load_config(config_path)?;
    observability::apply_logging_config(&config.logging);
    tracing::info!(level = %config.logging.level, "configuration reloaded");
    Ok(config)
}
