//! # tenancy-store
//!
//! The declarative object store the tenancy controller runs against.
//!
//! This crate defines the contract only. Backends live in separate crates
//! (`tenancy-store-memory` for tests and local runs).
//!
//! ## Overview
//!
//! [`ResourceStore`] is the untyped, object-safe contract: versioned get /
//! create / update / update_status / patch / delete. [`Api`] layers typed
//! access on top, including the two idempotent write helpers the controller
//! builds on:
//!
//! - [`Api::create_or_update`]: full replace, guarded by resource version
//! - [`Api::create_or_patch`]: JSON patch of the touched fields only
//!
//! ## Example
//!
//! ```ignore
//! use tenancy_core::{ConfigMap, ObjectKey, ResourceKind};
//! use tenancy_store::{Api, DynStore};
//!
//! async fn policy_entry(store: DynStore, tenant: &str) -> StoreResult<Option<String>> {
//!     let api = Api::<ConfigMap>::new(store);
//!     let key = ObjectKey::namespaced(ResourceKind::ConfigMap, "argocd", "argocd-rbac-cm");
//!     let cm = api.get_existing(&key).await?;
//!     Ok(cm.data.get(&format!("policy.{tenant}.csv")).cloned())
//! }
//! ```

mod api;
mod error;
mod traits;

pub use api::{Api, OperationResult};
pub use error::{ErrorCategory, StoreError};
pub use json_patch::Patch;
pub use traits::ResourceStore;

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn ResourceStore>;
