//! In-memory resource store for the tenancy controller.
//!
//! This crate provides an in-memory implementation of the `ResourceStore`
//! trait from `tenancy-store`, with the optimistic concurrency, finalizer and
//! ownership-cascade behavior the controller relies on.
//!
//! # Example
//!
//! ```ignore
//! use tenancy_core::{Resource, Tenant};
//! use tenancy_store::Api;
//! use tenancy_store_memory::create_store;
//!
//! let store = create_store();
//! let tenants = Api::<Tenant>::new(store.clone());
//! let created = tenants.create(&Tenant::new("acme")).await?;
//! assert!(created.metadata.uid.is_some());
//! ```

mod store_impl;
pub mod storage;

pub use storage::InMemoryStore;
pub use tenancy_store::{DynStore, ResourceStore, StoreError};

/// Creates a new shareable in-memory store.
pub fn create_store() -> DynStore {
    std::sync::Arc::new(InMemoryStore::new())
}
