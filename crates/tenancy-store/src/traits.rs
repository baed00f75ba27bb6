//! The store contract.

use async_trait::async_trait;
use json_patch::Patch;
use tenancy_core::{DynamicObject, ObjectKey};

use crate::error::StoreError;

/// A declarative object store with optimistic concurrency.
///
/// Every stored object carries a `metadata.resourceVersion` that changes on
/// each write. Implementations must be thread-safe (`Send + Sync`).
///
/// Deletion is two-phase: deleting an object that still has finalizers only
/// stamps `metadata.deletionTimestamp`; the object disappears once a later
/// write leaves its finalizer list empty. When an object disappears, every
/// object listing it in `metadata.ownerReferences` is removed as well.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Reads an object by key.
    ///
    /// Returns `None` if the object does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing objects.
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, StoreError>;

    /// Creates a new object. The store assigns `uid`, `resourceVersion` and
    /// `creationTimestamp`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if an object with the same key exists.
    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject, StoreError>;

    /// Replaces an existing object, except for its `status`.
    ///
    /// If `metadata.resourceVersion` is set the write only succeeds when it
    /// matches the stored version.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the object does not exist.
    /// Returns `StoreError::Conflict` if the version does not match.
    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject, StoreError>;

    /// Replaces only the `status` of an existing object.
    ///
    /// # Errors
    ///
    /// Same as [`ResourceStore::update`].
    async fn update_status(&self, object: &DynamicObject) -> Result<DynamicObject, StoreError>;

    /// Applies a JSON patch (RFC 6902) to the object's JSON form.
    ///
    /// Fields not touched by the patch are preserved. No version precondition
    /// is applied.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the object does not exist.
    /// Returns `StoreError::Invalid` if the patch does not apply.
    async fn patch(&self, key: &ObjectKey, patch: &Patch) -> Result<DynamicObject, StoreError>;

    /// Requests deletion of an object.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the object does not exist.
    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;

    /// Returns the name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}
