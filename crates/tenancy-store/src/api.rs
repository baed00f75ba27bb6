//! Typed access to a [`ResourceStore`].

use std::marker::PhantomData;

use json_patch::Patch;
use serde_json::Value;
use tenancy_core::{ObjectKey, Resource};
use tracing::trace;

use crate::error::StoreError;
use crate::{DynStore, StoreResult};

/// What a create-or-update / create-or-patch call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    Created,
    Updated,
    Unchanged,
}

impl OperationResult {
    pub fn wrote(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Typed facade over a shared store for one resource kind.
pub struct Api<K> {
    store: DynStore,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for Api<K> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: Resource> Api<K> {
    pub fn new(store: DynStore) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }

    fn check_kind(key: &ObjectKey) -> StoreResult<()> {
        if key.kind != K::KIND {
            return Err(StoreError::invalid(format!(
                "{key} cannot be accessed through a {} api",
                K::KIND
            )));
        }
        Ok(())
    }

    pub async fn get(&self, key: &ObjectKey) -> StoreResult<Option<K>> {
        Self::check_kind(key)?;
        match self.store.get(key).await? {
            Some(object) => Ok(Some(K::from_dynamic(object)?)),
            None => Ok(None),
        }
    }

    /// Like [`Api::get`] but a missing object is an error.
    pub async fn get_existing(&self, key: &ObjectKey) -> StoreResult<K> {
        self.get(key)
            .await?
            .ok_or_else(|| StoreError::not_found(key))
    }

    pub async fn create(&self, object: &K) -> StoreResult<K> {
        let created = self.store.create(&object.to_dynamic()?).await?;
        Ok(K::from_dynamic(created)?)
    }

    pub async fn replace(&self, object: &K) -> StoreResult<K> {
        let updated = self.store.update(&object.to_dynamic()?).await?;
        Ok(K::from_dynamic(updated)?)
    }

    pub async fn replace_status(&self, object: &K) -> StoreResult<K> {
        let updated = self.store.update_status(&object.to_dynamic()?).await?;
        Ok(K::from_dynamic(updated)?)
    }

    pub async fn patch(&self, key: &ObjectKey, patch: &Patch) -> StoreResult<K> {
        Self::check_kind(key)?;
        let patched = self.store.patch(key, patch).await?;
        Ok(K::from_dynamic(patched)?)
    }

    pub async fn delete(&self, key: &ObjectKey) -> StoreResult<()> {
        Self::check_kind(key)?;
        self.store.delete(key).await
    }

    /// Fetches the object named by `desired` (or starts from `desired` when
    /// absent), applies `mutate` and writes it back with full replace
    /// semantics. No write happens when `mutate` leaves an existing object
    /// unchanged.
    ///
    /// The replace carries the fetched resource version, so a concurrent
    /// writer surfaces as `StoreError::Conflict`.
    pub async fn create_or_update<F>(&self, desired: K, mutate: F) -> StoreResult<(K, OperationResult)>
    where
        F: FnOnce(&mut K) -> StoreResult<()>,
    {
        let key = desired.key();
        match self.get(&key).await? {
            None => {
                let mut object = desired;
                mutate(&mut object)?;
                let created = self.create(&object).await?;
                trace!(key = %key, "created");
                Ok((created, OperationResult::Created))
            }
            Some(existing) => {
                let mut object = existing.clone();
                mutate(&mut object)?;
                if to_json(&existing)? == to_json(&object)? {
                    return Ok((existing, OperationResult::Unchanged));
                }
                let updated = self.replace(&object).await?;
                trace!(key = %key, "updated");
                Ok((updated, OperationResult::Updated))
            }
        }
    }

    /// Like [`Api::create_or_update`] but an existing object is changed with a
    /// patch carrying only the fields `mutate` touched, so fields written by
    /// other actors in the meantime are preserved.
    pub async fn create_or_patch<F>(&self, desired: K, mutate: F) -> StoreResult<(K, OperationResult)>
    where
        F: FnOnce(&mut K) -> StoreResult<()>,
    {
        let key = desired.key();
        match self.get(&key).await? {
            None => {
                let mut object = desired;
                mutate(&mut object)?;
                let created = self.create(&object).await?;
                trace!(key = %key, "created");
                Ok((created, OperationResult::Created))
            }
            Some(existing) => {
                let mut object = existing.clone();
                mutate(&mut object)?;
                match diff_patch(&to_json(&existing)?, &to_json(&object)?) {
                    None => Ok((existing, OperationResult::Unchanged)),
                    Some(patch) => {
                        let patched = self.patch(&key, &patch).await?;
                        trace!(key = %key, operations = patch.0.len(), "patched");
                        Ok((patched, OperationResult::Updated))
                    }
                }
            }
        }
    }
}

fn to_json<K: Resource>(object: &K) -> StoreResult<Value> {
    Ok(object.to_dynamic()?.to_value()?)
}

/// Patch turning `before` into `after`, or `None` when they are equal.
pub(crate) fn diff_patch(before: &Value, after: &Value) -> Option<Patch> {
    let patch = json_patch::diff(before, after);
    if patch.0.is_empty() { None } else { Some(patch) }
}
