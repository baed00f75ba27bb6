//! Implementation of the ResourceStore trait for InMemoryStore.

use async_trait::async_trait;
use json_patch::Patch;
use serde_json::Value;
use tenancy_core::{DynamicObject, ObjectKey};
use tenancy_store::{ResourceStore, StoreError};
use time::OffsetDateTime;

use crate::storage::{InMemoryStore, fill_token, is_token_secret};

/// Rejects keys whose namespace does not fit the kind's scope.
fn validate_key(key: &ObjectKey) -> Result<(), StoreError> {
    if key.name.is_empty() {
        return Err(StoreError::invalid(format!("{} without a name", key.kind)));
    }
    match (key.kind.is_namespaced(), key.namespace.as_deref()) {
        (true, None | Some("")) => Err(StoreError::invalid(format!(
            "{key} is namespaced but has no namespace"
        ))),
        (false, Some(_)) => Err(StoreError::invalid(format!(
            "{key} is cluster scoped but has a namespace"
        ))),
        _ => Ok(()),
    }
}

/// Fails unless the writer's version (when given) matches the stored one.
fn check_version(key: &ObjectKey, stored: &DynamicObject, incoming: &DynamicObject) -> Result<(), StoreError> {
    let actual = stored.metadata.resource_version.as_deref().unwrap_or_default();
    match incoming.metadata.resource_version.as_deref() {
        Some(expected) if expected != actual => Err(StoreError::conflict(key, expected, actual)),
        _ => Ok(()),
    }
}

/// Carries the server-owned metadata of `stored` over to `next`.
fn preserve_server_fields(stored: &DynamicObject, next: &mut DynamicObject) {
    next.metadata.uid = stored.metadata.uid.clone();
    next.metadata.creation_timestamp = stored.metadata.creation_timestamp;
    next.metadata.deletion_timestamp = stored.metadata.deletion_timestamp;
    next.api_version = stored.api_version.clone();
}

impl InMemoryStore {
    /// Stores `next` under `key`, or removes it when deletion was requested and
    /// no finalizer is left.
    fn commit(
        &self,
        objects: &mut std::collections::HashMap<ObjectKey, DynamicObject>,
        key: &ObjectKey,
        mut next: DynamicObject,
    ) -> DynamicObject {
        next.metadata.resource_version = Some(self.next_version());
        if next.metadata.is_being_deleted() && next.metadata.finalizers.is_empty() {
            objects.insert(key.clone(), next.clone());
            self.remove_with_cascade(objects, key);
        } else {
            objects.insert(key.clone(), next.clone());
        }
        next
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, StoreError> {
        let guard = self.objects.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let key = object.key();
        validate_key(&key)?;

        let mut created = object.clone();
        created.api_version = key.kind.api_version().to_string();
        created.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        created.metadata.resource_version = Some(self.next_version());
        created.metadata.creation_timestamp = Some(OffsetDateTime::now_utc());
        created.metadata.deletion_timestamp = None;
        if self.issues_tokens() && is_token_secret(&created) {
            fill_token(&mut created);
        }

        let mut guard = self.objects.write().await;
        if guard.contains_key(&key) {
            return Err(StoreError::already_exists(&key));
        }
        guard.insert(key, created.clone());
        Ok(created)
    }

    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let key = object.key();
        let mut guard = self.objects.write().await;
        let stored = guard.get(&key).ok_or_else(|| StoreError::not_found(&key))?;
        check_version(&key, stored, object)?;

        let mut next = object.clone();
        preserve_server_fields(stored, &mut next);
        match stored.body.get("status") {
            Some(status) => {
                next.body.insert("status".to_string(), status.clone());
            }
            None => {
                next.body.remove("status");
            }
        }

        Ok(self.commit(&mut guard, &key, next))
    }

    async fn update_status(&self, object: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let key = object.key();
        let mut guard = self.objects.write().await;
        let stored = guard.get(&key).ok_or_else(|| StoreError::not_found(&key))?;
        check_version(&key, stored, object)?;

        let mut next = stored.clone();
        match object.body.get("status") {
            Some(status) => {
                next.body.insert("status".to_string(), status.clone());
            }
            None => {
                next.body.remove("status");
            }
        }

        Ok(self.commit(&mut guard, &key, next))
    }

    async fn patch(&self, key: &ObjectKey, patch: &Patch) -> Result<DynamicObject, StoreError> {
        let mut guard = self.objects.write().await;
        let stored = guard.get(key).ok_or_else(|| StoreError::not_found(key))?;

        let mut document: Value = stored.to_value()?;
        json_patch::patch(&mut document, &patch.0)
            .map_err(|e| StoreError::invalid(format!("patch on {key} failed: {e}")))?;
        let mut next = DynamicObject::from_value(document)?;
        if next.key() != *key {
            return Err(StoreError::invalid(format!(
                "patch on {key} must not change kind, namespace or name"
            )));
        }
        preserve_server_fields(stored, &mut next);

        Ok(self.commit(&mut guard, key, next))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut guard = self.objects.write().await;
        let stored = guard.get_mut(key).ok_or_else(|| StoreError::not_found(key))?;

        if stored.metadata.finalizers.is_empty() {
            self.remove_with_cascade(&mut guard, key);
        } else if stored.metadata.deletion_timestamp.is_none() {
            stored.metadata.deletion_timestamp = Some(OffsetDateTime::now_utc());
            stored.metadata.resource_version = Some(self.next_version());
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
