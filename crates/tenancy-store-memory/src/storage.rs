use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tenancy_core::{DynamicObject, ObjectKey, ResourceKind};
use tenancy_store::{StoreError, StoreResult};
use tokio::sync::RwLock;

/// Annotation binding a token secret to its service account.
pub const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";

const TOKEN_SECRET_TYPE: &str = "kubernetes.io/service-account-token";

/// In-memory object store.
///
/// A single write lock serializes mutations, so version checks, finalizer
/// handling and cascading removal are atomic with respect to each other.
#[derive(Debug)]
pub struct InMemoryStore {
    pub(crate) objects: RwLock<HashMap<ObjectKey, DynamicObject>>,
    /// Atomic counter for generating resource versions
    version_counter: AtomicU64,
    /// Populate service-account tokens as soon as their secret is created
    issue_tokens: bool,
}

impl InMemoryStore {
    /// Creates a new empty store. Token secrets stay empty until
    /// [`InMemoryStore::issue_service_account_token`] is called.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            version_counter: AtomicU64::new(1),
            issue_tokens: false,
        }
    }

    /// Creates a store that fills service-account token secrets on creation,
    /// standing in for the cluster's token controller.
    pub fn with_token_issuer() -> Self {
        Self {
            issue_tokens: true,
            ..Self::new()
        }
    }

    /// Generates the next resource version.
    pub(crate) fn next_version(&self) -> String {
        self.version_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    pub(crate) fn issues_tokens(&self) -> bool {
        self.issue_tokens
    }

    /// All objects of one kind, sorted by key.
    pub async fn list(&self, kind: ResourceKind) -> Vec<DynamicObject> {
        let guard = self.objects.read().await;
        let mut items: Vec<DynamicObject> = guard
            .values()
            .filter(|object| object.kind == kind)
            .cloned()
            .collect();
        items.sort_by_key(DynamicObject::key);
        items
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Fills the `token` entry of a service-account token secret, the way the
    /// cluster's token controller eventually does.
    pub async fn issue_service_account_token(&self, key: &ObjectKey) -> StoreResult<String> {
        let mut guard = self.objects.write().await;
        let object = guard
            .get_mut(key)
            .ok_or_else(|| StoreError::not_found(key))?;
        if !is_token_secret(object) {
            return Err(StoreError::invalid(format!(
                "{key} is not a service-account token secret"
            )));
        }
        let token = fill_token(object);
        object.metadata.resource_version = Some(self.next_version());
        Ok(token)
    }

    /// Removes `root` and every object transitively owned by it.
    ///
    /// Owned objects that still carry finalizers are only marked for deletion.
    pub(crate) fn remove_with_cascade(
        &self,
        objects: &mut HashMap<ObjectKey, DynamicObject>,
        root: &ObjectKey,
    ) {
        let mut pending = vec![root.clone()];
        while let Some(key) = pending.pop() {
            let Some(removed) = objects.remove(&key) else {
                continue;
            };
            tracing::trace!(key = %key, "object removed");
            let Some(uid) = removed.metadata.uid else {
                continue;
            };

            let dependents: Vec<ObjectKey> = objects
                .values()
                .filter(|object| object.metadata.is_owned_by(&uid))
                .map(DynamicObject::key)
                .collect();

            for dependent in dependents {
                let Some(object) = objects.get_mut(&dependent) else {
                    continue;
                };
                if object.metadata.finalizers.is_empty() {
                    pending.push(dependent);
                } else if object.metadata.deletion_timestamp.is_none() {
                    object.metadata.deletion_timestamp = Some(time::OffsetDateTime::now_utc());
                    object.metadata.resource_version = Some(self.next_version());
                }
            }
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn is_token_secret(object: &DynamicObject) -> bool {
    object.kind == ResourceKind::Secret
        && object.body.get("type").and_then(|v| v.as_str()) == Some(TOKEN_SECRET_TYPE)
        && object
            .metadata
            .annotations
            .contains_key(SERVICE_ACCOUNT_NAME_ANNOTATION)
}

/// Writes a fresh token into the secret's data and returns it.
pub(crate) fn fill_token(object: &mut DynamicObject) -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    let data = object
        .body
        .entry("data")
        .or_insert_with(|| serde_json::json!({}));
    if let Some(map) = data.as_object_mut() {
        map.insert("token".to_string(), serde_json::Value::String(token.clone()));
    }
    token
}
