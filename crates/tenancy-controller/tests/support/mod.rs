//! Shared fixtures for the controller integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tenancy_controller::{ControllerConfig, ReconciliationEngine};
use tenancy_core::{
    ConfigMap, DynamicObject, ObjectKey, ObjectMeta, OwnerSpec, Resource, ResourceKind,
    SubjectKind, Tenant,
};
use tenancy_store::{Api, DynStore, Patch, ResourceStore, StoreError};
use tenancy_store_memory::InMemoryStore;

pub const ARGOCD: &str = "argocd";
pub const POLICY_CONFIG_MAP: &str = "argocd-rbac-cm";
pub const FOREIGN_ENTRY: &str = "policy.default.csv";

type Interference = Arc<dyn Fn(&mut DynamicObject) + Send + Sync>;

/// Wraps the in-memory store, counting writes per key and simulating
/// concurrent writers.
pub struct TestStore {
    pub inner: Arc<InMemoryStore>,
    writes: Mutex<HashMap<ObjectKey, usize>>,
    failures: Mutex<HashMap<ObjectKey, u32>>,
    rejections: Mutex<HashMap<ObjectKey, u32>>,
    interference: Mutex<HashMap<ObjectKey, (u32, Interference)>>,
}

impl TestStore {
    pub fn new(inner: InMemoryStore) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(inner),
            writes: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            rejections: Mutex::new(HashMap::new()),
            interference: Mutex::new(HashMap::new()),
        })
    }

    pub fn writes_to(&self, key: &ObjectKey) -> usize {
        self.writes.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn total_writes(&self) -> usize {
        self.writes.lock().unwrap().values().sum()
    }

    /// Rejects the next `times` updates of `key` with a conflict.
    pub fn fail_updates(&self, key: ObjectKey, times: u32) {
        self.failures.lock().unwrap().insert(key, times);
    }

    /// Rejects the next `times` patches of `key` as invalid.
    pub fn reject_patches(&self, key: ObjectKey, times: u32) {
        self.rejections.lock().unwrap().insert(key, times);
    }

    /// Before each of the next `times` updates of `key`, lets another writer
    /// apply `change` to the stored object, making the incoming update stale.
    pub fn interfere(
        &self,
        key: ObjectKey,
        times: u32,
        change: impl Fn(&mut DynamicObject) + Send + Sync + 'static,
    ) {
        self.interference
            .lock()
            .unwrap()
            .insert(key, (times, Arc::new(change)));
    }

    fn record(&self, key: ObjectKey) {
        *self.writes.lock().unwrap().entry(key).or_insert(0) += 1;
    }

    fn injected_failure(&self, key: &ObjectKey) -> Option<StoreError> {
        let mut failures = self.failures.lock().unwrap();
        let remaining = failures.get_mut(key)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(StoreError::conflict(key, "injected", "injected"))
    }

    fn injected_rejection(&self, key: &ObjectKey) -> Option<StoreError> {
        let mut rejections = self.rejections.lock().unwrap();
        let remaining = rejections.get_mut(key)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(StoreError::invalid(format!("{key}: patch rejected by admission")))
    }

    fn pending_interference(&self, key: &ObjectKey) -> Option<Interference> {
        let mut interference = self.interference.lock().unwrap();
        let (remaining, change) = interference.get_mut(key)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(change.clone())
    }

    async fn before_update(&self, key: &ObjectKey) -> Result<(), StoreError> {
        if let Some(err) = self.injected_failure(key) {
            return Err(err);
        }
        if let Some(change) = self.pending_interference(key) {
            if let Some(mut current) = self.inner.get(key).await? {
                change(&mut current);
                self.inner.update(&current).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for TestStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, StoreError> {
        self.inner.get(key).await
    }

    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let created = self.inner.create(object).await?;
        self.record(object.key());
        Ok(created)
    }

    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let key = object.key();
        self.before_update(&key).await?;
        let updated = self.inner.update(object).await?;
        self.record(key);
        Ok(updated)
    }

    async fn update_status(&self, object: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let key = object.key();
        self.before_update(&key).await?;
        let updated = self.inner.update_status(object).await?;
        self.record(key);
        Ok(updated)
    }

    async fn patch(&self, key: &ObjectKey, patch: &Patch) -> Result<DynamicObject, StoreError> {
        if let Some(err) = self.injected_rejection(key) {
            return Err(err);
        }
        let patched = self.inner.patch(key, patch).await?;
        self.record(key.clone());
        Ok(patched)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.inner.delete(key).await?;
        self.record(key.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "test"
    }
}

pub fn policy_document_key() -> ObjectKey {
    ObjectKey::namespaced(ResourceKind::ConfigMap, ARGOCD, POLICY_CONFIG_MAP)
}

pub fn tenant_key(name: &str) -> ObjectKey {
    ObjectKey::cluster(ResourceKind::Tenant, name)
}

/// Retry schedule short enough to keep conflict tests fast.
pub fn test_config() -> ControllerConfig {
    let mut config = ControllerConfig::default();
    config.retry.initial_delay_ms = 1;
    config.retry.factor = 2.0;
    config
}

pub struct Harness {
    pub store: Arc<TestStore>,
    pub engine: ReconciliationEngine,
}

impl Harness {
    /// Store that issues tokens immediately, seeded with a policy document
    /// holding one unrelated entry.
    pub async fn new() -> Self {
        Self::with_store(InMemoryStore::with_token_issuer(), test_config()).await
    }

    pub async fn with_store(inner: InMemoryStore, config: ControllerConfig) -> Self {
        let store = TestStore::new(inner);
        seed_policy_document(store.clone()).await;
        let engine = ReconciliationEngine::new(store.clone(), config);
        Self { store, engine }
    }

    pub fn dyn_store(&self) -> DynStore {
        self.store.clone()
    }

    pub fn tenants(&self) -> Api<Tenant> {
        Api::new(self.dyn_store())
    }

    pub async fn create_tenant(&self, tenant: Tenant) -> Tenant {
        self.tenants().create(&tenant).await.unwrap()
    }

    pub async fn tenant(&self, name: &str) -> Option<Tenant> {
        self.tenants().get(&tenant_key(name)).await.unwrap()
    }

    pub async fn policy_document(&self) -> ConfigMap {
        Api::<ConfigMap>::new(self.dyn_store())
            .get_existing(&policy_document_key())
            .await
            .unwrap()
    }

    pub async fn get<K: Resource>(&self, key: &ObjectKey) -> Option<K> {
        Api::<K>::new(self.dyn_store()).get(key).await.unwrap()
    }

    /// Requests deletion of a tenant the way an external actor would.
    pub async fn delete_tenant(&self, name: &str) {
        self.tenants().delete(&tenant_key(name)).await.unwrap();
    }
}

async fn seed_policy_document(store: Arc<TestStore>) {
    let mut document = ConfigMap::new(ObjectMeta::namespaced(POLICY_CONFIG_MAP, ARGOCD));
    document
        .data
        .insert(FOREIGN_ENTRY.to_string(), "g, admins, role:admin\n".to_string());
    store.inner.create(&document.to_dynamic().unwrap()).await.unwrap();
}

pub fn user(name: &str) -> OwnerSpec {
    OwnerSpec::new(SubjectKind::User, name)
}
