//! Plain cluster objects owned by a tenant.
//!
//! Only the fields the controller writes are typed; the rest of each object
//! rides along in `extra` so a full replace never strips it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::kind::ResourceKind;
use crate::meta::ObjectMeta;
use crate::resource::Resource;

macro_rules! impl_resource {
    ($ty:ty, $kind:expr) => {
        impl Resource for $ty {
            const KIND: ResourceKind = $kind;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub metadata: ObjectMeta,
    /// `secrets`, `imagePullSecrets`, `automountServiceAccountToken`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServiceAccount {
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            metadata,
            extra: Map::new(),
        }
    }
}

impl_resource!(ServiceAccount, ResourceKind::ServiceAccount);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SecretType {
    #[default]
    Opaque,
    #[serde(rename = "kubernetes.io/service-account-token")]
    ServiceAccountToken,
}

/// Secret payload kept as plain strings; encoding is the store's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub metadata: ObjectMeta,
    #[serde(rename = "type", default)]
    pub type_: SecretType,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub data: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Secret {
    pub fn new(metadata: ObjectMeta, type_: SecretType) -> Self {
        Self {
            metadata,
            type_,
            data: BTreeMap::new(),
            extra: Map::new(),
        }
    }
}

impl_resource!(Secret, ResourceKind::Secret);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    pub name: String,
    pub port: u16,
    pub target_port: u16,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServicePort {
    pub fn new(name: impl Into<String>, port: u16, target_port: u16) -> Self {
        Self {
            name: name.into(),
            port,
            target_port,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServiceSpec {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    /// `clusterIP`, `ipFamilies`, `sessionAffinity` and other server-populated fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ServiceSpec,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Service {
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            metadata,
            spec: ServiceSpec::default(),
            extra: Map::new(),
        }
    }
}

impl_resource!(Service, ResourceKind::Service);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMap {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    /// `binaryData`, `immutable`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigMap {
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            metadata,
            data: BTreeMap::new(),
            extra: Map::new(),
        }
    }
}

impl_resource!(ConfigMap, ResourceKind::ConfigMap);
