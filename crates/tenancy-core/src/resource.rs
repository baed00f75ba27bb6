use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};
use crate::kind::{ObjectKey, ResourceKind};
use crate::meta::{ObjectMeta, OwnerReference};

/// Untyped object envelope exchanged with stores.
///
/// `body` holds every top-level field except `apiVersion`, `kind` and
/// `metadata` (for example `spec`, `status` or `data`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicObject {
    pub api_version: String,
    pub kind: ResourceKind,
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl DynamicObject {
    pub fn new(kind: ResourceKind, metadata: ObjectMeta) -> Self {
        Self {
            api_version: kind.api_version().to_string(),
            kind,
            metadata,
            body: Map::new(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey {
            kind: self.kind,
            namespace: self.metadata.namespace.clone(),
            name: self.metadata.name.clone(),
        }
    }

    /// Body and metadata as one JSON object, as seen by patch operations.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// A typed record that can be stored.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn name(&self) -> &str {
        &self.metadata().name
    }

    fn key(&self) -> ObjectKey {
        ObjectKey {
            kind: Self::KIND,
            namespace: self.metadata().namespace.clone(),
            name: self.metadata().name.clone(),
        }
    }

    fn to_dynamic(&self) -> Result<DynamicObject> {
        let Value::Object(mut body) = serde_json::to_value(self)? else {
            return Err(CoreError::invalid_resource(format!(
                "{} did not serialize to an object",
                Self::KIND
            )));
        };
        let metadata = match body.remove("metadata") {
            Some(meta) => serde_json::from_value(meta)?,
            None => ObjectMeta::default(),
        };
        body.remove("apiVersion");
        body.remove("kind");

        Ok(DynamicObject {
            api_version: Self::KIND.api_version().to_string(),
            kind: Self::KIND,
            metadata,
            body,
        })
    }

    fn from_dynamic(object: DynamicObject) -> Result<Self> {
        if object.kind != Self::KIND {
            return Err(CoreError::invalid_resource(format!(
                "expected {} but got {}",
                Self::KIND,
                object.kind
            )));
        }
        let mut body = object.body;
        body.insert("metadata".to_string(), serde_json::to_value(object.metadata)?);
        Ok(serde_json::from_value(Value::Object(body))?)
    }
}

/// Builds the controlling owner reference pointing at `owner`.
///
/// The owner must already be persisted (have a uid).
pub fn controller_reference<R: Resource>(owner: &R) -> Result<OwnerReference> {
    let meta = owner.metadata();
    let uid = meta
        .uid
        .clone()
        .ok_or_else(|| CoreError::missing_uid(R::KIND.as_str(), &meta.name))?;

    Ok(OwnerReference {
        api_version: R::KIND.api_version().to_string(),
        kind: R::KIND.to_string(),
        name: meta.name.clone(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(false),
        extra: Map::new(),
    })
}
