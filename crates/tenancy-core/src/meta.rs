use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Back-pointer from an artifact to the object that owns it.
///
/// The store garbage-collects every object whose owner has disappeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_owner_deletion: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub owner_references: Vec<OwnerReference>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub finalizers: Vec<String>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub creation_timestamp: Option<OffsetDateTime>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub deletion_timestamp: Option<OffsetDateTime>,
    /// `generation`, `managedFields` and anything else the store stamps.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn namespaced(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.set_owner(owner);
        self
    }

    /// Deletion has been requested but finalizers still hold the object.
    pub fn is_being_deleted(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Returns `true` if the finalizer was not present before.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Returns `true` if the finalizer was present.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        before != self.finalizers.len()
    }

    /// Replaces any reference to the same owner uid, keeping other owners.
    pub fn set_owner(&mut self, owner: OwnerReference) {
        match self
            .owner_references
            .iter_mut()
            .find(|existing| existing.uid == owner.uid)
        {
            Some(existing) => *existing = owner,
            None => self.owner_references.push(owner),
        }
    }

    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owner_references.iter().any(|o| o.uid == uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(uid: &str) -> OwnerReference {
        OwnerReference {
            api_version: "v1".into(),
            kind: "Tenant".into(),
            name: "acme".into(),
            uid: uid.into(),
            controller: Some(true),
            block_owner_deletion: Some(false),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_finalizers_are_idempotent() {
        let mut meta = ObjectMeta::new("acme");
        assert!(meta.add_finalizer("x/y"));
        assert!(!meta.add_finalizer("x/y"));
        assert_eq!(meta.finalizers.len(), 1);
        assert!(meta.remove_finalizer("x/y"));
        assert!(!meta.remove_finalizer("x/y"));
        assert!(meta.finalizers.is_empty());
    }

    #[test]
    fn test_set_owner_replaces_same_uid() {
        let mut meta = ObjectMeta::namespaced("acme", "tenants");
        meta.set_owner(owner("u1"));
        let mut updated = owner("u1");
        updated.controller = None;
        meta.set_owner(updated);
        meta.set_owner(owner("u2"));

        assert_eq!(meta.owner_references.len(), 2);
        assert_eq!(meta.owner_references[0].controller, None);
        assert!(meta.is_owned_by("u2"));
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let meta = ObjectMeta::new("acme");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({"name": "acme"}));
    }

    #[test]
    fn test_deletion_timestamp_roundtrip() {
        let mut meta = ObjectMeta::new("acme");
        meta.deletion_timestamp = Some(OffsetDateTime::UNIX_EPOCH);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["deletionTimestamp"], "1970-01-01T00:00:00Z");
        let back: ObjectMeta = serde_json::from_value(json).unwrap();
        assert!(back.is_being_deleted());
    }

    #[test]
    fn test_unknown_metadata_fields_are_kept() {
        let json = serde_json::json!({
            "name": "acme",
            "generation": 7,
            "ownerReferences": [{
                "apiVersion": "v1",
                "kind": "Tenant",
                "name": "acme",
                "uid": "u1",
                "foreground": true
            }]
        });
        let meta: ObjectMeta = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(meta.extra["generation"], 7);
        assert_eq!(serde_json::to_value(&meta).unwrap(), json);
    }
}
