//! The CD controller's access-control project.
//!
//! Only the fields the tenancy controller owns are typed. Everything else a
//! project may carry (sync windows, signature keys, ...) is kept verbatim in
//! [`AppProjectSpec::extra`] so that patches never drop it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kind::ResourceKind;
use crate::meta::ObjectMeta;
use crate::resource::Resource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRole {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub policies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn wildcard() -> Self {
        Self {
            group: "*".to_string(),
            kind: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDestination {
    pub name: String,
    pub namespace: String,
    pub server: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppProjectSpec {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub roles: Vec<ProjectRole>,
    #[serde(default)]
    pub cluster_resource_whitelist: Vec<GroupKind>,
    #[serde(default)]
    pub namespace_resource_whitelist: Vec<GroupKind>,
    #[serde(default)]
    pub source_namespaces: Vec<String>,
    #[serde(default)]
    pub source_repos: Vec<String>,
    #[serde(default)]
    pub destinations: Vec<ApplicationDestination>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppProject {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: AppProjectSpec,
}

impl AppProject {
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            metadata,
            spec: AppProjectSpec::default(),
        }
    }

    pub fn role(&self, name: &str) -> Option<&ProjectRole> {
        self.spec.roles.iter().find(|role| role.name == name)
    }
}

impl Resource for AppProject {
    const KIND: ResourceKind = ResourceKind::AppProject;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
