//! The `Tenant` resource: one isolated customer or team boundary.
//!
//! Tenants are written back whole when finalizers or owners change, so every
//! struct here keeps the fields it does not model in an `extra` map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kind::ResourceKind;
use crate::meta::ObjectMeta;
use crate::resource::Resource;

/// Label selecting the tenant classification; `system` marks system tenants.
pub const TENANT_TYPE_LABEL: &str = "tenancy.dev/type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectKind {
    User,
    Group,
    ServiceAccount,
}

impl SubjectKind {
    /// Human principals; only these are mapped onto CD-controller roles.
    pub const fn is_user_or_group(self) -> bool {
        matches!(self, Self::User | Self::Group)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSpec {
    pub kind: SubjectKind,
    pub name: String,
    /// Owner settings this controller does not act on (`clusterRoles`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OwnerSpec {
    pub fn new(kind: SubjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Subject {
    pub fn new(kind: SubjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalRoleBinding {
    pub cluster_role_name: String,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdditionalRoleBinding {
    pub fn new(cluster_role_name: impl Into<String>, subjects: Vec<Subject>) -> Self {
        Self {
            cluster_role_name: cluster_role_name.into(),
            subjects,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSpec {
    #[serde(default)]
    pub owners: Vec<OwnerSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_role_bindings: Vec<AdditionalRoleBinding>,
    #[serde(default)]
    pub cordoned: bool,
    /// Namespace options, quotas, network policies and the rest of the tenant spec.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantState {
    Active,
    Cordoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TenantStatus {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub state: Option<TenantState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantClass {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: TenantSpec,
    #[serde(default)]
    pub status: TenantStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tenant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(name),
            spec: TenantSpec::default(),
            status: TenantStatus::default(),
            extra: Map::new(),
        }
    }

    pub fn with_owner(mut self, owner: OwnerSpec) -> Self {
        self.spec.owners.push(owner);
        self
    }

    pub fn with_binding(mut self, binding: AdditionalRoleBinding) -> Self {
        self.spec.additional_role_bindings.push(binding);
        self
    }

    pub fn classification(&self) -> TenantClass {
        match self.metadata.labels.get(TENANT_TYPE_LABEL).map(String::as_str) {
            Some("system") => TenantClass::System,
            _ => TenantClass::User,
        }
    }

    /// Owners entry with the same kind and name already present.
    pub fn has_owner(&self, owner: &OwnerSpec) -> bool {
        self.spec
            .owners
            .iter()
            .any(|o| o.kind == owner.kind && o.name == owner.name)
    }

    /// Status state implied by the spec.
    pub fn desired_state(&self) -> TenantState {
        if self.spec.cordoned {
            TenantState::Cordoned
        } else {
            TenantState::Active
        }
    }

    /// Subjects of kind User/Group bound to `role` through additional role bindings.
    pub fn principals_bound_to<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.spec
            .additional_role_bindings
            .iter()
            .filter(move |binding| binding.cluster_role_name == role)
            .flat_map(|binding| binding.subjects.iter())
            .filter(|subject| subject.kind.is_user_or_group())
            .map(|subject| subject.name.as_str())
    }

    /// Owners of kind User/Group.
    pub fn owner_principals(&self) -> impl Iterator<Item = &str> + '_ {
        self.spec
            .owners
            .iter()
            .filter(|owner| owner.kind.is_user_or_group())
            .map(|owner| owner.name.as_str())
    }
}

impl Resource for Tenant {
    const KIND: ResourceKind = ResourceKind::Tenant;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
