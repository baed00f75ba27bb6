use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Kinds of objects the controller reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Tenant,
    ServiceAccount,
    Secret,
    Service,
    ConfigMap,
    AppProject,
}

impl ResourceKind {
    /// The `apiVersion` objects of this kind are served under.
    pub const fn api_version(self) -> &'static str {
        match self {
            Self::Tenant => "capsule.clastix.io/v1beta2",
            Self::ServiceAccount | Self::Secret | Self::Service | Self::ConfigMap => "v1",
            Self::AppProject => "argoproj.io/v1alpha1",
        }
    }

    /// Tenants are cluster scoped; everything else lives in a namespace.
    pub const fn is_namespaced(self) -> bool {
        !matches!(self, Self::Tenant)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tenant => "Tenant",
            Self::ServiceAccount => "ServiceAccount",
            Self::Secret => "Secret",
            Self::Service => "Service",
            Self::ConfigMap => "ConfigMap",
            Self::AppProject => "AppProject",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Tenant" => Ok(Self::Tenant),
            "ServiceAccount" => Ok(Self::ServiceAccount),
            "Secret" => Ok(Self::Secret),
            "Service" => Ok(Self::Service),
            "ConfigMap" => Ok(Self::ConfigMap),
            "AppProject" => Ok(Self::AppProject),
            _ => Err(CoreError::invalid_kind(s)),
        }
    }
}

/// Address of a single object in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    /// Key of a cluster-scoped object.
    pub fn cluster(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: None,
            name: name.into(),
        }
    }

    /// Key of a namespaced object.
    pub fn namespaced(
        kind: ResourceKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}
