//! # tenancy-core
//!
//! Resource model shared by the tenancy controller crates.
//!
//! Every object the controller reads or writes is expressed as a typed record
//! implementing [`Resource`]. Stores exchange the untyped [`DynamicObject`]
//! envelope; the typed records convert to and from it losslessly.

pub mod error;
pub mod kind;
pub mod meta;
pub mod objects;
pub mod project;
pub mod resource;
pub mod tenant;

pub use error::{CoreError, Result};
pub use kind::{ObjectKey, ResourceKind};
pub use meta::{ObjectMeta, OwnerReference};
pub use objects::{ConfigMap, Secret, SecretType, Service, ServiceAccount, ServicePort, ServiceSpec};
pub use project::{AppProject, AppProjectSpec, ApplicationDestination, GroupKind, ProjectRole};
pub use resource::{DynamicObject, Resource, controller_reference};
pub use tenant::{
    AdditionalRoleBinding, OwnerSpec, Subject, SubjectKind, TENANT_TYPE_LABEL, Tenant,
    TenantClass, TenantSpec, TenantState, TenantStatus,
};
