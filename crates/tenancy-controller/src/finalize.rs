//! Teardown of a tenant marked for deletion.
//!
//! Only the shared policy entry is removed here. Everything else the tenant
//! owns carries an owner reference and is collected by the store once the
//! tenant itself is gone.

use tenancy_core::Tenant;
use tracing::info;

use crate::document::PolicyDocument;
use crate::error::Result;

/// Reverses the side effects of a tenant that ownership cascading cannot.
///
/// Fails when the policy document cannot be read, which keeps the finalizer in
/// place until a later attempt succeeds.
pub async fn finalize(document: &PolicyDocument, tenant: &Tenant) -> Result<()> {
    let name = tenant.metadata.name.as_str();
    let removed = document.remove(name).await?;
    info!(tenant = %name, removed, "policy entry cleaned up");
    Ok(())
}
