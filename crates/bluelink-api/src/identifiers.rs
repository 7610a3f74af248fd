//! Identifier resolution (§4.1): a `{id}` path parameter accepts either the
//! opaque instance id or the human-unique instance name.

use bluelink_core::instance::Instance;
use bluelink_core::ResourceId;
use bluelink_store::InstanceStore;

use crate::error::ApiError;

/// Resolve `identifier` against the instance store: try it as a `ResourceId`
/// first, then fall back to an exact-name match. 404s with the original
/// identifier string if neither resolves.
pub async fn resolve_instance(
    instances: &dyn InstanceStore,
    identifier: &str,
) -> Result<(Instance, i64), ApiError> {
    if let Ok(id) = identifier.parse::<ResourceId>() {
        if let Ok(found) = instances.get(id).await {
            return Ok(found);
        }
    }
    let candidates = instances
        .list(Some(identifier), 50)
        .await
        .map_err(bluelink_core::Error::from)?;
    if let Some(instance) = candidates.into_iter().find(|i| i.name == identifier) {
        let (instance, version) = instances.get(instance.id).await.map_err(bluelink_core::Error::from)?;
        return Ok((instance, version));
    }
    Err(ApiError::NotFound(format!("instance '{identifier}' not found")))
}
