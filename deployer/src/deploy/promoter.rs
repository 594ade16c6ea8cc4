//! Version promotion

use std::fmt;

use tracing::info;

use crate::errors::DeployError;
use crate::platform::ComputePlatform;

/// Alias repointed on every deploy
pub const DEFAULT_ALIAS: &str = "canary";

/// Identifier of a published function version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateHandle(pub String);

impl fmt::Display for UpdateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publish a version of the function's current code and point `alias` at it
pub async fn promote(
    compute: &dyn ComputePlatform,
    function_name: &str,
    alias: &str,
) -> Result<UpdateHandle, DeployError> {
    let version = UpdateHandle(compute.publish_version(function_name).await?);

    compute.update_alias(function_name, alias, &version.0).await?;
    info!(
        "Published new version {} and updated alias '{}' to point to it",
        version, alias
    );

    Ok(version)
}
