//! Artifact publishing
//!
//! Uploads the archive under its own filename and points the function at it.
//! A failed update leaves the uploaded blob in place; it is content-addressed.

use tracing::info;

use crate::deploy::artifact::BuildArtifact;
use crate::deploy::resolver::DeploymentTarget;
use crate::errors::DeployError;
use crate::platform::{PlatformClients, PutObject};

/// Upload the archive, then request the function code update.
///
/// Returns the blob key that was written.
pub async fn publish(
    clients: &PlatformClients,
    target: &DeploymentTarget,
    artifact: BuildArtifact,
) -> Result<String, DeployError> {
    let key = artifact.filename.clone();
    let metadata = artifact.metadata();

    clients
        .blobs
        .put_object(PutObject {
            bucket: target.bucket.clone(),
            key: key.clone(),
            body: artifact.bytes,
            server_side_encryption: true,
            metadata,
        })
        .await?;
    info!("Released {} to {}", key, target.bucket);

    clients
        .compute
        .update_function_code(&target.function_name, &target.bucket, &key)
        .await?;
    info!("Requested code update of {}", target.function_name);

    Ok(key)
}
