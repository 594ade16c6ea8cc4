//! Target resolution
//!
//! Confirms that the function, bucket and log group a run refers to exist
//! before anything is mutated. Missing names are reported together with
//! everything that does exist.

use std::future::Future;

use tracing::{debug, info};

use crate::app::settings::DeployConfig;
use crate::errors::{DeployError, ResourceKind};
use crate::platform::{Architecture, Page, PlatformClients};

/// The resolved identity of what is being deployed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub function_name: String,
    pub bucket: String,
    pub log_group_name: String,

    /// Read from the live function, never user-supplied
    pub architecture: Architecture,
}

/// Follow continuation tokens until the terminal page and collect every item
pub async fn drain_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, DeployError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, DeployError>>,
{
    let mut items = Vec::new();
    let mut token = None;
    loop {
        let page = fetch(token.take()).await?;
        let terminal = page.is_terminal();
        items.extend(page.items);
        if terminal {
            return Ok(items);
        }
        token = page.next_token;
    }
}

/// Fail unless `name` is one of `available`
pub fn ensure_exists(kind: ResourceKind, name: &str, available: &[String]) -> Result<(), DeployError> {
    if available.iter().any(|candidate| candidate == name) {
        Ok(())
    } else {
        Err(DeployError::not_found(kind, name, available))
    }
}

/// All function names in the account
pub async fn available_functions(clients: &PlatformClients) -> Result<Vec<String>, DeployError> {
    let compute = clients.compute.as_ref();
    drain_pages(|marker| compute.list_functions(marker)).await
}

/// All log group names in the account
pub async fn available_log_groups(clients: &PlatformClients) -> Result<Vec<String>, DeployError> {
    let logs = clients.logs.as_ref();
    let groups = drain_pages(|token| logs.describe_log_groups(None, token)).await?;
    Ok(groups.into_iter().map(|group| group.name).collect())
}

/// Resolve the configured names into a deployment target
pub async fn resolve(
    clients: &PlatformClients,
    config: &DeployConfig,
) -> Result<DeploymentTarget, DeployError> {
    info!("Resolving deployment target {}", config.function_name);

    let functions = available_functions(clients).await?;
    debug!("Found {} functions", functions.len());
    ensure_exists(ResourceKind::Function, &config.function_name, &functions)?;

    let buckets = clients.blobs.list_buckets().await?;
    ensure_exists(ResourceKind::Bucket, &config.builds_bucket, &buckets)?;

    let log_groups = available_log_groups(clients).await?;
    debug!("Found {} log groups", log_groups.len());
    ensure_exists(ResourceKind::LogGroup, &config.log_group_name, &log_groups)?;

    let architecture = clients
        .compute
        .get_architecture(&config.function_name)
        .await?;
    info!("Architecture: {}", architecture);

    Ok(DeploymentTarget {
        function_name: config.function_name.clone(),
        bucket: config.builds_bucket.clone(),
        log_group_name: config.log_group_name.clone(),
        architecture,
    })
}
