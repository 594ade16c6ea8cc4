//! Deploy run
//!
//! Resolve → build → publish → wait → promote → (tail). Every stage runs to
//! completion before the next starts; the first error ends the run and
//! nothing is rolled back.

use tracing::info;

use crate::app::options::DeployOptions;
use crate::app::settings::DeployConfig;
use crate::deploy::artifact::ArtifactBuilder;
use crate::deploy::promoter::{promote, UpdateHandle};
use crate::deploy::publisher::publish;
use crate::deploy::resolver::{resolve, DeploymentTarget};
use crate::deploy::waiter::wait_until_updated;
use crate::errors::DeployError;
use crate::platform::PlatformClients;
use crate::tail::consumer::{Render, StdoutRenderer};
use crate::tail::session::TailState;
use crate::tail::tail_logs;

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub target: DeploymentTarget,

    /// Blob key the archive was uploaded under
    pub artifact_key: String,

    pub version: UpdateHandle,
    pub alias: String,

    /// Final tail session state, when tailing was requested
    pub tail_state: Option<TailState>,
}

/// Run the deploy pipeline; tailed output goes to stdout
pub async fn run(
    config: &DeployConfig,
    options: &DeployOptions,
    clients: &PlatformClients,
    builder: &dyn ArtifactBuilder,
) -> Result<DeployReport, DeployError> {
    run_with_renderer(config, options, clients, builder, StdoutRenderer).await
}

/// Run the deploy pipeline, rendering tailed output through `renderer`
pub async fn run_with_renderer<R: Render + 'static>(
    config: &DeployConfig,
    options: &DeployOptions,
    clients: &PlatformClients,
    builder: &dyn ArtifactBuilder,
    renderer: R,
) -> Result<DeployReport, DeployError> {
    let mut report = deploy(config, options, clients, builder).await?;

    if options.tail {
        let state = tail_logs(
            clients.logs.as_ref(),
            &report.target.log_group_name,
            &options.tail_options,
            renderer,
        )
        .await?;
        report.tail_state = Some(state);
    }

    Ok(report)
}

/// Everything up to and including promotion
pub async fn deploy(
    config: &DeployConfig,
    options: &DeployOptions,
    clients: &PlatformClients,
    builder: &dyn ArtifactBuilder,
) -> Result<DeployReport, DeployError> {
    let target = resolve(clients, config).await?;

    info!("Building and deploying...");
    let artifact = builder
        .build(&target.function_name, target.architecture)
        .await?;
    let artifact_key = publish(clients, &target, artifact).await?;

    wait_until_updated(
        clients.compute.as_ref(),
        &target.function_name,
        &options.waiter,
        tokio::time::sleep,
    )
    .await?;

    let version = promote(clients.compute.as_ref(), &target.function_name, &options.alias).await?;

    Ok(DeployReport {
        target,
        artifact_key,
        version,
        alias: options.alias.clone(),
        tail_state: None,
    })
}
