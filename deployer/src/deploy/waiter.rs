//! Convergence waiter

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use crate::errors::DeployError;
use crate::platform::{ComputePlatform, UpdateStatus};
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Waiter options
#[derive(Debug, Clone)]
pub struct WaiterOptions {
    /// Wall-clock ceiling for the whole wait
    pub timeout: Duration,

    /// Delay between polls
    pub cooldown: CooldownOptions,
}

impl Default for WaiterOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300), // 5 minutes
            cooldown: CooldownOptions::default(),
        }
    }
}

/// Poll until the function's last update is applied.
///
/// On timeout the update is left in flight; the platform finishes it regardless.
pub async fn wait_until_updated<S, F>(
    compute: &dyn ComputePlatform,
    function_name: &str,
    options: &WaiterOptions,
    sleep_fn: S,
) -> Result<(), DeployError>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Waiting for the function to be updated...");

    let poll = async {
        let mut attempt: u32 = 0;
        loop {
            match compute.get_update_status(function_name).await? {
                UpdateStatus::Successful => return Ok(()),
                UpdateStatus::Failed(reason) => return Err(DeployError::ConvergenceFailed(reason)),
                UpdateStatus::InProgress => {
                    let delay = calc_exp_backoff(&options.cooldown, attempt);
                    debug!("Update of {} still in progress, next poll in {:?}", function_name, delay);
                    sleep_fn(delay).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    };

    tokio::time::timeout(options.timeout, poll)
        .await
        .map_err(|_| DeployError::ConvergenceTimeout(options.timeout))?
}
