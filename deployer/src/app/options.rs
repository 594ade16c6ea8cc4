//! Deploy run options

use crate::deploy::promoter::DEFAULT_ALIAS;
use crate::deploy::waiter::WaiterOptions;
use crate::tail::TailOptions;

/// Options of one deploy run
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Alias repointed at the published version
    pub alias: String,

    /// Tail the function's logs after a successful deploy
    pub tail: bool,

    /// Convergence waiter configuration
    pub waiter: WaiterOptions,

    /// Log tail configuration
    pub tail_options: TailOptions,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            alias: DEFAULT_ALIAS.to_string(),
            tail: false,
            waiter: WaiterOptions::default(),
            tail_options: TailOptions::default(),
        }
    }
}
