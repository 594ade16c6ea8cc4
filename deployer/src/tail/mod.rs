//! Live log tailing
//!
//! Opens a subscription on the function's log group, hands it to a
//! background consumer, and closes it when the wall-clock budget runs out.
//! There is no interrupt-driven early exit; the budget bounds the session.

pub mod consumer;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use crate::errors::DeployError;
use crate::platform::{LiveTailStream, LogService};
use crate::tail::consumer::{consume, Render};
use crate::tail::session::{TailEvent, TailSession, TailState};

/// Runtime lifecycle lines that are filtered out
pub const DEFAULT_EXCLUDE_PATTERNS: [&str; 5] = [
    "START RequestId",
    "REPORT RequestId",
    "END RequestId",
    "INIT_START Runtime",
    "EXTENSION",
];

/// Tail options
#[derive(Debug, Clone)]
pub struct TailOptions {
    /// How long the session runs before it is closed
    pub budget: Duration,

    /// Log lines containing any of these terms are not delivered
    pub exclude_patterns: Vec<String>,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(300),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|pattern| pattern.to_string())
                .collect(),
        }
    }
}

/// Filter expression excluding every pattern: `-"A" -"B"`
pub fn exclusion_filter(patterns: &[String]) -> String {
    patterns
        .iter()
        .map(|pattern| format!("-\"{}\"", pattern))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical identifier of the first log group matching the name prefix
pub async fn resolve_log_group_identifier(
    logs: &dyn LogService,
    log_group_name: &str,
) -> Result<String, DeployError> {
    let page = logs.describe_log_groups(Some(log_group_name), None).await?;
    let group = page
        .items
        .first()
        .ok_or_else(|| DeployError::LogGroupNotFound(log_group_name.to_string()))?;
    Ok(group.arn.trim_end_matches(":*").to_string())
}

/// Open a live tail subscription on a log group
pub async fn start(
    logs: &dyn LogService,
    log_group_name: &str,
    exclude_patterns: &[String],
) -> Result<LiveTailStream, DeployError> {
    let identifier = resolve_log_group_identifier(logs, log_group_name).await?;
    info!("Tailing logs of {}", identifier);
    logs.start_live_tail(&identifier, &exclusion_filter(exclude_patterns))
        .await
}

async fn transition(session: &RwLock<TailSession>, event: TailEvent) -> Result<(), DeployError> {
    session
        .write()
        .await
        .process(event)
        .map_err(DeployError::StreamError)
}

/// Tail a log group until the budget expires or the stream ends.
///
/// Returns the final session state; a stream failure is returned as an error.
pub async fn tail_logs<R: Render + 'static>(
    logs: &dyn LogService,
    log_group_name: &str,
    options: &TailOptions,
    mut renderer: R,
) -> Result<TailState, DeployError> {
    let stream = start(logs, log_group_name, &options.exclude_patterns).await?;
    let session = Arc::new(RwLock::new(TailSession::new()));

    // The closer must outlive the consumer; dropping it also closes the stream.
    let (mut reader, closer) = stream.split();
    let consumer_session = session.clone();
    let mut consumer = tokio::spawn(async move {
        consume(&mut reader, &mut renderer, &consumer_session).await
    });

    let joined = tokio::select! {
        joined = &mut consumer => joined,
        _ = tokio::time::sleep(options.budget) => {
            info!("Tail budget of {:?} reached, closing the stream", options.budget);
            transition(&session, TailEvent::CloseRequested).await?;
            closer.close();
            consumer.await
        }
    };

    let outcome = joined
        .map_err(|e| DeployError::StreamError(format!("log consumer task failed: {}", e)))?;
    match outcome {
        Ok(exit) => {
            transition(&session, TailEvent::TransportClosed).await?;
            info!("Event stream closed ({:?})", exit);
        }
        Err(e) => {
            transition(&session, TailEvent::TransportFailed(e.to_string())).await?;
            return Err(e);
        }
    }

    let state = session.read().await.state().clone();
    Ok(state)
}
