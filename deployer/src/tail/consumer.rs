//! Background consumer of live tail frames

use std::io::Write;

use chrono::{DateTime, Utc};
use colored::Colorize;
use tokio::sync::RwLock;
use tracing::info;

use crate::errors::DeployError;
use crate::platform::{FrameReader, LogEvent, Received, TailFrame};
use crate::tail::session::{TailEvent, TailSession};

/// Destination for rendered log events
pub trait Render: Send {
    fn render(&mut self, event: &LogEvent) -> Result<(), DeployError>;
}

/// Writes one line per event to standard output
#[derive(Debug, Default)]
pub struct StdoutRenderer;

impl Render for StdoutRenderer {
    fn render(&mut self, event: &LogEvent) -> Result<(), DeployError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(
            stdout,
            "{} {}",
            format_timestamp(event.timestamp).dimmed(),
            event_message(event)
        )?;
        Ok(())
    }
}

/// UTC timestamp with millisecond precision; falls back to the current time
pub fn format_timestamp(timestamp_ms: Option<i64>) -> String {
    timestamp_ms
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Message text without the trailing line break the runtime appends
pub fn event_message(event: &LogEvent) -> &str {
    event.message.trim_end_matches(['\n', '\r'])
}

/// Why the consumer stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    /// The transport delivered its terminal frame
    UpstreamClosed,

    /// The session was closed locally
    Cancelled,
}

/// Consume frames until closure, upstream end, or a fatal frame.
///
/// Nothing is rendered once the session has been closed locally or after a
/// fatal frame.
pub async fn consume<R: Render + ?Sized>(
    reader: &mut FrameReader,
    renderer: &mut R,
    session: &RwLock<TailSession>,
) -> Result<ConsumerExit, DeployError> {
    loop {
        match reader.recv().await {
            Received::Closed => return Ok(ConsumerExit::Cancelled),
            Received::Frame(TailFrame::SessionStart) => {
                info!("Logs streaming session started");
                session
                    .write()
                    .await
                    .process(TailEvent::Acknowledged)
                    .map_err(DeployError::StreamError)?;
            }
            Received::Frame(TailFrame::SessionUpdate(events)) => {
                for event in &events {
                    if reader.is_closed() {
                        return Ok(ConsumerExit::Cancelled);
                    }
                    renderer.render(event)?;
                }
            }
            Received::Frame(TailFrame::Unknown(kind)) => {
                return Err(match reader.deferred_error() {
                    Some(err) => {
                        DeployError::StreamError(format!("Error occurred during streaming: {}", err))
                    }
                    None => DeployError::StreamError(format!("Unknown event type: {}", kind)),
                });
            }
            Received::End => {
                return match reader.deferred_error() {
                    Some(err) => Err(DeployError::StreamError(format!(
                        "Error occurred during streaming: {}",
                        err
                    ))),
                    None => {
                        info!("Stream is closed");
                        Ok(ConsumerExit::UpstreamClosed)
                    }
                };
            }
        }
    }
}
