//! Shared fixtures

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lambda_deployer::deploy::artifact::{ArtifactBuilder, BuildArtifact, SourceRevision};
use lambda_deployer::errors::DeployError;
use lambda_deployer::platform::{Architecture, LogEvent};
use lambda_deployer::tail::consumer::{event_message, Render};

/// Renderer that keeps every message it was given
#[derive(Debug, Clone, Default)]
pub struct CapturedLines(Arc<Mutex<Vec<String>>>);

impl CapturedLines {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Render for CapturedLines {
    fn render(&mut self, event: &LogEvent) -> Result<(), DeployError> {
        self.0.lock().unwrap().push(event_message(event).to_string());
        Ok(())
    }
}

/// Builder returning a fixed archive and remembering the architecture it was asked for
#[derive(Debug, Default)]
pub struct FixedBuilder {
    pub revision: Option<SourceRevision>,
    pub requested: Mutex<Vec<Architecture>>,
}

impl FixedBuilder {
    pub fn at(short_hash: &str) -> Self {
        Self {
            revision: Some(SourceRevision::new(short_hash, false)),
            requested: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ArtifactBuilder for FixedBuilder {
    async fn build(
        &self,
        function_name: &str,
        architecture: Architecture,
    ) -> Result<BuildArtifact, DeployError> {
        self.requested.lock().unwrap().push(architecture);
        let revision = self
            .revision
            .clone()
            .ok_or_else(|| DeployError::BuildError("go build exited with 2".to_string()))?;
        Ok(BuildArtifact::new(function_name, revision, b"PK-archive".to_vec()))
    }
}

pub fn event(message: &str) -> LogEvent {
    LogEvent::new(Some(1_700_000_000_000), format!("{}\n", message))
}
