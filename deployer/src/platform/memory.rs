//! In-memory platform
//!
//! Serves scripted listings, statuses and tail frames, and records every
//! call so callers can assert on what reached the platform and in which order.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use crate::errors::DeployError;
use crate::platform::{
    Architecture, BlobStore, ComputePlatform, DeferredError, LiveTailStream, LogGroupSummary,
    LogService, Page, PutObject, TailFrame, UpdateStatus,
};

/// A call that reached the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    ListFunctions { marker: Option<String> },
    GetArchitecture { function_name: String },
    UpdateFunctionCode { function_name: String, bucket: String, key: String },
    GetUpdateStatus { function_name: String },
    PublishVersion { function_name: String },
    UpdateAlias { function_name: String, alias: String, version: String },
    ListBuckets,
    PutObject { bucket: String, key: String, server_side_encryption: bool },
    DescribeLogGroups { name_prefix: Option<String>, next_token: Option<String> },
    StartLiveTail { identifier: String, filter_pattern: String },
}

impl PlatformCall {
    /// Whether the call changes remote state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            PlatformCall::UpdateFunctionCode { .. }
                | PlatformCall::PublishVersion { .. }
                | PlatformCall::UpdateAlias { .. }
                | PlatformCall::PutObject { .. }
        )
    }
}

/// Scripted live tail subscription
#[derive(Debug, Clone, Default)]
pub struct TailScript {
    pub frames: Vec<TailFrame>,

    /// Error recorded in the deferred slot when the subscription opens
    pub error: Option<String>,

    /// Keep the producer side open after the frames are delivered
    pub hold_open: bool,
}

#[derive(Default)]
struct State {
    calls: Vec<PlatformCall>,
    objects: HashMap<(String, String), PutObject>,
    update_statuses: VecDeque<UpdateStatus>,
    versions_published: u64,
    aliases: HashMap<String, String>,
    held_streams: Vec<(mpsc::Sender<TailFrame>, watch::Receiver<bool>)>,
}

/// In-memory implementation of all three platform capabilities
#[derive(Default)]
pub struct InMemoryPlatform {
    function_pages: Vec<Vec<String>>,
    architectures: HashMap<String, Architecture>,
    buckets: Vec<String>,
    log_group_pages: Vec<Vec<LogGroupSummary>>,
    first_version: u64,
    tail_script: Option<TailScript>,
    state: Mutex<State>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self {
            first_version: 1,
            ..Default::default()
        }
    }

    /// Function listing, one inner vector per page
    pub fn with_function_pages(mut self, pages: Vec<Vec<&str>>) -> Self {
        self.function_pages = pages
            .into_iter()
            .map(|page| page.into_iter().map(str::to_string).collect())
            .collect();
        self
    }

    pub fn with_architecture(mut self, function_name: &str, architecture: Architecture) -> Self {
        self.architectures
            .insert(function_name.to_string(), architecture);
        self
    }

    pub fn with_buckets(mut self, buckets: Vec<&str>) -> Self {
        self.buckets = buckets.into_iter().map(str::to_string).collect();
        self
    }

    /// Log group listing by name, one inner vector per page; ARNs are synthesized
    pub fn with_log_group_pages(mut self, pages: Vec<Vec<&str>>) -> Self {
        self.log_group_pages = pages
            .into_iter()
            .map(|page| {
                page.into_iter()
                    .map(|name| LogGroupSummary {
                        name: name.to_string(),
                        arn: format!("arn:aws:logs:us-east-1:000000000000:log-group:{}:*", name),
                    })
                    .collect()
            })
            .collect();
        self
    }

    /// Statuses returned by successive polls; once drained every poll reports `InProgress`
    pub fn with_update_statuses(mut self, statuses: Vec<UpdateStatus>) -> Self {
        self.state.get_mut().update_statuses = statuses.into();
        self
    }

    /// Identifier of the first version published
    pub fn with_first_version(mut self, version: u64) -> Self {
        self.first_version = version;
        self
    }

    pub fn with_tail_script(mut self, script: TailScript) -> Self {
        self.tail_script = Some(script);
        self
    }

    /// Every call made so far, in order
    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().await.calls.clone()
    }

    /// Stored object, if one was uploaded under the key
    pub async fn object(&self, bucket: &str, key: &str) -> Option<PutObject> {
        self.state
            .lock()
            .await
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Version an alias currently points at
    pub async fn alias_target(&self, alias: &str) -> Option<String> {
        self.state.lock().await.aliases.get(alias).cloned()
    }

    async fn record(&self, call: PlatformCall) {
        self.state.lock().await.calls.push(call);
    }

    fn page_of<T: Clone>(pages: &[Vec<T>], token: Option<&str>) -> Result<Page<T>, DeployError> {
        let index = match token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| DeployError::TransportError(format!("invalid page token {}", token)))?,
        };
        let items = pages.get(index).cloned().unwrap_or_default();
        let next_token = (index + 1 < pages.len()).then(|| (index + 1).to_string());
        Ok(Page { items, next_token })
    }

    fn require_function(&self, function_name: &str) -> Result<(), DeployError> {
        if self.function_pages.iter().flatten().any(|f| f == function_name) {
            Ok(())
        } else {
            Err(DeployError::TransportError(format!(
                "ResourceNotFoundException: Function not found: {}",
                function_name
            )))
        }
    }
}

#[async_trait]
impl ComputePlatform for InMemoryPlatform {
    async fn list_functions(&self, marker: Option<String>) -> Result<Page<String>, DeployError> {
        self.record(PlatformCall::ListFunctions { marker: marker.clone() }).await;
        Self::page_of(&self.function_pages, marker.as_deref())
    }

    async fn get_architecture(&self, function_name: &str) -> Result<Architecture, DeployError> {
        self.record(PlatformCall::GetArchitecture {
            function_name: function_name.to_string(),
        })
        .await;
        self.require_function(function_name)?;
        Ok(self
            .architectures
            .get(function_name)
            .copied()
            .unwrap_or(Architecture::X86_64))
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        bucket: &str,
        key: &str,
    ) -> Result<(), DeployError> {
        self.record(PlatformCall::UpdateFunctionCode {
            function_name: function_name.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
        .await;
        self.require_function(function_name)?;
        let state = self.state.lock().await;
        if !state
            .objects
            .contains_key(&(bucket.to_string(), key.to_string()))
        {
            return Err(DeployError::TransportError(format!(
                "InvalidParameterValueException: s3://{}/{} does not exist",
                bucket, key
            )));
        }
        Ok(())
    }

    async fn get_update_status(&self, function_name: &str) -> Result<UpdateStatus, DeployError> {
        self.record(PlatformCall::GetUpdateStatus {
            function_name: function_name.to_string(),
        })
        .await;
        let mut state = self.state.lock().await;
        Ok(state
            .update_statuses
            .pop_front()
            .unwrap_or(UpdateStatus::InProgress))
    }

    async fn publish_version(&self, function_name: &str) -> Result<String, DeployError> {
        self.record(PlatformCall::PublishVersion {
            function_name: function_name.to_string(),
        })
        .await;
        self.require_function(function_name)?;
        let mut state = self.state.lock().await;
        let version = self.first_version + state.versions_published;
        state.versions_published += 1;
        Ok(version.to_string())
    }

    async fn update_alias(
        &self,
        function_name: &str,
        alias: &str,
        version: &str,
    ) -> Result<(), DeployError> {
        self.record(PlatformCall::UpdateAlias {
            function_name: function_name.to_string(),
            alias: alias.to_string(),
            version: version.to_string(),
        })
        .await;
        self.require_function(function_name)?;
        self.state
            .lock()
            .await
            .aliases
            .insert(alias.to_string(), version.to_string());
        Ok(())
    }
}

#[async_trait]
impl BlobStore for InMemoryPlatform {
    async fn list_buckets(&self) -> Result<Vec<String>, DeployError> {
        self.record(PlatformCall::ListBuckets).await;
        Ok(self.buckets.clone())
    }

    async fn put_object(&self, request: PutObject) -> Result<(), DeployError> {
        self.record(PlatformCall::PutObject {
            bucket: request.bucket.clone(),
            key: request.key.clone(),
            server_side_encryption: request.server_side_encryption,
        })
        .await;
        if !self.buckets.contains(&request.bucket) {
            return Err(DeployError::TransportError(format!(
                "NoSuchBucket: {}",
                request.bucket
            )));
        }
        let key = (request.bucket.clone(), request.key.clone());
        self.state.lock().await.objects.insert(key, request);
        Ok(())
    }
}

#[async_trait]
impl LogService for InMemoryPlatform {
    async fn describe_log_groups(
        &self,
        name_prefix: Option<&str>,
        next_token: Option<String>,
    ) -> Result<Page<LogGroupSummary>, DeployError> {
        self.record(PlatformCall::DescribeLogGroups {
            name_prefix: name_prefix.map(str::to_string),
            next_token: next_token.clone(),
        })
        .await;
        match name_prefix {
            None => Self::page_of(&self.log_group_pages, next_token.as_deref()),
            Some(prefix) => Ok(Page::last(
                self.log_group_pages
                    .iter()
                    .flatten()
                    .filter(|group| group.name.starts_with(prefix))
                    .cloned()
                    .collect(),
            )),
        }
    }

    async fn start_live_tail(
        &self,
        log_group_identifier: &str,
        filter_pattern: &str,
    ) -> Result<LiveTailStream, DeployError> {
        self.record(PlatformCall::StartLiveTail {
            identifier: log_group_identifier.to_string(),
            filter_pattern: filter_pattern.to_string(),
        })
        .await;
        let script = self.tail_script.clone().ok_or_else(|| {
            DeployError::TransportError("live tail is not available".to_string())
        })?;

        let (tx, rx) = mpsc::channel(script.frames.len().max(1));
        for frame in script.frames {
            tx.try_send(frame)
                .map_err(|e| DeployError::StreamError(e.to_string()))?;
        }
        let deferred_error = DeferredError::default();
        if let Some(error) = script.error {
            deferred_error.set(error);
        }

        let (stream, close_rx) = LiveTailStream::new(rx, deferred_error);
        if script.hold_open {
            self.state.lock().await.held_streams.push((tx, close_rx));
        }
        Ok(stream)
    }
}
