//! Platform capabilities the deployment pipeline depends on
//!
//! Every remote call goes through one of the three traits below. The
//! pipeline receives them bundled in [`PlatformClients`], built once at
//! process start.

pub mod aws;
pub mod memory;
pub mod stream;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::DeployError;

pub use stream::{DeferredError, FrameReader, LiveTailStream, LogEvent, Received, TailCloser, TailFrame};

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Continuation token; `None` or empty marks the terminal page
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// Build the terminal page of a listing
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    /// Whether no further page follows this one
    pub fn is_terminal(&self) -> bool {
        self.next_token.as_deref().map_or(true, str::is_empty)
    }
}

/// CPU architecture of a deployed function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    X86_64,
    Arm64,
}

impl Architecture {
    /// Map the platform's architecture name; anything but `arm64` is x86_64
    pub fn from_platform_name(name: &str) -> Self {
        match name {
            "arm64" => Architecture::Arm64,
            _ => Architecture::X86_64,
        }
    }

    /// Value for the Go toolchain's `GOARCH`
    pub fn go_arch(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "amd64",
            Architecture::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::Arm64 => write!(f, "arm64"),
        }
    }
}

/// Last-update status reported for a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    InProgress,
    Successful,
    Failed(String),
}

/// Name and resource identifier of a log group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroupSummary {
    pub name: String,
    pub arn: String,
}

/// Blob upload request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub server_side_encryption: bool,
    pub metadata: Vec<(String, String)>,
}

/// Serverless compute service
#[async_trait]
pub trait ComputePlatform: Send + Sync {
    /// List one page of function names
    async fn list_functions(&self, marker: Option<String>) -> Result<Page<String>, DeployError>;

    /// Read the CPU architecture of a function
    async fn get_architecture(&self, function_name: &str) -> Result<Architecture, DeployError>;

    /// Point the function at a code archive in the blob store
    async fn update_function_code(
        &self,
        function_name: &str,
        bucket: &str,
        key: &str,
    ) -> Result<(), DeployError>;

    /// Read the status of the function's last update
    async fn get_update_status(&self, function_name: &str) -> Result<UpdateStatus, DeployError>;

    /// Publish an immutable version, returning its identifier
    async fn publish_version(&self, function_name: &str) -> Result<String, DeployError>;

    /// Repoint an alias at a published version
    async fn update_alias(
        &self,
        function_name: &str,
        alias: &str,
        version: &str,
    ) -> Result<(), DeployError>;
}

/// Blob store holding build archives
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List all bucket names
    async fn list_buckets(&self) -> Result<Vec<String>, DeployError>;

    /// Upload a blob; returns once the payload is fully transferred
    async fn put_object(&self, request: PutObject) -> Result<(), DeployError>;
}

/// Log service of the function
#[async_trait]
pub trait LogService: Send + Sync {
    /// List one page of log groups, optionally filtered by name prefix
    async fn describe_log_groups(
        &self,
        name_prefix: Option<&str>,
        next_token: Option<String>,
    ) -> Result<Page<LogGroupSummary>, DeployError>;

    /// Open a live tail subscription on a log group
    async fn start_live_tail(
        &self,
        log_group_identifier: &str,
        filter_pattern: &str,
    ) -> Result<LiveTailStream, DeployError>;
}

/// The platform clients of one deployment run
#[derive(Clone)]
pub struct PlatformClients {
    pub compute: Arc<dyn ComputePlatform>,
    pub blobs: Arc<dyn BlobStore>,
    pub logs: Arc<dyn LogService>,
}

impl PlatformClients {
    /// Bundle the three clients
    pub fn new(
        compute: Arc<dyn ComputePlatform>,
        blobs: Arc<dyn BlobStore>,
        logs: Arc<dyn LogService>,
    ) -> Self {
        Self {
            compute,
            blobs,
            logs,
        }
    }

    /// Use one in-memory platform for all three capabilities
    pub fn in_memory(platform: Arc<memory::InMemoryPlatform>) -> Self {
        Self {
            compute: platform.clone(),
            blobs: platform.clone(),
            logs: platform,
        }
    }
}
