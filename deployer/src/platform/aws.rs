//! AWS adapter: Lambda, S3 and CloudWatch Logs

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_cloudwatchlogs::types::StartLiveTailResponseStream;
use aws_sdk_lambda::config::Region;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::types::LastUpdateStatus;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::errors::DeployError;
use crate::platform::{
    Architecture, BlobStore, ComputePlatform, DeferredError, LiveTailStream, LogEvent,
    LogGroupSummary, LogService, Page, PlatformClients, PutObject, TailFrame, UpdateStatus,
};

/// Frames buffered between the SDK event stream and the consumer
const FRAME_BUFFER: usize = 64;

fn transport_error<E: std::error::Error>(action: &str, err: E) -> DeployError {
    DeployError::TransportError(format!("Error {}: {}", action, DisplayErrorContext(err)))
}

impl PlatformClients {
    /// Build all three clients from one shared SDK configuration
    pub async fn from_aws(region: &str) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self::new(
            Arc::new(LambdaCompute {
                client: aws_sdk_lambda::Client::new(&sdk_config),
            }),
            Arc::new(S3Blobs {
                client: aws_sdk_s3::Client::new(&sdk_config),
            }),
            Arc::new(CloudWatchLogs {
                client: aws_sdk_cloudwatchlogs::Client::new(&sdk_config),
            }),
        )
    }
}

/// Lambda-backed compute platform
pub struct LambdaCompute {
    client: aws_sdk_lambda::Client,
}

#[async_trait]
impl ComputePlatform for LambdaCompute {
    async fn list_functions(&self, marker: Option<String>) -> Result<Page<String>, DeployError> {
        let output = self
            .client
            .list_functions()
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| transport_error("listing Lambda functions", e))?;

        let items = output
            .functions()
            .iter()
            .filter_map(|function| function.function_name().map(str::to_string))
            .collect();
        Ok(Page {
            items,
            next_token: output.next_marker().map(str::to_string),
        })
    }

    async fn get_architecture(&self, function_name: &str) -> Result<Architecture, DeployError> {
        let output = self
            .client
            .get_function_configuration()
            .function_name(function_name)
            .send()
            .await
            .map_err(|e| transport_error("getting function configuration", e))?;

        debug!("Architectures: {:?}", output.architectures());
        Ok(output
            .architectures()
            .first()
            .map(|arch| Architecture::from_platform_name(arch.as_str()))
            .unwrap_or(Architecture::X86_64))
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        bucket: &str,
        key: &str,
    ) -> Result<(), DeployError> {
        self.client
            .update_function_code()
            .function_name(function_name)
            .s3_bucket(bucket)
            .s3_key(key)
            .send()
            .await
            .map_err(|e| transport_error("updating Lambda function code", e))?;
        Ok(())
    }

    async fn get_update_status(&self, function_name: &str) -> Result<UpdateStatus, DeployError> {
        let output = self
            .client
            .get_function_configuration()
            .function_name(function_name)
            .send()
            .await
            .map_err(|e| transport_error("waiting for function update", e))?;

        Ok(match output.last_update_status() {
            Some(LastUpdateStatus::Successful) => UpdateStatus::Successful,
            Some(LastUpdateStatus::Failed) => UpdateStatus::Failed(
                output
                    .last_update_status_reason()
                    .unwrap_or("no reason given")
                    .to_string(),
            ),
            _ => UpdateStatus::InProgress,
        })
    }

    async fn publish_version(&self, function_name: &str) -> Result<String, DeployError> {
        let output = self
            .client
            .publish_version()
            .function_name(function_name)
            .send()
            .await
            .map_err(|e| transport_error("publishing new Lambda version", e))?;

        output.version().map(str::to_string).ok_or_else(|| {
            DeployError::TransportError("PublishVersion returned no version".to_string())
        })
    }

    async fn update_alias(
        &self,
        function_name: &str,
        alias: &str,
        version: &str,
    ) -> Result<(), DeployError> {
        self.client
            .update_alias()
            .function_name(function_name)
            .name(alias)
            .function_version(version)
            .send()
            .await
            .map_err(|e| transport_error(&format!("updating Lambda alias '{}'", alias), e))?;
        Ok(())
    }
}

/// S3-backed blob store
pub struct S3Blobs {
    client: aws_sdk_s3::Client,
}

#[async_trait]
impl BlobStore for S3Blobs {
    async fn list_buckets(&self) -> Result<Vec<String>, DeployError> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| transport_error("listing S3 buckets", e))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name().map(str::to_string))
            .collect())
    }

    async fn put_object(&self, request: PutObject) -> Result<(), DeployError> {
        let mut builder = self
            .client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .body(ByteStream::from(request.body));
        if request.server_side_encryption {
            builder = builder.server_side_encryption(ServerSideEncryption::Aes256);
        }
        for (key, value) in request.metadata {
            builder = builder.metadata(key, value);
        }

        builder
            .send()
            .await
            .map_err(|e| transport_error("uploading zip to S3", e))?;
        Ok(())
    }
}

/// CloudWatch Logs-backed log service
pub struct CloudWatchLogs {
    client: aws_sdk_cloudwatchlogs::Client,
}

#[async_trait]
impl LogService for CloudWatchLogs {
    async fn describe_log_groups(
        &self,
        name_prefix: Option<&str>,
        next_token: Option<String>,
    ) -> Result<Page<LogGroupSummary>, DeployError> {
        let output = self
            .client
            .describe_log_groups()
            .set_log_group_name_prefix(name_prefix.map(str::to_string))
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| transport_error("describing log groups", e))?;

        let items = output
            .log_groups()
            .iter()
            .filter_map(|group| {
                Some(LogGroupSummary {
                    name: group.log_group_name()?.to_string(),
                    arn: group.arn().unwrap_or_default().to_string(),
                })
            })
            .collect();
        Ok(Page {
            items,
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn start_live_tail(
        &self,
        log_group_identifier: &str,
        filter_pattern: &str,
    ) -> Result<LiveTailStream, DeployError> {
        let output = self
            .client
            .start_live_tail()
            .log_group_identifiers(log_group_identifier)
            .log_event_filter_pattern(filter_pattern)
            .send()
            .await
            .map_err(|e| transport_error("starting live tail", e))?;

        let mut events = output.response_stream;
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_BUFFER);
        let deferred_error = DeferredError::default();
        let (stream, mut close_rx) = LiveTailStream::new(frames_rx, deferred_error.clone());

        // Dropping frames_tx on exit is what the consumer sees as stream closure.
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = close_rx.changed() => {
                        debug!("Live tail closed locally");
                        break;
                    }
                    event = events.recv() => match event {
                        Ok(Some(event)) => {
                            if frames_tx.send(to_frame(event)).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            error!("Live tail transport failed: {}", DisplayErrorContext(&e));
                            deferred_error.set(DisplayErrorContext(&e).to_string());
                            break;
                        }
                    },
                }
            }
        });

        Ok(stream)
    }
}

fn to_frame(event: StartLiveTailResponseStream) -> TailFrame {
    match event {
        StartLiveTailResponseStream::SessionStart(_) => TailFrame::SessionStart,
        StartLiveTailResponseStream::SessionUpdate(update) => TailFrame::SessionUpdate(
            update
                .session_results()
                .iter()
                .map(|result| {
                    LogEvent::new(result.timestamp(), result.message().unwrap_or_default())
                })
                .collect(),
        ),
        other => TailFrame::Unknown(format!("{:?}", other)),
    }
}
