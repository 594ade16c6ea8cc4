//! End-to-end deploy runs against the in-memory platform

use std::sync::Arc;
use std::time::Duration;

use lambda_deployer::app::options::DeployOptions;
use lambda_deployer::app::run::{deploy, run_with_renderer};
use lambda_deployer::app::settings::{DeployConfig, Settings};
use lambda_deployer::deploy::promoter::UpdateHandle;
use lambda_deployer::deploy::waiter::WaiterOptions;
use lambda_deployer::errors::DeployError;
use lambda_deployer::platform::memory::{InMemoryPlatform, PlatformCall, TailScript};
use lambda_deployer::platform::{Architecture, PlatformClients, TailFrame, UpdateStatus};
use lambda_deployer::tail::session::TailState;
use lambda_deployer::tail::TailOptions;
use lambda_deployer::utils::CooldownOptions;

use crate::support::{event, CapturedLines, FixedBuilder};

fn orders_stag() -> DeployConfig {
    DeployConfig::resolve(
        Settings {
            env: Some("stag".to_string()),
            ..Default::default()
        },
        "orders",
    )
}

fn fast_options() -> DeployOptions {
    DeployOptions {
        waiter: WaiterOptions {
            timeout: Duration::from_secs(5),
            cooldown: CooldownOptions {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
                multiplier: 2.0,
            },
        },
        ..Default::default()
    }
}

fn platform() -> InMemoryPlatform {
    InMemoryPlatform::new()
        .with_function_pages(vec![vec!["orders-stag", "orders-prod"]])
        .with_architecture("orders-stag", Architecture::Arm64)
        .with_buckets(vec!["e4f-builds"])
        .with_log_group_pages(vec![vec!["/aws/lambda/orders-stag"]])
        .with_update_statuses(vec![UpdateStatus::InProgress, UpdateStatus::Successful])
        .with_first_version(7)
}

#[tokio::test]
async fn test_deploy_promotes_new_version() {
    let platform = Arc::new(platform());
    let clients = PlatformClients::in_memory(platform.clone());
    let builder = FixedBuilder::at("abc1234");

    let report = deploy(&orders_stag(), &fast_options(), &clients, &builder)
        .await
        .unwrap();

    assert_eq!(report.target.function_name, "orders-stag");
    assert_eq!(report.artifact_key, "orders-stag-abc1234.zip");
    assert_eq!(report.version, UpdateHandle("7".to_string()));
    assert_eq!(report.alias, "canary");
    assert!(report.tail_state.is_none());
    assert_eq!(*builder.requested.lock().unwrap(), vec![Architecture::Arm64]);

    let object = platform
        .object("e4f-builds", "orders-stag-abc1234.zip")
        .await
        .unwrap();
    assert!(object.server_side_encryption);
    assert_eq!(object.body, b"PK-archive".to_vec());
    assert_eq!(platform.alias_target("canary").await.as_deref(), Some("7"));
}

#[tokio::test]
async fn test_calls_follow_pipeline_order() {
    let platform = Arc::new(platform());
    let clients = PlatformClients::in_memory(platform.clone());

    deploy(&orders_stag(), &fast_options(), &clients, &FixedBuilder::at("abc1234"))
        .await
        .unwrap();

    let calls = platform.calls().await;
    let first_mutation = calls.iter().position(PlatformCall::is_mutating).unwrap();
    let last_lookup = calls
        .iter()
        .rposition(|call| matches!(call, PlatformCall::GetArchitecture { .. }))
        .unwrap();
    assert!(last_lookup < first_mutation);

    let mutations: Vec<_> = calls.iter().filter(|call| call.is_mutating()).collect();
    assert!(matches!(mutations[0], PlatformCall::PutObject { .. }));
    assert!(matches!(mutations[1], PlatformCall::UpdateFunctionCode { .. }));
    assert!(matches!(mutations[2], PlatformCall::PublishVersion { .. }));
    assert!(matches!(
        mutations[3],
        PlatformCall::UpdateAlias { version, .. } if version == "7"
    ));

    let polls = calls
        .iter()
        .filter(|call| matches!(call, PlatformCall::GetUpdateStatus { .. }))
        .count();
    assert_eq!(polls, 2);
}

#[tokio::test]
async fn test_resolution_failure_mutates_nothing() {
    let platform = Arc::new(
        InMemoryPlatform::new()
            .with_function_pages(vec![vec!["orders-prod"]])
            .with_buckets(vec!["e4f-builds"]),
    );
    let clients = PlatformClients::in_memory(platform.clone());
    let builder = FixedBuilder::at("abc1234");

    let err = deploy(&orders_stag(), &fast_options(), &clients, &builder)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::ResolutionError { .. }));
    assert!(builder.requested.lock().unwrap().is_empty());
    assert!(platform.calls().await.iter().all(|call| !call.is_mutating()));
}

#[tokio::test]
async fn test_build_failure_stops_before_upload() {
    let platform = Arc::new(platform());
    let clients = PlatformClients::in_memory(platform.clone());

    let err = deploy(&orders_stag(), &fast_options(), &clients, &FixedBuilder::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::BuildError(_)));
    assert!(platform.calls().await.iter().all(|call| !call.is_mutating()));
}

#[tokio::test]
async fn test_convergence_timeout_skips_promotion() {
    let platform = Arc::new(platform().with_update_statuses(vec![]));
    let clients = PlatformClients::in_memory(platform.clone());
    let mut options = fast_options();
    options.waiter.timeout = Duration::from_millis(50);

    let err = deploy(&orders_stag(), &options, &clients, &FixedBuilder::at("abc1234"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::ConvergenceTimeout(_)));
    assert!(platform.alias_target("canary").await.is_none());
    assert!(platform
        .calls()
        .await
        .iter()
        .all(|call| !matches!(call, PlatformCall::PublishVersion { .. })));
}

#[tokio::test]
async fn test_run_with_tail_reports_final_state() {
    let platform = Arc::new(platform().with_tail_script(TailScript {
        frames: vec![
            TailFrame::SessionStart,
            TailFrame::SessionUpdate(vec![event("cold start done")]),
        ],
        error: None,
        hold_open: true,
    }));
    let clients = PlatformClients::in_memory(platform.clone());
    let options = DeployOptions {
        tail: true,
        tail_options: TailOptions {
            budget: Duration::from_millis(50),
            ..Default::default()
        },
        ..fast_options()
    };
    let lines = CapturedLines::default();

    let report = run_with_renderer(
        &orders_stag(),
        &options,
        &clients,
        &FixedBuilder::at("abc1234"),
        lines.clone(),
    )
    .await
    .unwrap();
    assert_eq!(report.tail_state, Some(TailState::Closed));
    assert_eq!(lines.lines(), vec!["cold start done"]);
}
