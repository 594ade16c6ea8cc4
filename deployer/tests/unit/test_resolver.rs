//! Target resolution against paginated listings

use std::sync::Arc;

use lambda_deployer::app::settings::{DeployConfig, Settings};
use lambda_deployer::deploy::resolver::resolve;
use lambda_deployer::errors::{DeployError, ResourceKind};
use lambda_deployer::platform::memory::InMemoryPlatform;
use lambda_deployer::platform::{Architecture, PlatformClients};

fn config(app_name: &str, env: &str) -> DeployConfig {
    DeployConfig::resolve(
        Settings {
            env: Some(env.to_string()),
            app_name: Some(app_name.to_string()),
            ..Default::default()
        },
        "unused",
    )
}

#[tokio::test]
async fn test_function_on_second_page_is_found() {
    let platform = Arc::new(
        InMemoryPlatform::new()
            .with_function_pages(vec![vec!["a", "b"], vec!["orders-stag"]])
            .with_architecture("orders-stag", Architecture::Arm64)
            .with_buckets(vec!["e4f-builds"])
            .with_log_group_pages(vec![vec!["/aws/lambda/a"], vec!["/aws/lambda/orders-stag"]]),
    );
    let clients = PlatformClients::in_memory(platform.clone());

    let target = resolve(&clients, &config("orders", "stag")).await.unwrap();
    assert_eq!(target.function_name, "orders-stag");
    assert_eq!(target.bucket, "e4f-builds");
    assert_eq!(target.log_group_name, "/aws/lambda/orders-stag");
    assert_eq!(target.architecture, Architecture::Arm64);
    assert!(platform.calls().await.iter().all(|call| !call.is_mutating()));
}

#[tokio::test]
async fn test_missing_function_lists_alternatives() {
    let platform = Arc::new(
        InMemoryPlatform::new()
            .with_function_pages(vec![vec!["a", "b"], vec!["c"]])
            .with_buckets(vec!["e4f-builds"]),
    );
    let clients = PlatformClients::in_memory(platform);

    let err = resolve(&clients, &config("orders", "stag")).await.unwrap_err();
    match &err {
        DeployError::ResolutionError { kind, name, available } => {
            assert_eq!(*kind, ResourceKind::Function);
            assert_eq!(name, "orders-stag");
            assert_eq!(available, &vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let message = err.to_string();
    assert!(message.contains("orders-stag"));
    assert!(message.contains("a, b, c"));
}

#[tokio::test]
async fn test_missing_bucket_is_reported() {
    let platform = Arc::new(
        InMemoryPlatform::new()
            .with_function_pages(vec![vec!["orders-stag"]])
            .with_buckets(vec!["other-builds"]),
    );
    let clients = PlatformClients::in_memory(platform);

    let err = resolve(&clients, &config("orders", "stag")).await.unwrap_err();
    assert!(matches!(
        err,
        DeployError::ResolutionError { kind: ResourceKind::Bucket, .. }
    ));
    assert!(err.to_string().contains("other-builds"));
}

#[tokio::test]
async fn test_missing_log_group_is_reported() {
    let platform = Arc::new(
        InMemoryPlatform::new()
            .with_function_pages(vec![vec!["orders-stag"]])
            .with_buckets(vec!["e4f-builds"])
            .with_log_group_pages(vec![vec!["/aws/lambda/orders-prod"]]),
    );
    let clients = PlatformClients::in_memory(platform);

    let err = resolve(&clients, &config("orders", "stag")).await.unwrap_err();
    assert!(matches!(
        err,
        DeployError::ResolutionError { kind: ResourceKind::LogGroup, .. }
    ));
}
