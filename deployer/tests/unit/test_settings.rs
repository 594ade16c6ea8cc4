//! Settings file loading and precedence

use lambda_deployer::app::settings::{DeployConfig, Settings, DEFAULT_BUILDS_BUCKET};
use lambda_deployer::errors::DeployError;
use lambda_deployer::filesys::file::File;
use tempfile::tempdir;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_load_settings_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("deploy.conf");
    std::fs::write(
        &path,
        r#"{"env": "prod", "app_name": "orders", "builds_bucket": "", "region": "eu-west-1"}"#,
    )
    .unwrap();

    let settings = assert_ok!(Settings::load(&File::new(&path)).await);
    let config = DeployConfig::resolve(settings, "ignored");
    assert_eq!(config.function_name, "orders-prod");
    assert_eq!(config.builds_bucket, DEFAULT_BUILDS_BUCKET);
    assert_eq!(config.log_group_name, "/aws/lambda/orders-prod");
    assert_eq!(config.region, "eu-west-1");
}

#[tokio::test]
async fn test_missing_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let settings = Settings::load(&File::new(dir.path().join("deploy.conf")))
        .await
        .unwrap();
    assert_eq!(settings, Settings::default());

    let config = DeployConfig::resolve(settings, "orders");
    assert_eq!(config.function_name, "orders-stag");
    assert_eq!(config.region, "us-east-1");
}

#[tokio::test]
async fn test_malformed_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("deploy.conf");
    std::fs::write(&path, "{ not json").unwrap();

    let err = assert_err!(Settings::load(&File::new(&path)).await);
    assert!(matches!(err, DeployError::ConfigError(_)));
}

#[tokio::test]
async fn test_env_flag_overrides_file() {
    let root = tempdir().unwrap();
    let dir = root.path().join("orders");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("deploy.conf");
    std::fs::write(&path, r#"{"env": "prod"}"#).unwrap();

    let config = DeployConfig::load_with(&File::new(&path), Some("qa".to_string()), &dir, |_| None)
        .await
        .unwrap();
    assert_eq!(config.app_name, "orders");
    assert_eq!(config.function_name, "orders-qa");
}

#[tokio::test]
async fn test_environment_overrides_file_but_not_flag() {
    let root = tempdir().unwrap();
    let dir = root.path().join("orders");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("deploy.conf");
    std::fs::write(&path, r#"{"env": "prod", "app_name": "orders", "region": "eu-west-1"}"#).unwrap();

    let lookup = |key: &str| match key {
        "DEPLOY_APP_NAME" => Some("billing".to_string()),
        "DEPLOY_ENV" => Some("dev".to_string()),
        _ => None,
    };
    let config = assert_ok!(
        DeployConfig::load_with(&File::new(&path), Some("qa".to_string()), &dir, lookup).await
    );
    assert_eq!(config.function_name, "billing-qa");
    assert_eq!(config.region, "eu-west-1");
}
