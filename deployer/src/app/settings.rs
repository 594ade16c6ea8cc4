//! Deploy settings
//!
//! Resolution order per key: command line, `DEPLOY_*` environment
//! variables, `deploy.conf`, defaults. Empty values count as unset.

use std::path::Path;

use serde::Deserialize;

use crate::errors::DeployError;
use crate::filesys::file::File;

/// Default settings file, relative to the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "deploy.conf";

pub const DEFAULT_ENV: &str = "stag";
pub const DEFAULT_BUILDS_BUCKET: &str = "e4f-builds";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Settings as read from the file or the environment; every key optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub env: Option<String>,

    #[serde(default)]
    pub app_name: Option<String>,

    #[serde(default)]
    pub builds_bucket: Option<String>,

    #[serde(default)]
    pub log_group_name: Option<String>,

    #[serde(default)]
    pub region: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Read the settings file; a missing file yields empty settings
    pub async fn load(file: &File) -> Result<Self, DeployError> {
        file.read_json_opt::<Settings>()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| {
                DeployError::ConfigError(format!(
                    "error reading config file {}: {}",
                    file.path().display(),
                    e
                ))
            })
    }

    /// Settings from `DEPLOY_*` variables looked up through `lookup`
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            env: lookup("DEPLOY_ENV"),
            app_name: lookup("DEPLOY_APP_NAME"),
            builds_bucket: lookup("DEPLOY_BUILDS_BUCKET"),
            log_group_name: lookup("DEPLOY_LOG_GROUP_NAME"),
            region: lookup("DEPLOY_REGION"),
        }
    }

    /// Settings from the process environment
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Keys set in `higher` replace those in `self`
    pub fn overlay(self, higher: Settings) -> Self {
        Self {
            env: non_empty(higher.env).or(non_empty(self.env)),
            app_name: non_empty(higher.app_name).or(non_empty(self.app_name)),
            builds_bucket: non_empty(higher.builds_bucket).or(non_empty(self.builds_bucket)),
            log_group_name: non_empty(higher.log_group_name).or(non_empty(self.log_group_name)),
            region: non_empty(higher.region).or(non_empty(self.region)),
        }
    }
}

/// Fully resolved configuration of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    pub env: String,
    pub app_name: String,

    /// Always `<app_name>-<env>`
    pub function_name: String,

    pub builds_bucket: String,
    pub log_group_name: String,
    pub region: String,
}

impl DeployConfig {
    /// Apply defaults to merged settings
    pub fn resolve(settings: Settings, default_app_name: &str) -> Self {
        let settings = Settings::default().overlay(settings);
        let env = settings.env.unwrap_or_else(|| DEFAULT_ENV.to_string());
        let app_name = settings
            .app_name
            .unwrap_or_else(|| default_app_name.to_string());
        let function_name = format!("{}-{}", app_name, env);
        let log_group_name = settings
            .log_group_name
            .unwrap_or_else(|| format!("/aws/lambda/{}", function_name));

        Self {
            env,
            app_name,
            function_name,
            builds_bucket: settings
                .builds_bucket
                .unwrap_or_else(|| DEFAULT_BUILDS_BUCKET.to_string()),
            log_group_name,
            region: settings
                .region
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        }
    }

    /// Load file and process environment settings, apply the `--env` flag, then defaults
    pub async fn load(
        settings_file: &File,
        env_flag: Option<String>,
        workdir: &Path,
    ) -> Result<Self, DeployError> {
        Self::load_with(settings_file, env_flag, workdir, |key| std::env::var(key).ok()).await
    }

    /// Same as [`DeployConfig::load`], with `DEPLOY_*` variables read through `lookup`
    pub async fn load_with<F>(
        settings_file: &File,
        env_flag: Option<String>,
        workdir: &Path,
        lookup: F,
    ) -> Result<Self, DeployError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Settings::load(settings_file)
            .await?
            .overlay(Settings::from_env_with(lookup))
            .overlay(Settings {
                env: env_flag,
                ..Default::default()
            });
        Ok(Self::resolve(settings, &app_name_from_dir(workdir)?))
    }
}

/// Base name of the working directory
pub fn app_name_from_dir(dir: &Path) -> Result<String, DeployError> {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            DeployError::ConfigError(format!(
                "cannot derive an app name from {}",
                dir.display()
            ))
        })
}
