//! Lambda Deployer - Entry Point
//!
//! Builds the function in the current directory, ships it, promotes the new
//! version to the `canary` alias and optionally tails its logs.

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};
use colored::Colorize;
use tracing::debug;

use lambda_deployer::app::options::DeployOptions;
use lambda_deployer::app::run::{run, DeployReport};
use lambda_deployer::app::settings::{DeployConfig, DEFAULT_SETTINGS_FILE};
use lambda_deployer::deploy::artifact::GoBuilder;
use lambda_deployer::filesys::file::File;
use lambda_deployer::logs::{init_logging, LogLevel, LogOptions};
use lambda_deployer::platform::PlatformClients;
use lambda_deployer::utils::version_info;

/// Deploy a Lambda function
#[derive(Parser, Debug)]
#[command(name = "deploy", version, about)]
struct Cli {
    /// Environment name postfix (prod-use1|stag)
    #[arg(short, long)]
    env: Option<String>,

    /// Tail logs after deployment (`--tail`, `--tail=true`, `--tail=false`)
    #[arg(
        long,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    tail: bool,

    /// Settings file
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_options = LogOptions {
        log_level: cli.log_level,
        json_format: cli.json_logs,
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let version = version_info();
    debug!(
        "lambda-deployer {} ({}, built {})",
        version.version, version.git_hash, version.build_time
    );

    match execute(cli).await {
        Ok(report) => {
            println!(
                "{} {} version {} is live on alias '{}' ({})",
                "✔".green().bold(),
                report.target.function_name,
                report.version,
                report.alias,
                report.artifact_key
            );
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<DeployReport> {
    let workdir = std::env::current_dir().context("Error getting current directory")?;
    let config = DeployConfig::load(&File::new(&cli.config), cli.env, &workdir).await?;
    debug!("Resolved configuration: {:?}", config);

    let clients = PlatformClients::from_aws(&config.region).await;
    let builder = GoBuilder::new(workdir);
    let options = DeployOptions {
        tail: cli.tail,
        ..Default::default()
    };

    let report = run(&config, &options, &clients, &builder)
        .await
        .with_context(|| format!("Deploying {} failed", config.function_name))?;
    Ok(report)
}
