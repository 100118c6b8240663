//! `lra-tck` command line driver.
//!
//! # Commands
//! - `smoke`: run the built-in lifecycle scenarios against the target and
//!   print a JSON report
//! - `start`, `close`, `cancel`, `leave`: single lifecycle operations

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use lra_tck::config::validation::validate_config;
use lra_tck::config::{load_config, ConfigError, TckConfig};
use lra_tck::observability::{logging, metrics};
use lra_tck::{LraClientOps, LraError, LraId, TckContext};

#[derive(Parser)]
#[command(name = "lra-tck")]
#[command(about = "Client driver for the LRA compatibility kit", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the deployment, overriding the configuration.
    #[arg(short, long)]
    target: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the lifecycle scenarios and report the results
    Smoke,
    /// Start an LRA and print its id
    Start {
        /// Parent LRA for a nested start
        #[arg(long)]
        parent: Option<String>,
    },
    /// Close an LRA
    Close { lra: String },
    /// Cancel an LRA
    Cancel { lra: String },
    /// Remove a participant from an LRA
    Leave {
        lra: String,
        #[arg(long)]
        base_path: String,
        #[arg(long)]
        resource_path: String,
    },
}

#[derive(Debug, Serialize)]
struct ScenarioResult {
    scenario: &'static str,
    passed: bool,
    detail: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(target) = cli.target {
        config.target.base_url = target;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_tracing(&config.observability.log_level);
    tracing::info!(base_url = %config.target.base_url, "lra-tck starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match cli.command {
        Commands::Smoke => {
            let results = run_smoke(&config).await;
            println!("{}", serde_json::to_string_pretty(&results)?);
            if results.iter().any(|r| !r.passed) {
                return Err("smoke scenarios failed".into());
            }
        }
        Commands::Start { parent } => {
            let parent = parent.as_deref().map(LraId::parse).transpose()?;
            let ops = LraClientOps::from_config(&config)?;
            let lra = ops.start_lra(parent.as_ref(), "lra-tck#start", Duration::ZERO).await?;
            println!("{}", lra);
            ops.shutdown().await;
        }
        Commands::Close { lra } => {
            let ops = LraClientOps::from_config(&config)?;
            ops.close_lra_str(&lra).await?;
            ops.shutdown().await;
        }
        Commands::Cancel { lra } => {
            let lra = LraId::parse(&lra)?;
            let ops = LraClientOps::from_config(&config)?;
            ops.cancel_lra(&lra).await?;
            ops.shutdown().await;
        }
        Commands::Leave {
            lra,
            base_path,
            resource_path,
        } => {
            let lra = LraId::parse(&lra)?;
            let ops = LraClientOps::from_config(&config)?;
            let status = ops.leave_lra(&lra, &base_path, &resource_path).await?;
            println!("{}", status);
            ops.shutdown().await;
        }
    }

    Ok(())
}

async fn run_smoke(config: &TckConfig) -> Vec<ScenarioResult> {
    vec![
        scenario("close", close_scenario(config).await),
        scenario("cancel", cancel_scenario(config).await),
        scenario("nested", nested_scenario(config).await),
        scenario("timeout", timeout_scenario(config).await),
    ]
}

fn scenario(name: &'static str, outcome: Result<String, String>) -> ScenarioResult {
    match outcome {
        Ok(detail) => {
            tracing::info!(scenario = name, "Scenario passed");
            ScenarioResult {
                scenario: name,
                passed: true,
                detail,
            }
        }
        Err(detail) => {
            tracing::error!(scenario = name, detail = %detail, "Scenario failed");
            ScenarioResult {
                scenario: name,
                passed: false,
                detail,
            }
        }
    }
}

async fn close_scenario(config: &TckConfig) -> Result<String, String> {
    let ctx = TckContext::before_http("Smoke", "close", config.clone()).map_err(|e| e.to_string())?;
    let timeout = ctx.lra_timeout().map_err(|e| e.to_string())?;

    let outcome = async {
        let lra = ctx.ops().start_lra(None, &ctx.client_id(), timeout).await?;
        ctx.ops().close_lra(&lra).await?;
        Ok::<_, LraError>(lra)
    }
    .await;

    finish(ctx, outcome).await
}

async fn cancel_scenario(config: &TckConfig) -> Result<String, String> {
    let ctx = TckContext::before_http("Smoke", "cancel", config.clone()).map_err(|e| e.to_string())?;
    let timeout = ctx.lra_timeout().map_err(|e| e.to_string())?;

    let outcome = async {
        let lra = ctx.ops().start_lra(None, &ctx.client_id(), timeout).await?;
        ctx.ops().cancel_lra(&lra).await?;
        Ok::<_, LraError>(lra)
    }
    .await;

    finish(ctx, outcome).await
}

async fn nested_scenario(config: &TckConfig) -> Result<String, String> {
    let ctx = TckContext::before_http("Smoke", "nested", config.clone()).map_err(|e| e.to_string())?;
    let timeout = ctx.lra_timeout().map_err(|e| e.to_string())?;

    let outcome = async {
        let parent = ctx.ops().start_lra(None, &ctx.client_id(), timeout).await?;
        let child = ctx
            .ops()
            .start_lra(Some(&parent), &ctx.client_id(), timeout)
            .await?;
        ctx.ops().close_lra(&child).await?;
        ctx.ops().close_lra(&parent).await?;
        Ok::<_, LraError>(child)
    }
    .await;

    finish(ctx, outcome).await
}

/// Leaves an LRA open past a short timer; passes when the timer catches it.
async fn timeout_scenario(config: &TckConfig) -> Result<String, String> {
    let ctx = TckContext::before_http("Smoke", "timeout", config.clone()).map_err(|e| e.to_string())?;
    let timeout = ctx.adjust(Duration::from_millis(100));

    let lra = match ctx.ops().start_lra(None, &ctx.client_id(), timeout).await {
        Ok(lra) => lra,
        Err(e) => {
            ctx.after().await;
            return Err(e.to_string());
        }
    };
    tokio::time::sleep(timeout * 3 + ctx.adjust(Duration::from_millis(500))).await;

    let report = ctx.after().await;
    let caught = report
        .background_errors
        .iter()
        .filter(|e| matches!(e, LraError::PrematureTimeout { lra: timed_out, .. } if *timed_out == lra))
        .count();
    if caught == 1 && report.leaked == 0 {
        Ok(format!("timer cancelled {}", lra))
    } else {
        Err(format!(
            "expected the timer to cancel {} once, saw {} timeouts and {} leaks",
            lra, caught, report.leaked
        ))
    }
}

async fn finish(
    ctx: TckContext<lra_tck::HttpInvoker>,
    outcome: Result<LraId, LraError>,
) -> Result<String, String> {
    let report = ctx.after().await;
    let lra = outcome.map_err(|e| e.to_string())?;
    if report.is_clean() {
        Ok(lra.to_string())
    } else {
        Err(format!(
            "{} leaked LRAs, {} timer errors",
            report.leaked,
            report.background_errors.len()
        ))
    }
}
