//! `courier-worker` -- one-shot runs of the scheduled notification passes.
//!
//! Intended for an external timer (cron, systemd timer, Kubernetes CronJob).
//! Each command prints a JSON summary on stdout.
//!
//! # Exit codes
//!
//! | Code | Meaning                                                      |
//! |------|--------------------------------------------------------------|
//! | `0`  | Pass completed, including passes with nothing to do          |
//! | `2`  | Setup failed: configuration, database unreachable, store error |
//!
//! An autopilot pass where some agent failed still prints its summary, then
//! exits `2`.
//!
//! # Environment variables
//!
//! `DATABASE_URL` is required. Pipeline settings are read by
//! `PipelineConfig::from_env`.

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use courier_pipeline::{Pipeline, PipelineConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status for any failure that prevented the pass from completing.
const EXIT_SETUP_FAILURE: u8 = 2;

/// One-shot notification pipeline passes.
#[derive(Parser)]
#[command(name = "courier-worker")]
#[command(about = "Run scheduled notification passes once", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the autopilot pass for every agent.
    ///
    /// Each agent's schedule decides whether anything is dispatched; an agent
    /// that already ran today is skipped.
    Autopilot {
        /// Evaluate schedules as of this RFC 3339 instant instead of now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Reconcile read receipts for user-session Telegram configurations.
    Reconcile,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(summary) => {
            println!("{}", summary.body);
            if summary.failures == 0 {
                ExitCode::SUCCESS
            } else {
                tracing::error!(failures = summary.failures, "Worker pass completed with failures");
                ExitCode::from(EXIT_SETUP_FAILURE)
            }
        }
        Err(e) => {
            tracing::error!(error = ?e, "Worker pass failed");
            ExitCode::from(EXIT_SETUP_FAILURE)
        }
    }
}

/// JSON printed on stdout, plus the number of units that failed.
struct Summary {
    body: serde_json::Value,
    failures: usize,
}

async fn run(command: Commands) -> Result<Summary> {
    let pipeline = connect().await?;

    match command {
        Commands::Autopilot { at } => {
            let now = at.unwrap_or_else(Utc::now);
            let report = pipeline
                .autopilot
                .run_pass(now)
                .await
                .context("autopilot pass failed")?;
            tracing::info!(
                dispatched = report.dispatched,
                agents = report.agents.len(),
                failed_agents = report.failed_agents,
                "Autopilot pass complete"
            );
            Ok(Summary {
                body: serde_json::json!({
                    "command": "autopilot",
                    "at": now,
                    "dispatched": report.dispatched,
                    "failed_agents": report.failed_agents,
                    "agents": report.agents,
                }),
                failures: report.failed_agents,
            })
        }
        Commands::Reconcile => {
            let report = pipeline
                .reconciler
                .run()
                .await
                .context("read-receipt pass failed")?;
            tracing::info!(updated = report.updated, "Read-receipt pass complete");
            Ok(Summary {
                body: serde_json::json!({
                    "command": "reconcile",
                    "updated": report.updated,
                    "configurations": report.configurations,
                    "failed_configurations": report.failed_configurations,
                    "failed_peers": report.failed_peers,
                }),
                // Per-configuration failures are transient and retried next pass.
                failures: 0,
            })
        }
    }
}

/// Load configuration, connect to the database and wire the pipeline.
async fn connect() -> Result<Pipeline> {
    let config = PipelineConfig::from_env().context("invalid pipeline configuration")?;
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = courier_db::create_pool(&database_url)
        .await
        .context("failed to connect to database")?;
    courier_db::health_check(&pool)
        .await
        .context("database health check failed")?;
    courier_db::run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;

    Pipeline::new(pool, &config).context("failed to wire pipeline")
}
