//! In-process autopilot scheduler.
//!
//! Runs an autopilot pass every `AUTOPILOT_CHECK_INTERVAL_SECS`. Each agent's
//! own schedule decides whether anything is dispatched; the durable
//! `last_auto_run_date` guard makes overlapping ticks harmless.

use std::time::Duration;

use chrono::Utc;
use courier_pipeline::AutopilotRunner;
use tokio_util::sync::CancellationToken;

/// Run the autopilot loop until `cancel` is triggered.
pub async fn run(runner: AutopilotRunner, period: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Autopilot job started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Autopilot job stopping");
                break;
            }
            _ = interval.tick() => {
                match runner.run_pass(Utc::now()).await {
                    Ok(report) if report.dispatched > 0 => {
                        tracing::info!(
                            dispatched = report.dispatched,
                            agents = report.agents.len(),
                            "Autopilot: pass dispatched notifications"
                        );
                    }
                    Ok(_) => tracing::debug!("Autopilot: nothing due"),
                    Err(e) => tracing::error!(error = %e, "Autopilot: pass failed"),
                }
            }
        }
    }
}
