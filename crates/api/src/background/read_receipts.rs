//! Periodic read-receipt reconciliation for user-session channels.

use std::sync::Arc;
use std::time::Duration;

use courier_pipeline::ReadReceiptReconciler;
use tokio_util::sync::CancellationToken;

/// Run the reconciler every `period` until `cancel` is triggered.
pub async fn run(
    reconciler: Arc<ReadReceiptReconciler>,
    period: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = period.as_secs(), "Read-receipt job started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Read-receipt job stopping");
                break;
            }
            _ = interval.tick() => {
                match reconciler.run().await {
                    Ok(report) => {
                        if report.updated > 0 || report.failed_configurations > 0 || report.failed_peers > 0 {
                            tracing::info!(
                                updated = report.updated,
                                configurations = report.configurations,
                                failed_configurations = report.failed_configurations,
                                failed_peers = report.failed_peers,
                                "Read receipts: pass complete"
                            );
                        } else {
                            tracing::debug!("Read receipts: nothing to update");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Read receipts: pass failed"),
                }
            }
        }
    }
}
