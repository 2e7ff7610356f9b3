//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring inventory alert scan.

use kidswear_services::{CatalogStore, InventoryLedger};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// The returned [`JobScheduler`] handle must be kept alive for the lifetime
/// of the process; dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// `alert_cron` is not a valid schedule, or the scheduler fails to start.
pub async fn build_scheduler<S: CatalogStore>(
    ledger: InventoryLedger<S>,
    alert_cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_alert_scan_job(&scheduler, ledger, alert_cron).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_alert_scan_job<S: CatalogStore>(
    scheduler: &JobScheduler,
    ledger: InventoryLedger<S>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let ledger = ledger.clone();
        Box::pin(async move {
            let flagged = run_alert_scan(&ledger).await;
            tracing::info!(flagged, "scheduler: inventory alert scan complete");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: inventory alert scan registered");
    Ok(())
}

/// Logs one `warn` per low-stock variant. Returns how many were flagged.
pub(crate) async fn run_alert_scan<S: CatalogStore>(ledger: &InventoryLedger<S>) -> usize {
    let alerts = match ledger.get_inventory_alerts().await {
        Ok(alerts) => alerts,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: inventory alert scan failed");
            return 0;
        }
    };

    for alert in &alerts {
        tracing::warn!(
            product_id = %alert.key.product_id,
            size = %alert.key.size,
            color_index = alert.key.color_index,
            stock = alert.stock_quantity,
            reserved = alert.reserved_quantity,
            threshold = alert.low_stock_threshold,
            severity = ?alert.severity,
            "inventory alert"
        );
    }
    alerts.len()
}
