use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::documents::OutboxRelay;
use crate::models::MonthBounds;
use crate::services::StatsService;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Periodic background work: outbox retries, outbox retention and the
/// nightly rollup reconciliation.
pub struct BackgroundJobs {
    scheduler: JobScheduler,
}

impl BackgroundJobs {
    pub async fn start(
        relay: OutboxRelay,
        stats: StatsService,
        poll_interval: Duration,
        reconcile_cron: &str,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create job scheduler: {}", e))?;

        // Commits nudge the relay directly; this picks up retries whose
        // backoff has elapsed.
        let drain_relay = relay.clone();
        let drain = Job::new_repeated_async(poll_interval, move |_uuid, _l| {
            let relay = drain_relay.clone();
            Box::pin(async move {
                if let Err(e) = relay.drain_once().await {
                    error!(error = %e, "outbox drain failed");
                }
            })
        })
        .map_err(|e| anyhow!("Failed to create outbox job: {}", e))?;

        let purge = Job::new_repeated_async(PURGE_INTERVAL, move |_uuid, _l| {
            let relay = relay.clone();
            Box::pin(async move {
                if let Err(e) = relay.purge_delivered().await {
                    error!(error = %e, "outbox purge failed");
                }
            })
        })
        .map_err(|e| anyhow!("Failed to create outbox purge job: {}", e))?;

        let reconcile = Job::new_async(reconcile_cron, move |_uuid, _l| {
            let stats = stats.clone();
            Box::pin(async move {
                for bounds in reconcile_months(MonthBounds::current()) {
                    match stats.recompute_month_for_all(bounds).await {
                        Ok(report) => info!(
                            year = report.year,
                            month = report.month,
                            users = report.users,
                            trainers = report.trainers,
                            "nightly rollups reconciled"
                        ),
                        Err(e) => error!(error = %e, "nightly rollup reconciliation failed"),
                    }
                }
            })
        })
        .map_err(|e| anyhow!("Invalid STATS_RECONCILE_CRON '{}': {}", reconcile_cron, e))?;

        for (name, job) in [("outbox", drain), ("outbox purge", purge), ("reconciliation", reconcile)] {
            scheduler
                .add(job)
                .await
                .map_err(|e| anyhow!("Failed to add {} job: {}", name, e))?;
        }
        scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start job scheduler: {}", e))?;

        info!(?poll_interval, reconcile_cron, "background jobs started");
        Ok(Self { scheduler })
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop job scheduler: {}", e))?;
        info!("background jobs stopped");
        Ok(())
    }
}

/// Late writes can land in the month that just closed, so the nightly run
/// covers it as well as the current one.
fn reconcile_months(current: MonthBounds) -> [MonthBounds; 2] {
    [current.previous(), current]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconciliation_covers_the_closed_month() {
        let january = MonthBounds::for_month(2025, 1).unwrap();
        let months = reconcile_months(january);

        assert_eq!(months[0], MonthBounds::for_month(2024, 12).unwrap());
        assert_eq!(months[1], january);
    }
}
