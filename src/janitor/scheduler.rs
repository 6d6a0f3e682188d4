//! Cron wiring for the janitor.
//!
//! Wraps `tokio-cron-scheduler` with a single job that calls
//! [`Janitor::run_pass`] on each trigger.

use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use super::runner::Janitor;
use crate::error::{Error, Result};
use crate::service::now_seconds;

/// Rewrites a classic 5-field cron expression to the scheduler's
/// seconds-first form by prepending a `0` seconds field.
///
/// Expressions with 6 or 7 fields are returned trimmed but otherwise intact.
pub fn normalize_schedule(expr: &str) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() == 5 {
        format!("0 {}", fields.join(" "))
    } else {
        fields.join(" ")
    }
}

/// Normalizes and parses a cron expression without scheduling anything.
pub fn validate_schedule(expr: &str) -> Result<String> {
    let normalized = normalize_schedule(expr);
    if normalized.is_empty() {
        return Err(Error::Config("cron schedule is empty".to_string()));
    }

    Job::new_async(normalized.as_str(), |_uuid, _lock| Box::pin(async {}))
        .map_err(|e| Error::Config(format!("invalid cron expression '{expr}': {e}")))?;
    Ok(normalized)
}

/// Scheduler service owning the janitor's cron job.
pub struct JanitorScheduler {
    scheduler: JobScheduler,
    schedule: String,
}

impl JanitorScheduler {
    /// Creates a scheduler with one job running `janitor` on `schedule`.
    ///
    /// The schedule is interpreted in UTC.
    pub async fn new(janitor: Arc<Janitor>, schedule: &str) -> Result<Self> {
        let schedule = validate_schedule(schedule)?;

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| Error::Schedule(format!("failed to create job scheduler: {e}")))?;

        let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
            let janitor = Arc::clone(&janitor);
            Box::pin(async move {
                janitor.run_pass(now_seconds(), false).await;
            })
        })
        .map_err(|e| Error::Schedule(format!("invalid cron expression '{schedule}': {e}")))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| Error::Schedule(format!("failed to add janitor job: {e}")))?;

        Ok(Self {
            scheduler,
            schedule,
        })
    }

    /// The normalized cron expression.
    pub fn schedule(&self) -> &str {
        &self.schedule
    }

    /// Starts the scheduler.
    pub async fn start(&self) -> Result<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| Error::Schedule(format!("failed to start scheduler: {e}")))?;
        tracing::info!(schedule = %self.schedule, "Janitor scheduler started");
        Ok(())
    }

    /// Stops the scheduler.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| Error::Schedule(format!("failed to shutdown scheduler: {e}")))?;
        tracing::info!("Janitor scheduler stopped");
        Ok(())
    }
}
