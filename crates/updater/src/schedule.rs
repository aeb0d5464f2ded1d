//! Cron-driven background runner for the update check.

use crate::error::{Result, UpdaterError};
use chrono::{DateTime, Utc};
use croner::Cron;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A parsed cron expression (seconds field optional).
pub struct Schedule {
    expression: String,
    cron: Cron,
}

impl Schedule {
    /// Parse a five or six field cron expression.
    pub fn parse(expression: &str) -> Result<Self> {
        let cron = Cron::new(expression)
            .with_seconds_optional()
            .parse()
            .map_err(|err| UpdaterError::Schedule {
                schedule: expression.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `now`.
    pub fn next_after(&self, now: &DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.cron
            .find_next_occurrence(now, false)
            .map_err(|err| UpdaterError::Schedule {
                schedule: self.expression.clone(),
                reason: err.to_string(),
            })
    }

    /// Spawn a task that runs `job` at every occurrence, and once up front when
    /// `run_at_boot` is set. Runs never overlap: the next wait starts only
    /// after the previous run returns.
    pub fn start<F, Fut>(self, run_at_boot: bool, job: F) -> ScheduleHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        info!(target: "updater", schedule = %self.expression(), run_at_boot, "scheduler started");

        let task = tokio::spawn(async move {
            if run_at_boot {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = job() => {}
                }
            }

            loop {
                let next = match self.next_after(&Utc::now()) {
                    Ok(next) => next,
                    Err(err) => {
                        error!(target: "updater", error = %err, "scheduler stopped");
                        return;
                    }
                };
                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                debug!(target: "updater", next = %next, "waiting for next scheduled check");

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
                // A stop during a run drops it; temporary files go with it.
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = job() => {}
                }
            }
            info!(target: "updater", "scheduler stopped");
        });

        ScheduleHandle { cancel, task }
    }
}

/// Stop handle for a running schedule.
pub struct ScheduleHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    /// Stop and wait for the task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}
