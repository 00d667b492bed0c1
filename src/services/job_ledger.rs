//! Job ledger: one `collection_logs` row per job execution.
//!
//! `run` wraps a job body so that the row is opened before any work happens
//! and closed exactly once afterwards, as completed with the body's record
//! count or as failed with a truncated error message.

use crate::error::{AppError, AppResult};
use crate::models::{truncate_error_message, CollectionLog, JobType};
use crate::store::MarketStore;
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of a completed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub log_id: i64,
    pub records_count: i64,
}

pub struct JobLedger {
    store: Arc<dyn MarketStore>,
    stale_after: chrono::Duration,
}

impl JobLedger {
    pub fn new(store: Arc<dyn MarketStore>, stale_after: chrono::Duration) -> Self {
        Self { store, stale_after }
    }

    /// Open a running row for `job_type`.
    ///
    /// Refuses while a fresh running row of the same type exists. A running row
    /// older than the staleness window is closed as failed first.
    pub async fn open(&self, job_type: JobType) -> AppResult<CollectionLog> {
        if let Some(running) = self.store.find_running_job(job_type).await? {
            if !running.is_stale(Utc::now(), self.stale_after) {
                return Err(AppError::JobAlreadyRunning {
                    job_type,
                    log_id: running.id,
                });
            }

            warn!(
                "Closing abandoned {} run (log {}, started {})",
                job_type, running.id, running.started_at
            );
            let message = format!(
                "abandoned: still running after {} minutes",
                self.stale_after.num_minutes()
            );
            self.store.fail_job(running.id, &message).await?;
        }

        self.store.start_job(job_type).await
    }

    /// Run `job` under a ledger row. The body returns the number of records it processed.
    pub async fn run<F, Fut>(&self, job_type: JobType, job: F) -> AppResult<JobOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<i64>>,
    {
        let log = self.open(job_type).await?;
        info!("Started {} (log {})", job_type, log.id);

        match job().await {
            Ok(records_count) => {
                self.store.complete_job(log.id, records_count).await?;
                info!(
                    "{} completed (log {}): {} records",
                    job_type, log.id, records_count
                );
                Ok(JobOutcome {
                    log_id: log.id,
                    records_count,
                })
            }
            Err(e) => {
                error!("{} failed (log {}): {}", job_type, log.id, e);
                let message = truncate_error_message(&e.to_string());
                if let Err(ledger_err) = self.store.fail_job(log.id, &message).await {
                    error!("Could not record failure for log {}: {}", log.id, ledger_err);
                }
                Err(AppError::JobFailed {
                    job_type,
                    log_id: log.id,
                    source: Box::new(e),
                })
            }
        }
    }
}
