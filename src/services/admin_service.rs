use crate::error::{AppError, AppResult};
use crate::models::CollectionLog;
use crate::services::collection_service::CollectionService;
use crate::services::job_ledger::JobOutcome;
use crate::store::MarketStore;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Reply to a manually triggered job. Never an error: failures become a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminResponse {
    pub message: String,
    pub log_id: Option<i64>,
}

impl AdminResponse {
    fn from_outcome<F>(result: AppResult<JobOutcome>, label: &str, success: F) -> Self
    where
        F: FnOnce(&JobOutcome) -> String,
    {
        match result {
            Ok(outcome) => Self {
                message: success(&outcome),
                log_id: Some(outcome.log_id),
            },
            Err(e) => Self {
                message: format!("{} failed: {}", label, failure_reason(&e)),
                log_id: e.job_log_id(),
            },
        }
    }

    fn rejected(message: String) -> Self {
        Self {
            message,
            log_id: None,
        }
    }
}

/// Ledger and table totals
#[derive(Debug, Clone, Serialize)]
pub struct AdminStatus {
    pub last_collection: Option<CollectionLog>,
    pub total_surge_events: i64,
    pub total_tickers: i64,
}

/// Manual trigger surface over the collection jobs
pub struct AdminService {
    collection: Arc<CollectionService>,
    store: Arc<dyn MarketStore>,
}

impl AdminService {
    pub fn new(collection: Arc<CollectionService>, store: Arc<dyn MarketStore>) -> Self {
        Self { collection, store }
    }

    pub async fn collect(&self, date: Option<NaiveDate>) -> AdminResponse {
        let target_date = date.unwrap_or_else(|| Utc::now().date_naive());
        let result = self.collection.run_daily_collection(Some(target_date)).await;
        AdminResponse::from_outcome(result, "Collection", |outcome| {
            format!(
                "Collection completed for {}: {} surges found",
                target_date, outcome.records_count
            )
        })
    }

    pub async fn backfill(&self, from: NaiveDate, to: NaiveDate) -> AdminResponse {
        if let Some(rejection) = reject_range(from, to) {
            return rejection;
        }
        let result = self.collection.run_backfill(from, to).await;
        AdminResponse::from_outcome(result, "Backfill", |outcome| {
            format!(
                "Backfill completed from {} to {}: {} surges found",
                from, to, outcome.records_count
            )
        })
    }

    pub async fn bulk_download(&self, from: NaiveDate, to: NaiveDate) -> AdminResponse {
        if let Some(rejection) = reject_range(from, to) {
            return rejection;
        }
        let result = self.collection.run_bulk_download(from, to).await;
        AdminResponse::from_outcome(result, "Bulk download", |outcome| {
            format!(
                "Bulk download completed from {} to {}: {} records",
                from, to, outcome.records_count
            )
        })
    }

    pub async fn sync_tickers(&self) -> AdminResponse {
        let result = self.collection.run_ticker_sync().await;
        AdminResponse::from_outcome(result, "Ticker sync", |outcome| {
            format!("Ticker sync completed: {} tickers synced", outcome.records_count)
        })
    }

    pub async fn enrich_tickers(&self) -> AdminResponse {
        let result = self.collection.run_ticker_enrichment().await;
        AdminResponse::from_outcome(result, "Ticker enrichment", |outcome| {
            format!("Ticker enrichment completed: {} tickers enriched", outcome.records_count)
        })
    }

    pub async fn download_dividends(&self) -> AdminResponse {
        let result = self.collection.run_dividend_download().await;
        AdminResponse::from_outcome(result, "Dividend download", |outcome| {
            format!("Dividend download completed: {} dividends stored", outcome.records_count)
        })
    }

    pub async fn download_splits(&self) -> AdminResponse {
        let result = self.collection.run_split_download().await;
        AdminResponse::from_outcome(result, "Split download", |outcome| {
            format!("Split download completed: {} splits stored", outcome.records_count)
        })
    }

    pub async fn status(&self) -> AppResult<AdminStatus> {
        Ok(AdminStatus {
            last_collection: self.store.latest_job().await?,
            total_surge_events: self.store.count_surge_events().await?,
            total_tickers: self.store.count_tickers().await?,
        })
    }
}

fn reject_range(from: NaiveDate, to: NaiveDate) -> Option<AdminResponse> {
    if from > to {
        Some(AdminResponse::rejected(format!(
            "Invalid range: from date {} is after to date {}",
            from, to
        )))
    } else {
        None
    }
}

/// The job's own error, without the ledger wrapper
fn failure_reason(err: &AppError) -> String {
    match err {
        AppError::JobFailed { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}
