use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Maximum stored length of a ledger error message, in characters
pub const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Kind of collection job recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    DailyCollection,
    Backfill,
    BulkDownload,
    TickerSync,
    TickerEnrichment,
    DividendDownload,
    SplitDownload,
}

impl JobType {
    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::DailyCollection => "daily_collection",
            JobType::Backfill => "backfill",
            JobType::BulkDownload => "bulk_download",
            JobType::TickerSync => "ticker_sync",
            JobType::TickerEnrichment => "ticker_enrichment",
            JobType::DividendDownload => "dividend_download",
            JobType::SplitDownload => "split_download",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger row status. `Running` moves to a terminal status exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// One execution of a collection job
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CollectionLog {
    pub id: i64,
    pub job_type: String, // Stored as TEXT, use JobType enum for type safety
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: String, // Stored as TEXT, use JobStatus enum for type safety
    pub records_count: i64,
    pub error_message: Option<String>,
}

impl CollectionLog {
    /// Get status as an enum
    pub fn status_enum(&self) -> JobStatus {
        JobStatus::from_str(&self.status).unwrap_or(JobStatus::Running)
    }

    pub fn is_running(&self) -> bool {
        self.status_enum() == JobStatus::Running
    }

    /// A running row older than `stale_after` is considered abandoned
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: chrono::Duration) -> bool {
        self.is_running() && now - self.started_at > stale_after
    }
}

/// Cap an error message at `MAX_ERROR_MESSAGE_LEN` characters
pub fn truncate_error_message(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
}
