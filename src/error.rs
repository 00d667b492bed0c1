use crate::database::DatabaseError;
use crate::market_data::ProviderError;
use crate::models::JobType;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Errors surfaced by jobs and their collaborators
#[derive(Error, Debug)]
pub enum AppError {
    /// Pool setup or migration errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected input: bad ranges, bad settings, constraint violations
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Another execution of the same job type holds the ledger
    #[error("{job_type} is already running (log {log_id})")]
    JobAlreadyRunning { job_type: JobType, log_id: i64 },

    /// A job failed after its ledger row was opened
    #[error("{job_type} job {log_id} failed: {source}")]
    JobFailed {
        job_type: JobType,
        log_id: i64,
        #[source]
        source: Box<AppError>,
    },

    #[error("{0}")]
    Message(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Ledger id attached to a failed job, if any
    pub fn job_log_id(&self) -> Option<i64> {
        match self {
            AppError::JobFailed { log_id, .. } => Some(*log_id),
            _ => None,
        }
    }

    /// True when the provider gave up after repeated 429s
    pub fn is_rate_limited(&self) -> bool {
        match self {
            AppError::Provider(ProviderError::RateLimited { .. }) => true,
            AppError::JobFailed { source, .. } => source.is_rate_limited(),
            _ => false,
        }
    }
}

/// Errors raised by the Postgres repositories
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Query error: {0}")]
    Query(SqlxError),

    #[error("Record not found")]
    NotFound(String),

    /// Unique constraint hit on an insert without a conflict clause
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Foreign key or check constraint, e.g. a surge for an unknown ticker
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::Validation(format!("Duplicate: {}", msg)),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::InvalidInput(msg) => AppError::Validation(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                match code.as_deref() {
                    // unique_violation
                    Some("23505") => RepositoryError::Duplicate(db_err.message().to_string()),
                    // foreign_key_violation, check_violation
                    Some("23503") | Some("23514") => {
                        RepositoryError::ConstraintViolation(db_err.message().to_string())
                    }
                    _ => RepositoryError::Query(err),
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}
