use crate::error::RepositoryError;
use crate::models::{CollectionLog, JobStatus, JobType};
use sqlx::PgPool;

const LOG_COLUMNS: &str =
    "id, job_type, started_at, completed_at, status, records_count, error_message";

/// Repository for the job ledger
pub struct CollectionLogRepository {
    pool: PgPool,
}

impl CollectionLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a ledger row in `running` status
    pub async fn create(&self, job_type: JobType) -> Result<CollectionLog, RepositoryError> {
        let log = sqlx::query_as::<_, CollectionLog>(&format!(
            r#"
            INSERT INTO collection_logs (job_type, status)
            VALUES ($1, $2)
            RETURNING {}
            "#,
            LOG_COLUMNS
        ))
        .bind(job_type.as_str())
        .bind(JobStatus::Running.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(log)
    }

    /// Move a running row to a terminal status. Rows already closed are left untouched.
    pub async fn finish(
        &self,
        id: i64,
        status: JobStatus,
        records_count: i64,
        error_message: Option<&str>,
    ) -> Result<CollectionLog, RepositoryError> {
        if !status.is_terminal() {
            return Err(RepositoryError::InvalidInput(format!(
                "cannot finish ledger row {} as {}",
                id,
                status.as_str()
            )));
        }

        let log = sqlx::query_as::<_, CollectionLog>(&format!(
            r#"
            UPDATE collection_logs
            SET status = $2, records_count = $3, error_message = $4, completed_at = NOW()
            WHERE id = $1 AND status = 'running'
            RETURNING {}
            "#,
            LOG_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(records_count)
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await?;

        log.ok_or_else(|| {
            RepositoryError::InvalidInput(format!("ledger row {} is not running", id))
        })
    }

    /// Most recent running row for a job type
    pub async fn find_running(
        &self,
        job_type: JobType,
    ) -> Result<Option<CollectionLog>, RepositoryError> {
        let log = sqlx::query_as::<_, CollectionLog>(&format!(
            r#"
            SELECT {}
            FROM collection_logs
            WHERE job_type = $1 AND status = 'running'
            ORDER BY started_at DESC, id DESC
            LIMIT 1
            "#,
            LOG_COLUMNS
        ))
        .bind(job_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(log)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<CollectionLog>, RepositoryError> {
        let log = sqlx::query_as::<_, CollectionLog>(&format!(
            "SELECT {} FROM collection_logs WHERE id = $1",
            LOG_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(log)
    }

    pub async fn find_latest(&self) -> Result<Option<CollectionLog>, RepositoryError> {
        let log = sqlx::query_as::<_, CollectionLog>(&format!(
            "SELECT {} FROM collection_logs ORDER BY id DESC LIMIT 1",
            LOG_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(log)
    }
}
