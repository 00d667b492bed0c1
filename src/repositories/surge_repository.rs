//! Repository for surge events and their tracking snapshots

use crate::error::RepositoryError;
use crate::models::{NewSurgeEvent, NewSurgeTracking, SurgeEvent, SurgeTracking};
use chrono::NaiveDate;
use sqlx::PgPool;

const EVENT_COLUMNS: &str = "id, symbol, event_date, open, high, low, close, volume, prev_close, change_pct, vwap, created_at";
const TRACKING_COLUMNS: &str =
    "id, surge_event_id, days_after, close_price, change_from_surge_pct, tracked_date, created_at";

pub struct SurgeRepository {
    pool: PgPool,
}

impl SurgeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Surge events
    // =========================================================================

    pub async fn event_exists(
        &self,
        symbol: &str,
        event_date: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM surge_events WHERE symbol = $1 AND event_date = $2)",
        )
        .bind(symbol)
        .bind(event_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Insert an event. Returns `None` if (symbol, event_date) is already stored.
    pub async fn insert_event(
        &self,
        event: &NewSurgeEvent,
    ) -> Result<Option<SurgeEvent>, RepositoryError> {
        let inserted = sqlx::query_as::<_, SurgeEvent>(&format!(
            r#"
            INSERT INTO surge_events
                (symbol, event_date, open, high, low, close, volume, prev_close, change_pct, vwap)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (symbol, event_date) DO NOTHING
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(&event.symbol)
        .bind(event.event_date)
        .bind(event.open)
        .bind(event.high)
        .bind(event.low)
        .bind(event.close)
        .bind(event.volume)
        .bind(event.prev_close)
        .bind(event.change_pct)
        .bind(event.vwap)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted)
    }

    pub async fn find_events_on(
        &self,
        event_date: NaiveDate,
    ) -> Result<Vec<SurgeEvent>, RepositoryError> {
        let events = sqlx::query_as::<_, SurgeEvent>(&format!(
            "SELECT {} FROM surge_events WHERE event_date = $1 ORDER BY id",
            EVENT_COLUMNS
        ))
        .bind(event_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    pub async fn count_events(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM surge_events")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Tracking
    // =========================================================================

    pub async fn tracking_exists(
        &self,
        surge_event_id: i64,
        days_after: i32,
    ) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM surge_tracking WHERE surge_event_id = $1 AND days_after = $2)",
        )
        .bind(surge_event_id)
        .bind(days_after)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Insert a snapshot. Returns `None` if one already exists for (event, days_after).
    pub async fn insert_tracking(
        &self,
        tracking: &NewSurgeTracking,
    ) -> Result<Option<SurgeTracking>, RepositoryError> {
        let inserted = sqlx::query_as::<_, SurgeTracking>(&format!(
            r#"
            INSERT INTO surge_tracking
                (surge_event_id, days_after, close_price, change_from_surge_pct, tracked_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (surge_event_id, days_after) DO NOTHING
            RETURNING {}
            "#,
            TRACKING_COLUMNS
        ))
        .bind(tracking.surge_event_id)
        .bind(tracking.days_after)
        .bind(tracking.close_price)
        .bind(tracking.change_from_surge_pct)
        .bind(tracking.tracked_date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted)
    }
}
