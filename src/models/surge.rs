use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Day offsets at which post-surge performance is recorded
pub const TRACKING_OFFSETS: [i32; 4] = [1, 3, 7, 30];

/// A detected surge. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SurgeEvent {
    pub id: i64,
    pub symbol: String,
    pub event_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub prev_close: f64,
    pub change_pct: f64,
    pub vwap: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSurgeEvent {
    pub symbol: String,
    pub event_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub prev_close: f64,
    pub change_pct: f64,
    pub vwap: Option<f64>,
}

/// Performance snapshot `days_after` calendar days after a surge
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SurgeTracking {
    pub id: i64,
    pub surge_event_id: i64,
    pub days_after: i32,
    pub close_price: f64,
    pub change_from_surge_pct: f64,
    pub tracked_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSurgeTracking {
    pub surge_event_id: i64,
    pub days_after: i32,
    pub close_price: f64,
    pub change_from_surge_pct: f64,
    pub tracked_date: NaiveDate,
}
