use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One symbol's OHLCV for one trading day, unique per (symbol, trade_date)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyPrice {
    pub id: i64,
    pub symbol: String,
    pub trade_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub vwap: Option<f64>,
    pub transactions: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDailyPrice {
    pub symbol: String,
    pub trade_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub vwap: Option<f64>,
    pub transactions: Option<i64>,
}
