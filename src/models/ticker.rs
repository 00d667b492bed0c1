use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tradable symbol and its metadata
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticker {
    pub symbol: String,
    pub name: Option<String>,
    pub market: Option<String>,
    pub exchange: Option<String>,
    pub ticker_type: Option<String>,
    pub sic_code: Option<String>,
    pub sic_description: Option<String>,
    pub currency: Option<String>,
    pub active: bool,

    // Fundamentals from the details endpoint
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<i64>,
    pub weighted_shares_outstanding: Option<i64>,
    pub total_employees: Option<i64>,
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    pub list_date: Option<NaiveDate>,
    pub primary_exchange: Option<String>,
    pub cik: Option<String>,
    pub details_updated_at: Option<DateTime<Utc>>, // Null until enrichment succeeds
    pub details_attempted_at: Option<DateTime<Utc>>,

    pub updated_at: DateTime<Utc>,
}

impl Ticker {
    /// Bare row for a symbol seen before ticker sync picked it up
    pub fn stub(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: None,
            market: None,
            exchange: None,
            ticker_type: None,
            sic_code: None,
            sic_description: None,
            currency: None,
            active: true,
            market_cap: None,
            shares_outstanding: None,
            weighted_shares_outstanding: None,
            total_employees: None,
            description: None,
            homepage_url: None,
            list_date: None,
            primary_exchange: None,
            cik: None,
            details_updated_at: None,
            details_attempted_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn needs_details(&self) -> bool {
        self.details_updated_at.is_none()
    }
}

/// Directory fields written by ticker sync
#[derive(Debug, Clone, PartialEq)]
pub struct TickerUpsert {
    pub symbol: String,
    pub name: Option<String>,
    pub market: Option<String>,
    pub exchange: Option<String>,
    pub ticker_type: Option<String>,
    pub currency: Option<String>,
    pub active: bool,
}

/// Fundamentals written by enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct TickerDetailsUpdate {
    pub symbol: String,
    pub name: Option<String>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<i64>,
    pub weighted_shares_outstanding: Option<i64>,
    pub total_employees: Option<i64>,
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    pub list_date: Option<NaiveDate>,
    pub primary_exchange: Option<String>,
    pub cik: Option<String>,
    pub sic_code: Option<String>,
    pub sic_description: Option<String>,
}
