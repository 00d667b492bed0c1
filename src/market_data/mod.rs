//! Market data source abstraction and provider payload types.
//!
//! The `MarketDataSource` trait is the capability set the collection jobs
//! depend on. `PolygonClient` is the production implementation; tests plug in
//! scripted sources.

pub mod polygon;

pub use polygon::PolygonClient;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

/// Structured error types for provider calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}")]
    Status { status: u16, endpoint: String },

    #[error("{endpoint} not found")]
    NotFound { endpoint: String },

    #[error("rate limited by provider after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("could not decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }
}

/// One OHLCV bar as returned by grouped-daily and aggregate endpoints.
///
/// Every field is optional: records missing a symbol or close are skipped by
/// the jobs rather than rejected at decode time.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawBar {
    #[serde(rename = "T")]
    pub symbol: Option<String>,
    #[serde(rename = "o")]
    pub open: Option<f64>,
    #[serde(rename = "h")]
    pub high: Option<f64>,
    #[serde(rename = "l")]
    pub low: Option<f64>,
    #[serde(rename = "c")]
    pub close: Option<f64>,
    #[serde(rename = "v")]
    pub volume: Option<f64>,
    #[serde(rename = "vw")]
    pub vwap: Option<f64>,
    #[serde(rename = "n")]
    pub transactions: Option<f64>,
    #[serde(rename = "t")]
    pub timestamp_ms: Option<i64>,
}

impl RawBar {
    /// Symbol and close, when both are usable
    pub fn symbol_close(&self) -> Option<(&str, f64)> {
        let symbol = self.symbol.as_deref().filter(|s| !s.is_empty())?;
        let close = self.close.filter(|c| c.is_finite())?;
        Some((symbol, close))
    }

    pub fn open_or_zero(&self) -> f64 {
        self.open.unwrap_or(0.0)
    }

    pub fn high_or_zero(&self) -> f64 {
        self.high.unwrap_or(0.0)
    }

    pub fn low_or_zero(&self) -> f64 {
        self.low.unwrap_or(0.0)
    }

    /// Provider volumes can arrive as floats; truncate to whole shares
    pub fn volume_shares(&self) -> i64 {
        self.volume.map(|v| v as i64).unwrap_or(0)
    }

    pub fn vwap_opt(&self) -> Option<f64> {
        self.vwap.filter(|v| *v != 0.0)
    }

    pub fn transactions_opt(&self) -> Option<i64> {
        self.transactions.filter(|n| *n != 0.0).map(|n| n as i64)
    }
}

/// Entry from the ticker directory listing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TickerListing {
    #[serde(default)]
    pub ticker: String,
    pub name: Option<String>,
    pub market: Option<String>,
    pub primary_exchange: Option<String>,
    #[serde(rename = "type")]
    pub ticker_type: Option<String>,
    pub currency_name: Option<String>,
    pub active: Option<bool>,
}

/// Per-symbol reference details
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TickerDetails {
    #[serde(default)]
    pub ticker: String,
    pub name: Option<String>,
    pub market_cap: Option<f64>,
    pub share_class_shares_outstanding: Option<f64>,
    pub weighted_shares_outstanding: Option<f64>,
    pub total_employees: Option<f64>,
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    pub list_date: Option<String>,
    pub primary_exchange: Option<String>,
    pub cik: Option<String>,
    pub sic_code: Option<String>,
    pub sic_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DividendRecord {
    pub ticker: Option<String>,
    pub cash_amount: Option<f64>,
    pub currency: Option<String>,
    pub declaration_date: Option<String>,
    pub ex_dividend_date: Option<String>,
    pub frequency: Option<i32>,
    pub pay_date: Option<String>,
    pub record_date: Option<String>,
    pub dividend_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SplitRecord {
    pub ticker: Option<String>,
    pub execution_date: Option<String>,
    pub split_from: Option<f64>,
    pub split_to: Option<f64>,
}

/// One page of a cursor-paginated listing. `next_cursor == None` is the last page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn last(results: Vec<T>) -> Self {
        Self {
            results,
            next_cursor: None,
        }
    }
}

/// Capability set of a daily market data provider.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// All symbols' bars for one calendar day. Empty on weekends and holidays.
    async fn grouped_daily(&self, date: NaiveDate) -> Result<Vec<RawBar>, ProviderError>;

    /// Reference details for one symbol; `None` when the provider has no such ticker.
    async fn ticker_details(&self, symbol: &str) -> Result<Option<TickerDetails>, ProviderError>;

    async fn tickers_list(&self, cursor: Option<&str>) -> Result<Page<TickerListing>, ProviderError>;

    /// Daily bars for one symbol over an inclusive date range
    async fn aggregate_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawBar>, ProviderError>;

    async fn dividends(&self, cursor: Option<&str>) -> Result<Page<DividendRecord>, ProviderError>;

    async fn splits(&self, cursor: Option<&str>) -> Result<Page<SplitRecord>, ProviderError>;
}

/// Parse a provider date (`YYYY-MM-DD`, optionally with a time suffix)
pub fn parse_provider_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
