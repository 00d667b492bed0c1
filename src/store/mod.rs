//! Persistence seam used by the collection jobs.
//!
//! `PgMarketStore` is backed by the Postgres repositories. `MemoryStore` keeps
//! everything in process and is what the job tests run against.
//!
//! Every batch method commits its whole slice atomically or not at all.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgMarketStore;

use crate::error::AppResult;
use crate::models::{
    CollectionLog, JobType, NewDailyPrice, NewDividend, NewStockSplit, NewSurgeEvent,
    NewSurgeTracking, SurgeEvent, SurgeTracking, TickerDetailsUpdate, TickerUpsert, UserSetting,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeSet;

#[async_trait]
pub trait MarketStore: Send + Sync {
    // Job ledger

    async fn start_job(&self, job_type: JobType) -> AppResult<CollectionLog>;

    /// Close a running row as completed. Fails if the row is not running.
    async fn complete_job(&self, id: i64, records_count: i64) -> AppResult<CollectionLog>;

    /// Close a running row as failed. Fails if the row is not running.
    async fn fail_job(&self, id: i64, error_message: &str) -> AppResult<CollectionLog>;

    async fn find_running_job(&self, job_type: JobType) -> AppResult<Option<CollectionLog>>;

    async fn latest_job(&self) -> AppResult<Option<CollectionLog>>;

    async fn get_job(&self, id: i64) -> AppResult<Option<CollectionLog>>;

    // Settings

    async fn get_setting(&self, key: &str) -> AppResult<Option<String>>;

    async fn put_setting(&self, key: &str, value: &str) -> AppResult<UserSetting>;

    async fn all_settings(&self) -> AppResult<Vec<UserSetting>>;

    // Tickers

    /// Create a bare ticker row if missing. Returns true when one was created.
    async fn ensure_ticker(&self, symbol: &str) -> AppResult<bool>;

    async fn upsert_tickers(&self, tickers: &[TickerUpsert]) -> AppResult<u64>;

    /// Symbols whose details were never fetched. Never-attempted symbols first,
    /// then oldest attempt first, ties by symbol.
    async fn tickers_missing_details(&self, limit: Option<usize>) -> AppResult<Vec<String>>;

    async fn apply_ticker_details(&self, updates: &[TickerDetailsUpdate]) -> AppResult<u64>;

    /// Record that enrichment tried `symbols` and got nothing back
    async fn mark_details_attempted(&self, symbols: &[String]) -> AppResult<u64>;

    async fn count_tickers(&self) -> AppResult<i64>;

    // Daily prices

    async fn existing_price_dates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<BTreeSet<NaiveDate>>;

    async fn insert_daily_prices(&self, prices: &[NewDailyPrice]) -> AppResult<u64>;

    // Surges

    async fn surge_event_exists(&self, symbol: &str, event_date: NaiveDate) -> AppResult<bool>;

    /// Returns `None` when (symbol, event_date) already exists
    async fn insert_surge_event(&self, event: &NewSurgeEvent) -> AppResult<Option<SurgeEvent>>;

    async fn surge_events_on(&self, event_date: NaiveDate) -> AppResult<Vec<SurgeEvent>>;

    async fn count_surge_events(&self) -> AppResult<i64>;

    async fn tracking_exists(&self, surge_event_id: i64, days_after: i32) -> AppResult<bool>;

    /// Returns `None` when (surge_event_id, days_after) already exists
    async fn insert_tracking(
        &self,
        tracking: &NewSurgeTracking,
    ) -> AppResult<Option<SurgeTracking>>;

    // Corporate actions

    async fn insert_dividends(&self, dividends: &[NewDividend]) -> AppResult<u64>;

    /// Skips (symbol, execution_date) pairs already stored
    async fn insert_splits(&self, splits: &[NewStockSplit]) -> AppResult<u64>;
}
