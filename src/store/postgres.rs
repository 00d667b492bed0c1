use super::MarketStore;
use crate::error::AppResult;
use crate::models::{
    CollectionLog, JobStatus, JobType, NewDailyPrice, NewDividend, NewStockSplit, NewSurgeEvent,
    NewSurgeTracking, SurgeEvent, SurgeTracking, TickerDetailsUpdate, TickerUpsert, UserSetting,
};
use crate::repositories::{
    CollectionLogRepository, CorporateActionRepository, DailyPriceRepository, SettingRepository,
    SurgeRepository, TickerRepository,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use std::collections::BTreeSet;

/// `MarketStore` over the Postgres repositories
pub struct PgMarketStore {
    logs: CollectionLogRepository,
    settings: SettingRepository,
    tickers: TickerRepository,
    prices: DailyPriceRepository,
    surges: SurgeRepository,
    corporate_actions: CorporateActionRepository,
}

impl PgMarketStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            logs: CollectionLogRepository::new(pool.clone()),
            settings: SettingRepository::new(pool.clone()),
            tickers: TickerRepository::new(pool.clone()),
            prices: DailyPriceRepository::new(pool.clone()),
            surges: SurgeRepository::new(pool.clone()),
            corporate_actions: CorporateActionRepository::new(pool),
        }
    }
}

#[async_trait]
impl MarketStore for PgMarketStore {
    async fn start_job(&self, job_type: JobType) -> AppResult<CollectionLog> {
        Ok(self.logs.create(job_type).await?)
    }

    async fn complete_job(&self, id: i64, records_count: i64) -> AppResult<CollectionLog> {
        Ok(self
            .logs
            .finish(id, JobStatus::Completed, records_count, None)
            .await?)
    }

    async fn fail_job(&self, id: i64, error_message: &str) -> AppResult<CollectionLog> {
        Ok(self
            .logs
            .finish(id, JobStatus::Failed, 0, Some(error_message))
            .await?)
    }

    async fn find_running_job(&self, job_type: JobType) -> AppResult<Option<CollectionLog>> {
        Ok(self.logs.find_running(job_type).await?)
    }

    async fn latest_job(&self) -> AppResult<Option<CollectionLog>> {
        Ok(self.logs.find_latest().await?)
    }

    async fn get_job(&self, id: i64) -> AppResult<Option<CollectionLog>> {
        Ok(self.logs.find_by_id(id).await?)
    }

    async fn get_setting(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.settings.get(key).await?.map(|s| s.value))
    }

    async fn put_setting(&self, key: &str, value: &str) -> AppResult<UserSetting> {
        Ok(self.settings.upsert(key, value).await?)
    }

    async fn all_settings(&self) -> AppResult<Vec<UserSetting>> {
        Ok(self.settings.all().await?)
    }

    async fn ensure_ticker(&self, symbol: &str) -> AppResult<bool> {
        Ok(self.tickers.ensure_exists(symbol).await?)
    }

    async fn upsert_tickers(&self, tickers: &[TickerUpsert]) -> AppResult<u64> {
        Ok(self.tickers.upsert_batch(tickers).await?)
    }

    async fn tickers_missing_details(&self, limit: Option<usize>) -> AppResult<Vec<String>> {
        let limit = limit.map(|l| l as i64);
        Ok(self.tickers.symbols_missing_details(limit).await?)
    }

    async fn apply_ticker_details(&self, updates: &[TickerDetailsUpdate]) -> AppResult<u64> {
        Ok(self.tickers.apply_details_batch(updates).await?)
    }

    async fn mark_details_attempted(&self, symbols: &[String]) -> AppResult<u64> {
        Ok(self.tickers.mark_details_attempted(symbols).await?)
    }

    async fn count_tickers(&self) -> AppResult<i64> {
        Ok(self.tickers.count().await?)
    }

    async fn existing_price_dates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<BTreeSet<NaiveDate>> {
        let dates = self.prices.existing_dates(from, to).await?;
        Ok(dates.into_iter().collect())
    }

    async fn insert_daily_prices(&self, prices: &[NewDailyPrice]) -> AppResult<u64> {
        Ok(self.prices.upsert_batch(prices).await?)
    }

    async fn surge_event_exists(&self, symbol: &str, event_date: NaiveDate) -> AppResult<bool> {
        Ok(self.surges.event_exists(symbol, event_date).await?)
    }

    async fn insert_surge_event(&self, event: &NewSurgeEvent) -> AppResult<Option<SurgeEvent>> {
        Ok(self.surges.insert_event(event).await?)
    }

    async fn surge_events_on(&self, event_date: NaiveDate) -> AppResult<Vec<SurgeEvent>> {
        Ok(self.surges.find_events_on(event_date).await?)
    }

    async fn count_surge_events(&self) -> AppResult<i64> {
        Ok(self.surges.count_events().await?)
    }

    async fn tracking_exists(&self, surge_event_id: i64, days_after: i32) -> AppResult<bool> {
        Ok(self.surges.tracking_exists(surge_event_id, days_after).await?)
    }

    async fn insert_tracking(
        &self,
        tracking: &NewSurgeTracking,
    ) -> AppResult<Option<SurgeTracking>> {
        Ok(self.surges.insert_tracking(tracking).await?)
    }

    async fn insert_dividends(&self, dividends: &[NewDividend]) -> AppResult<u64> {
        Ok(self.corporate_actions.insert_dividends(dividends).await?)
    }

    async fn insert_splits(&self, splits: &[NewStockSplit]) -> AppResult<u64> {
        Ok(self.corporate_actions.insert_splits(splits).await?)
    }
}
