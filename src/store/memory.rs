use super::MarketStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    CollectionLog, JobStatus, JobType, NewDailyPrice, NewDividend, NewStockSplit, NewSurgeEvent,
    NewSurgeTracking, SurgeEvent, SurgeTracking, Ticker, TickerDetailsUpdate, TickerUpsert,
    UserSetting,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    logs: Vec<CollectionLog>,
    settings: BTreeMap<String, UserSetting>,
    tickers: BTreeMap<String, Ticker>,
    prices: BTreeMap<(String, NaiveDate), NewDailyPrice>,
    surge_events: Vec<SurgeEvent>,
    tracking: Vec<SurgeTracking>,
    dividends: Vec<NewDividend>,
    splits: BTreeMap<(String, NaiveDate), NewStockSplit>,
    price_batches: usize,
    detail_batches: usize,
}

impl MemoryState {
    fn finish_job(
        &mut self,
        id: i64,
        status: JobStatus,
        records_count: i64,
        error_message: Option<&str>,
    ) -> AppResult<CollectionLog> {
        let log = self
            .logs
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| AppError::NotFound(format!("ledger row {}", id)))?;

        if !log.is_running() {
            return Err(AppError::Validation(format!("ledger row {} is not running", id)));
        }

        log.status = status.as_str().to_string();
        log.records_count = records_count;
        log.error_message = error_message.map(str::to_string);
        log.completed_at = Some(Utc::now());
        Ok(log.clone())
    }
}

/// In-process `MarketStore`.
///
/// Besides the trait, exposes inspection helpers so job tests can assert on
/// stored rows and on how many batch commits happened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a ledger row as-is, keeping its id in sequence
    pub async fn seed_log(&self, mut log: CollectionLog) -> CollectionLog {
        let mut state = self.state.lock().await;
        log.id = state.logs.len() as i64 + 1;
        state.logs.push(log.clone());
        log
    }

    pub async fn logs(&self) -> Vec<CollectionLog> {
        self.state.lock().await.logs.clone()
    }

    pub async fn ticker(&self, symbol: &str) -> Option<Ticker> {
        self.state.lock().await.tickers.get(symbol).cloned()
    }

    pub async fn prices(&self) -> Vec<NewDailyPrice> {
        self.state.lock().await.prices.values().cloned().collect()
    }

    /// Number of `insert_daily_prices` calls that carried rows
    pub async fn price_batches(&self) -> usize {
        self.state.lock().await.price_batches
    }

    /// Number of `apply_ticker_details` calls that carried rows
    pub async fn detail_batches(&self) -> usize {
        self.state.lock().await.detail_batches
    }

    pub async fn surge_events(&self) -> Vec<SurgeEvent> {
        self.state.lock().await.surge_events.clone()
    }

    pub async fn tracking(&self) -> Vec<SurgeTracking> {
        self.state.lock().await.tracking.clone()
    }

    pub async fn dividends(&self) -> Vec<NewDividend> {
        self.state.lock().await.dividends.clone()
    }

    pub async fn splits(&self) -> Vec<NewStockSplit> {
        self.state.lock().await.splits.values().cloned().collect()
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn start_job(&self, job_type: JobType) -> AppResult<CollectionLog> {
        let mut state = self.state.lock().await;
        let log = CollectionLog {
            id: state.logs.len() as i64 + 1,
            job_type: job_type.as_str().to_string(),
            started_at: Utc::now(),
            completed_at: None,
            status: JobStatus::Running.as_str().to_string(),
            records_count: 0,
            error_message: None,
        };
        state.logs.push(log.clone());
        Ok(log)
    }

    async fn complete_job(&self, id: i64, records_count: i64) -> AppResult<CollectionLog> {
        self.state
            .lock()
            .await
            .finish_job(id, JobStatus::Completed, records_count, None)
    }

    async fn fail_job(&self, id: i64, error_message: &str) -> AppResult<CollectionLog> {
        self.state
            .lock()
            .await
            .finish_job(id, JobStatus::Failed, 0, Some(error_message))
    }

    async fn find_running_job(&self, job_type: JobType) -> AppResult<Option<CollectionLog>> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .rev()
            .find(|l| l.job_type == job_type.as_str() && l.is_running())
            .cloned())
    }

    async fn latest_job(&self) -> AppResult<Option<CollectionLog>> {
        Ok(self.state.lock().await.logs.last().cloned())
    }

    async fn get_job(&self, id: i64) -> AppResult<Option<CollectionLog>> {
        let state = self.state.lock().await;
        Ok(state.logs.iter().find(|l| l.id == id).cloned())
    }

    async fn get_setting(&self, key: &str) -> AppResult<Option<String>> {
        let state = self.state.lock().await;
        Ok(state.settings.get(key).map(|s| s.value.clone()))
    }

    async fn put_setting(&self, key: &str, value: &str) -> AppResult<UserSetting> {
        if key.trim().is_empty() {
            return Err(AppError::Validation("setting key must not be empty".into()));
        }
        let setting = UserSetting {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: Utc::now(),
        };
        self.state
            .lock()
            .await
            .settings
            .insert(key.to_string(), setting.clone());
        Ok(setting)
    }

    async fn all_settings(&self) -> AppResult<Vec<UserSetting>> {
        Ok(self.state.lock().await.settings.values().cloned().collect())
    }

    async fn ensure_ticker(&self, symbol: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state.tickers.contains_key(symbol) {
            return Ok(false);
        }
        state.tickers.insert(symbol.to_string(), Ticker::stub(symbol));
        Ok(true)
    }

    async fn upsert_tickers(&self, tickers: &[TickerUpsert]) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        for upsert in tickers {
            let ticker = state
                .tickers
                .entry(upsert.symbol.clone())
                .or_insert_with(|| Ticker::stub(&upsert.symbol));
            ticker.name = upsert.name.clone();
            ticker.market = upsert.market.clone();
            ticker.exchange = upsert.exchange.clone();
            ticker.ticker_type = upsert.ticker_type.clone();
            ticker.currency = upsert.currency.clone();
            ticker.active = upsert.active;
            ticker.updated_at = Utc::now();
        }
        Ok(tickers.len() as u64)
    }

    async fn tickers_missing_details(&self, limit: Option<usize>) -> AppResult<Vec<String>> {
        let state = self.state.lock().await;
        let mut pending: Vec<&Ticker> =
            state.tickers.values().filter(|t| t.needs_details()).collect();
        // None sorts before Some, matching NULLS FIRST
        pending.sort_by(|a, b| {
            (a.details_attempted_at, &a.symbol).cmp(&(b.details_attempted_at, &b.symbol))
        });
        let pending = pending.into_iter().map(|t| t.symbol.clone());
        Ok(match limit {
            Some(limit) => pending.take(limit).collect(),
            None => pending.collect(),
        })
    }

    async fn apply_ticker_details(&self, updates: &[TickerDetailsUpdate]) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        if !updates.is_empty() {
            state.detail_batches += 1;
        }

        let mut affected = 0;
        for update in updates {
            let Some(ticker) = state.tickers.get_mut(&update.symbol) else {
                continue;
            };
            if update.name.is_some() {
                ticker.name = update.name.clone();
            }
            ticker.market_cap = update.market_cap;
            ticker.shares_outstanding = update.shares_outstanding;
            ticker.weighted_shares_outstanding = update.weighted_shares_outstanding;
            ticker.total_employees = update.total_employees;
            ticker.description = update.description.clone();
            ticker.homepage_url = update.homepage_url.clone();
            ticker.list_date = update.list_date;
            ticker.primary_exchange = update.primary_exchange.clone();
            ticker.cik = update.cik.clone();
            ticker.sic_code = update.sic_code.clone();
            ticker.sic_description = update.sic_description.clone();
            ticker.details_updated_at = Some(Utc::now());
            ticker.details_attempted_at = ticker.details_updated_at;
            ticker.updated_at = Utc::now();
            affected += 1;
        }
        Ok(affected)
    }

    async fn mark_details_attempted(&self, symbols: &[String]) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut affected = 0;
        for symbol in symbols {
            if let Some(ticker) = state.tickers.get_mut(symbol).filter(|t| t.needs_details()) {
                ticker.details_attempted_at = Some(now);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn count_tickers(&self) -> AppResult<i64> {
        Ok(self.state.lock().await.tickers.len() as i64)
    }

    async fn existing_price_dates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<BTreeSet<NaiveDate>> {
        let state = self.state.lock().await;
        Ok(state
            .prices
            .keys()
            .map(|(_, date)| *date)
            .filter(|date| *date >= from && *date <= to)
            .collect())
    }

    async fn insert_daily_prices(&self, prices: &[NewDailyPrice]) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        if !prices.is_empty() {
            state.price_batches += 1;
        }
        for price in prices {
            state
                .prices
                .insert((price.symbol.clone(), price.trade_date), price.clone());
        }
        Ok(prices.len() as u64)
    }

    async fn surge_event_exists(&self, symbol: &str, event_date: NaiveDate) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .surge_events
            .iter()
            .any(|e| e.symbol == symbol && e.event_date == event_date))
    }

    async fn insert_surge_event(&self, event: &NewSurgeEvent) -> AppResult<Option<SurgeEvent>> {
        let mut state = self.state.lock().await;
        if state
            .surge_events
            .iter()
            .any(|e| e.symbol == event.symbol && e.event_date == event.event_date)
        {
            return Ok(None);
        }
        if !state.tickers.contains_key(&event.symbol) {
            return Err(AppError::Validation(format!(
                "surge event references unknown ticker {}",
                event.symbol
            )));
        }

        let stored = SurgeEvent {
            id: state.surge_events.len() as i64 + 1,
            symbol: event.symbol.clone(),
            event_date: event.event_date,
            open: event.open,
            high: event.high,
            low: event.low,
            close: event.close,
            volume: event.volume,
            prev_close: event.prev_close,
            change_pct: event.change_pct,
            vwap: event.vwap,
            created_at: Utc::now(),
        };
        state.surge_events.push(stored.clone());
        Ok(Some(stored))
    }

    async fn surge_events_on(&self, event_date: NaiveDate) -> AppResult<Vec<SurgeEvent>> {
        let state = self.state.lock().await;
        Ok(state
            .surge_events
            .iter()
            .filter(|e| e.event_date == event_date)
            .cloned()
            .collect())
    }

    async fn count_surge_events(&self) -> AppResult<i64> {
        Ok(self.state.lock().await.surge_events.len() as i64)
    }

    async fn tracking_exists(&self, surge_event_id: i64, days_after: i32) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .tracking
            .iter()
            .any(|t| t.surge_event_id == surge_event_id && t.days_after == days_after))
    }

    async fn insert_tracking(
        &self,
        tracking: &NewSurgeTracking,
    ) -> AppResult<Option<SurgeTracking>> {
        let mut state = self.state.lock().await;
        if state.tracking.iter().any(|t| {
            t.surge_event_id == tracking.surge_event_id && t.days_after == tracking.days_after
        }) {
            return Ok(None);
        }

        let stored = SurgeTracking {
            id: state.tracking.len() as i64 + 1,
            surge_event_id: tracking.surge_event_id,
            days_after: tracking.days_after,
            close_price: tracking.close_price,
            change_from_surge_pct: tracking.change_from_surge_pct,
            tracked_date: tracking.tracked_date,
            created_at: Utc::now(),
        };
        state.tracking.push(stored.clone());
        Ok(Some(stored))
    }

    async fn insert_dividends(&self, dividends: &[NewDividend]) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        state.dividends.extend_from_slice(dividends);
        Ok(dividends.len() as u64)
    }

    async fn insert_splits(&self, splits: &[NewStockSplit]) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let mut inserted = 0;
        for split in splits {
            if !state.splits.contains_key(&split.key()) {
                state.splits.insert(split.key(), split.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
