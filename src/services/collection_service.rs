//! Collection orchestrator.
//!
//! Every entry point runs under a `JobLedger` row and can be re-run safely:
//! - surge detection is guarded by the (symbol, event_date) uniqueness
//! - bulk download skips dates already present in `daily_prices`
//! - ticker sync and enrichment upsert, and enrichment only selects tickers
//!   that were never enriched
//! - splits are unique per (symbol, execution_date)
//!
//! Dividends have no stored uniqueness; re-running that job appends duplicates.
//!
//! Provider calls are issued one at a time. The shared limiter inside the
//! gateway is the only throttle.

use crate::calendar::weekdays_between;
use crate::config::CollectionConfig;
use crate::error::{AppError, AppResult};
use crate::market_data::{
    parse_provider_date, DividendRecord, MarketDataSource, RawBar, SplitRecord, TickerDetails,
    TickerListing,
};
use crate::models::{
    JobType, NewDailyPrice, NewDividend, NewStockSplit, TickerDetailsUpdate, TickerUpsert,
};
use crate::services::job_ledger::{JobLedger, JobOutcome};
use crate::services::settings_service::SettingsService;
use crate::services::surge_detector::SurgeDetector;
use crate::services::tracking_service::PostSurgeTracker;
use crate::store::MarketStore;
use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

pub struct CollectionService {
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn MarketStore>,
    ledger: JobLedger,
    settings: Arc<SettingsService>,
    detector: SurgeDetector,
    tracker: PostSurgeTracker,
    config: CollectionConfig,
}

impl CollectionService {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        store: Arc<dyn MarketStore>,
        settings: Arc<SettingsService>,
        config: CollectionConfig,
    ) -> Self {
        Self {
            ledger: JobLedger::new(
                store.clone(),
                chrono::Duration::minutes(config.job_stale_after_minutes),
            ),
            detector: SurgeDetector::new(source.clone(), store.clone()),
            tracker: PostSurgeTracker::new(source.clone(), store.clone()),
            source,
            store,
            settings,
            config,
        }
    }

    // =========================================================================
    // Daily collection and backfill
    // =========================================================================

    /// Detect surges for `target_date` (default: today in UTC), then update tracking.
    ///
    /// Records count is the number of surge events created.
    pub async fn run_daily_collection(&self, target_date: Option<NaiveDate>) -> AppResult<JobOutcome> {
        let target_date = target_date.unwrap_or_else(|| Utc::now().date_naive());

        self.ledger
            .run(JobType::DailyCollection, || async move {
                let threshold = self.settings.threshold().await?;

                let bars = self.source.grouped_daily(target_date).await?;
                if bars.is_empty() {
                    // Tracking is skipped on purpose: no aggregate bars exist for a closed day
                    info!("No results for {} (market closed)", target_date);
                    return Ok(0);
                }

                let surges = self.detector.detect(target_date, &bars, threshold).await?;
                self.tracker.track(target_date).await?;

                info!(
                    "Daily collection completed for {}: {} surges found",
                    target_date, surges
                );
                Ok(surges as i64)
            })
            .await
    }

    /// Detect surges for every weekday in `[from, to]` under one ledger row
    pub async fn run_backfill(&self, from: NaiveDate, to: NaiveDate) -> AppResult<JobOutcome> {
        validate_range(from, to)?;

        self.ledger
            .run(JobType::Backfill, || async move {
                let threshold = self.settings.threshold().await?;
                let mut total_surges = 0i64;

                for day in weekdays_between(from, to) {
                    let count = self.detector.collect_day(day, threshold).await?;
                    total_surges += count as i64;
                    info!("Backfill {}: {} surges (total: {})", day, count, total_surges);
                }

                info!(
                    "Backfill completed ({} to {}): {} total surges",
                    from, to, total_surges
                );
                Ok(total_surges)
            })
            .await
    }

    // =========================================================================
    // Bulk download
    // =========================================================================

    /// Store grouped-daily bars for every weekday in `[from, to]` not already stored.
    ///
    /// Rows are committed every `bulk_commit_days` downloaded days.
    pub async fn run_bulk_download(&self, from: NaiveDate, to: NaiveDate) -> AppResult<JobOutcome> {
        validate_range(from, to)?;

        self.ledger
            .run(JobType::BulkDownload, || async move {
                let existing = self.store.existing_price_dates(from, to).await?;
                if !existing.is_empty() {
                    info!("{} dates in range already downloaded", existing.len());
                }

                let commit_days = self.config.bulk_commit_days.max(1);
                let mut pending: Vec<NewDailyPrice> = Vec::new();
                let mut total_records = 0i64;
                let mut days_processed = 0usize;

                for day in weekdays_between(from, to) {
                    if existing.contains(&day) {
                        info!("Skipping {} (already downloaded)", day);
                        continue;
                    }

                    let bars = self.source.grouped_daily(day).await?;
                    if bars.is_empty() {
                        info!("No data for {} (holiday?)", day);
                        continue;
                    }

                    let rows = daily_prices_from_bars(day, &bars);
                    total_records += rows.len() as i64;
                    days_processed += 1;
                    info!(
                        "Bulk download {}: {} records (total: {})",
                        day,
                        rows.len(),
                        total_records
                    );
                    pending.extend(rows);

                    if days_processed % commit_days == 0 {
                        self.store.insert_daily_prices(&pending).await?;
                        pending.clear();
                        info!(
                            "Committed batch ({} days, {} records so far)",
                            days_processed, total_records
                        );
                    }
                }

                if !pending.is_empty() {
                    self.store.insert_daily_prices(&pending).await?;
                    info!("Committed final batch ({} records)", pending.len());
                }

                info!(
                    "Bulk download completed ({} to {}): {} days, {} total records",
                    from, to, days_processed, total_records
                );
                Ok(total_records)
            })
            .await
    }

    // =========================================================================
    // Ticker directory
    // =========================================================================

    /// Page through the ticker directory, upserting each page
    pub async fn run_ticker_sync(&self) -> AppResult<JobOutcome> {
        self.ledger
            .run(JobType::TickerSync, || async move {
                let max_pages = self.config.ticker_sync_max_pages;
                let mut cursor: Option<String> = None;
                let mut pages = 0usize;
                let mut total = 0i64;

                while pages < max_pages {
                    let page = self.source.tickers_list(cursor.as_deref()).await?;
                    pages += 1;

                    let rows = ticker_upserts(&page.results);
                    self.store.upsert_tickers(&rows).await?;
                    total += rows.len() as i64;
                    info!("Ticker sync page {}: {} tickers (total: {})", pages, rows.len(), total);

                    cursor = match page.next_cursor {
                        Some(next) if !rows.is_empty() => Some(next),
                        _ => None,
                    };
                    if cursor.is_none() {
                        break;
                    }
                }

                if cursor.is_some() {
                    warn!("Ticker sync stopped at the {} page limit", max_pages);
                }

                info!("Ticker sync completed: {} tickers synced", total);
                Ok(total)
            })
            .await
    }

    /// Fetch details for tickers never enriched. One symbol failing does not stop the run.
    pub async fn run_ticker_enrichment(&self) -> AppResult<JobOutcome> {
        self.ledger
            .run(JobType::TickerEnrichment, || async move {
                let symbols = self
                    .store
                    .tickers_missing_details(self.config.enrichment_max_symbols)
                    .await?;
                info!("Enriching {} tickers", symbols.len());

                let commit_size = self.config.enrichment_commit_size.max(1);
                let mut pending: Vec<TickerDetailsUpdate> = Vec::new();
                let mut missed: Vec<String> = Vec::new();
                let mut enriched = 0i64;
                let mut skipped = 0usize;

                for (index, symbol) in symbols.iter().enumerate() {
                    match self.source.ticker_details(symbol).await {
                        Ok(Some(details)) => pending.push(details_update(symbol, details)),
                        Ok(None) => {
                            info!("No details for {}", symbol);
                            missed.push(symbol.clone());
                        }
                        Err(e) => {
                            warn!("Failed to fetch details for {}: {}", symbol, e);
                            missed.push(symbol.clone());
                        }
                    }

                    if (index + 1) % commit_size == 0 {
                        enriched += self
                            .commit_enrichment(&mut pending, &mut missed, &mut skipped)
                            .await?;
                        info!(
                            "Committed enrichment batch ({}/{} processed)",
                            index + 1,
                            symbols.len()
                        );
                    }
                }

                enriched += self
                    .commit_enrichment(&mut pending, &mut missed, &mut skipped)
                    .await?;

                info!("Ticker enrichment completed: {} enriched, {} skipped", enriched, skipped);
                Ok(enriched)
            })
            .await
    }

    /// Write fetched details and push missed symbols to the back of the queue
    async fn commit_enrichment(
        &self,
        pending: &mut Vec<TickerDetailsUpdate>,
        missed: &mut Vec<String>,
        skipped: &mut usize,
    ) -> AppResult<i64> {
        let mut enriched = 0;
        if !pending.is_empty() {
            enriched = self.store.apply_ticker_details(pending).await? as i64;
            pending.clear();
        }
        if !missed.is_empty() {
            self.store.mark_details_attempted(missed).await?;
            *skipped += missed.len();
            missed.clear();
        }
        Ok(enriched)
    }

    // =========================================================================
    // Corporate actions
    // =========================================================================

    /// Page through dividends, committing each page
    pub async fn run_dividend_download(&self) -> AppResult<JobOutcome> {
        self.ledger
            .run(JobType::DividendDownload, || async move {
                let max_pages = self.config.corporate_actions_max_pages;
                let mut cursor: Option<String> = None;
                let mut pages = 0usize;
                let mut total = 0i64;

                while pages < max_pages {
                    let page = self.source.dividends(cursor.as_deref()).await?;
                    pages += 1;
                    if page.results.is_empty() {
                        break;
                    }

                    let rows = dividends_from_records(&page.results);
                    let inserted = self.store.insert_dividends(&rows).await?;
                    total += inserted as i64;
                    info!(
                        "Dividends page {}: {} of {} records stored (total: {})",
                        pages,
                        inserted,
                        page.results.len(),
                        total
                    );

                    cursor = page.next_cursor;
                    if cursor.is_none() {
                        break;
                    }
                }

                if cursor.is_some() {
                    warn!("Dividend download stopped at the {} page limit", max_pages);
                }
                Ok(total)
            })
            .await
    }

    /// Page through splits, committing each page
    pub async fn run_split_download(&self) -> AppResult<JobOutcome> {
        self.ledger
            .run(JobType::SplitDownload, || async move {
                let max_pages = self.config.corporate_actions_max_pages;
                let mut cursor: Option<String> = None;
                let mut pages = 0usize;
                let mut total = 0i64;

                while pages < max_pages {
                    let page = self.source.splits(cursor.as_deref()).await?;
                    pages += 1;
                    if page.results.is_empty() {
                        break;
                    }

                    let rows = splits_from_records(&page.results);
                    let inserted = self.store.insert_splits(&rows).await?;
                    total += inserted as i64;
                    info!(
                        "Splits page {}: {} new of {} records (total: {})",
                        pages,
                        inserted,
                        page.results.len(),
                        total
                    );

                    cursor = page.next_cursor;
                    if cursor.is_none() {
                        break;
                    }
                }

                if cursor.is_some() {
                    warn!("Split download stopped at the {} page limit", max_pages);
                }
                Ok(total)
            })
            .await
    }
}

fn validate_range(from: NaiveDate, to: NaiveDate) -> AppResult<()> {
    if from > to {
        return Err(AppError::Validation(format!(
            "from date {} is after to date {}",
            from, to
        )));
    }
    Ok(())
}

/// One row per symbol for `day`, skipping bars without a symbol or close
fn daily_prices_from_bars(day: NaiveDate, bars: &[RawBar]) -> Vec<NewDailyPrice> {
    let mut by_symbol: HashMap<&str, NewDailyPrice> = HashMap::with_capacity(bars.len());
    for bar in bars {
        let Some((symbol, close)) = bar.symbol_close() else {
            continue;
        };
        by_symbol.insert(
            symbol,
            NewDailyPrice {
                symbol: symbol.to_string(),
                trade_date: day,
                open: bar.open_or_zero(),
                high: bar.high_or_zero(),
                low: bar.low_or_zero(),
                close,
                volume: bar.volume_shares(),
                vwap: bar.vwap_opt(),
                transactions: bar.transactions_opt(),
            },
        );
    }

    let mut rows: Vec<NewDailyPrice> = by_symbol.into_values().collect();
    rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    rows
}

fn ticker_upserts(listings: &[TickerListing]) -> Vec<TickerUpsert> {
    let mut seen = HashSet::new();
    listings
        .iter()
        .filter(|listing| !listing.ticker.is_empty())
        .filter(|listing| seen.insert(listing.ticker.clone()))
        .map(|listing| TickerUpsert {
            symbol: listing.ticker.clone(),
            name: listing.name.clone(),
            market: listing.market.clone(),
            exchange: listing.primary_exchange.clone(),
            ticker_type: listing.ticker_type.clone(),
            currency: listing.currency_name.clone(),
            active: listing.active.unwrap_or(true),
        })
        .collect()
}

fn details_update(symbol: &str, details: TickerDetails) -> TickerDetailsUpdate {
    TickerDetailsUpdate {
        symbol: symbol.to_string(),
        name: details.name,
        market_cap: details.market_cap,
        shares_outstanding: details.share_class_shares_outstanding.map(|v| v as i64),
        weighted_shares_outstanding: details.weighted_shares_outstanding.map(|v| v as i64),
        total_employees: details.total_employees.map(|v| v as i64),
        description: details.description,
        homepage_url: details.homepage_url,
        list_date: parse_provider_date(details.list_date.as_deref()),
        primary_exchange: details.primary_exchange,
        cik: details.cik,
        sic_code: details.sic_code,
        sic_description: details.sic_description,
    }
}

/// Usable dividends from one page, de-duplicated on (symbol, ex-date, amount)
fn dividends_from_records(records: &[DividendRecord]) -> Vec<NewDividend> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|record| {
            let symbol = record.ticker.as_deref().filter(|s| !s.is_empty())?;
            let cash_amount = record.cash_amount.filter(|a| a.is_finite())?;
            let ex_dividend_date = parse_provider_date(record.ex_dividend_date.as_deref())?;
            Some(NewDividend {
                symbol: symbol.to_string(),
                cash_amount,
                currency: record.currency.clone(),
                declaration_date: parse_provider_date(record.declaration_date.as_deref()),
                ex_dividend_date,
                frequency: record.frequency,
                pay_date: parse_provider_date(record.pay_date.as_deref()),
                record_date: parse_provider_date(record.record_date.as_deref()),
                dividend_type: record.dividend_type.clone(),
            })
        })
        .filter(|d| seen.insert((d.symbol.clone(), d.ex_dividend_date, d.cash_amount.to_bits())))
        .collect()
}

/// Usable splits from one page, de-duplicated on (symbol, execution date)
fn splits_from_records(records: &[SplitRecord]) -> Vec<NewStockSplit> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|record| {
            let symbol = record.ticker.as_deref().filter(|s| !s.is_empty())?;
            let execution_date = parse_provider_date(record.execution_date.as_deref())?;
            let split_from = record.split_from.filter(|v| v.is_finite() && *v > 0.0)?;
            let split_to = record.split_to.filter(|v| v.is_finite() && *v > 0.0)?;
            Some(NewStockSplit {
                symbol: symbol.to_string(),
                execution_date,
                split_from,
                split_to,
            })
        })
        .filter(|split| seen.insert(split.key()))
        .collect()
}
