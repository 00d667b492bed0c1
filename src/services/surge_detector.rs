//! Surge detection for one trading day.
//!
//! The previous trading day is resolved by asking the provider for grouped
//! bars on successively earlier weekdays until one returns data. Holidays are
//! not known in advance; an empty response is what identifies them.

use crate::calendar::previous_weekdays;
use crate::error::AppResult;
use crate::market_data::{MarketDataSource, RawBar};
use crate::models::{pct_change, round_pct, NewSurgeEvent};
use crate::store::MarketStore;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of weekdays checked when looking for the previous trading day
pub const MAX_PREV_DAY_LOOKBACK: usize = 7;

/// Closing prices for a resolved trading day
#[derive(Debug, Clone, Default)]
pub struct PreviousCloses {
    pub trade_date: Option<NaiveDate>,
    pub closes: HashMap<String, f64>,
}

pub struct SurgeDetector {
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn MarketStore>,
}

impl SurgeDetector {
    pub fn new(source: Arc<dyn MarketDataSource>, store: Arc<dyn MarketStore>) -> Self {
        Self { source, store }
    }

    /// Closes of the most recent trading day before `target_date`.
    ///
    /// Returns an empty map (and no date) when nothing is found within the lookback bound.
    pub async fn previous_closes(&self, target_date: NaiveDate) -> AppResult<PreviousCloses> {
        for candidate in previous_weekdays(target_date, MAX_PREV_DAY_LOOKBACK) {
            let bars = self.source.grouped_daily(candidate).await?;
            if bars.is_empty() {
                info!("No data for {} (holiday?), trying earlier date", candidate);
                continue;
            }

            let closes: HashMap<String, f64> = bars
                .iter()
                .filter_map(|bar| bar.symbol_close())
                .map(|(symbol, close)| (symbol.to_string(), close))
                .collect();
            info!(
                "Previous trading day for {}: {} ({} tickers)",
                target_date,
                candidate,
                closes.len()
            );
            return Ok(PreviousCloses {
                trade_date: Some(candidate),
                closes,
            });
        }

        warn!(
            "No previous trading day found within {} weekdays before {}",
            MAX_PREV_DAY_LOOKBACK, target_date
        );
        Ok(PreviousCloses::default())
    }

    /// Record surges in `bars` for `target_date`. Returns the number of events created now.
    pub async fn detect(
        &self,
        target_date: NaiveDate,
        bars: &[RawBar],
        threshold: f64,
    ) -> AppResult<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let previous = self.previous_closes(target_date).await?;
        let mut created = 0;

        for bar in bars {
            let Some((symbol, close)) = bar.symbol_close() else {
                continue;
            };
            let prev_close = match previous.closes.get(symbol) {
                Some(prev) if *prev > 0.0 => *prev,
                _ => continue,
            };

            let change_pct = pct_change(close, prev_close);
            if change_pct < threshold {
                continue;
            }

            if self.store.surge_event_exists(symbol, target_date).await? {
                debug!("Surge {} on {} already recorded", symbol, target_date);
                continue;
            }

            if self.store.ensure_ticker(symbol).await? {
                debug!("Created stub ticker {}", symbol);
            }

            let event = NewSurgeEvent {
                symbol: symbol.to_string(),
                event_date: target_date,
                open: bar.open_or_zero(),
                high: bar.high_or_zero(),
                low: bar.low_or_zero(),
                close,
                volume: bar.volume_shares(),
                prev_close,
                change_pct: round_pct(change_pct),
                vwap: bar.vwap_opt(),
            };

            if self.store.insert_surge_event(&event).await?.is_some() {
                created += 1;
            }
        }

        info!(
            "Surge detection for {}: {} new events (threshold {}%)",
            target_date, created, threshold
        );
        Ok(created)
    }

    /// Fetch `target_date` from the provider and detect surges on it
    pub async fn collect_day(&self, target_date: NaiveDate, threshold: f64) -> AppResult<usize> {
        let bars = self.source.grouped_daily(target_date).await?;
        if bars.is_empty() {
            info!("No results for {}", target_date);
            return Ok(0);
        }
        self.detect(target_date, &bars, threshold).await
    }
}
