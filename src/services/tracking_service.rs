use crate::error::AppResult;
use crate::market_data::MarketDataSource;
use crate::models::{pct_change, round_pct, NewSurgeTracking, SurgeEvent, TRACKING_OFFSETS};
use crate::store::MarketStore;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info};

/// Records how past surges performed 1, 3, 7 and 30 days later
pub struct PostSurgeTracker {
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn MarketStore>,
}

impl PostSurgeTracker {
    pub fn new(source: Arc<dyn MarketDataSource>, store: Arc<dyn MarketStore>) -> Self {
        Self { source, store }
    }

    /// Create the snapshots that fall due on `target_date`. Returns the number created.
    ///
    /// Events with no bar on `target_date` are left untracked so a later run can retry.
    pub async fn track(&self, target_date: NaiveDate) -> AppResult<usize> {
        let mut created = 0;

        for days_after in TRACKING_OFFSETS {
            let check_date = target_date - Duration::days(days_after as i64);
            let events = self.store.surge_events_on(check_date).await?;

            for event in &events {
                if self.store.tracking_exists(event.id, days_after).await? {
                    continue;
                }

                let Some(current_close) = self.close_on(event, target_date).await? else {
                    debug!("No bar for {} on {}, skipping", event.symbol, target_date);
                    continue;
                };

                let tracking = NewSurgeTracking {
                    surge_event_id: event.id,
                    days_after,
                    close_price: current_close,
                    change_from_surge_pct: round_pct(pct_change(current_close, event.close)),
                    tracked_date: target_date,
                };
                if self.store.insert_tracking(&tracking).await?.is_some() {
                    created += 1;
                }
            }
        }

        info!("Post-surge tracking for {}: {} snapshots", target_date, created);
        Ok(created)
    }

    async fn close_on(&self, event: &SurgeEvent, date: NaiveDate) -> AppResult<Option<f64>> {
        if event.close <= 0.0 {
            return Ok(None);
        }

        let bars = match self.source.aggregate_bars(&event.symbol, date, date).await {
            Ok(bars) => bars,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(bars
            .iter()
            .find_map(|bar| bar.close.filter(|c| c.is_finite() && *c > 0.0)))
    }
}
