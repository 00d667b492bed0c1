//! In-process cron for the two recurring jobs.
//!
//! Daily collection runs every day at the configured UTC hour. Ticker sync
//! runs weekly at 00:00 UTC on the configured weekday. A failed run is logged
//! and the loop waits for the next slot.

use crate::config::SchedulerConfig;
use crate::services::collection_service::CollectionService;
use crate::services::settings_service::SettingsService;
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use std::sync::Arc;
use tokio::time;
use tracing::{error, info, warn};

/// First time strictly after `now` at `hour`:00 UTC
pub fn next_daily_run(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let midnight = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::default()));
    let today = midnight + Duration::hours(hour.min(23) as i64);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// First 00:00 UTC on `weekday` strictly after `now`
pub fn next_weekly_run(now: DateTime<Utc>, weekday: Weekday) -> DateTime<Utc> {
    let days_ahead = (weekday.num_days_from_monday() + 7
        - now.weekday().num_days_from_monday())
        % 7;
    let midnight = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::default()));
    let candidate = midnight + Duration::days(days_ahead as i64);
    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(7)
    }
}

async fn sleep_until(target: DateTime<Utc>) {
    let wait = (target - Utc::now()).to_std().unwrap_or_default();
    time::sleep(wait).await;
}

pub struct Scheduler {
    collection: Arc<CollectionService>,
    settings: Arc<SettingsService>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        collection: Arc<CollectionService>,
        settings: Arc<SettingsService>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            collection,
            settings,
            config,
        }
    }

    /// Run both loops until the task is dropped
    pub async fn start(self) {
        info!(
            "Scheduler started: daily collection at {:02}:00 UTC, ticker sync on {} 00:00 UTC",
            self.config.daily_collection_hour_utc, self.config.ticker_sync_weekday
        );
        tokio::join!(self.daily_loop(), self.weekly_loop());
    }

    async fn daily_loop(&self) {
        loop {
            let next = next_daily_run(Utc::now(), self.config.daily_collection_hour_utc);
            info!("Next daily collection at {}", next);
            sleep_until(next).await;

            match self.settings.collection_enabled().await {
                Ok(false) => {
                    info!("Collection disabled, skipping scheduled daily collection");
                    continue;
                }
                Ok(true) => {}
                Err(e) => {
                    error!("Could not read collection setting: {}", e);
                    continue;
                }
            }

            match self.collection.run_daily_collection(None).await {
                Ok(_) => {}
                Err(e) if e.is_rate_limited() => {
                    warn!("Scheduled daily collection gave up on provider rate limits: {}", e);
                }
                Err(e) => error!("Scheduled daily collection failed: {}", e),
            }
        }
    }

    async fn weekly_loop(&self) {
        loop {
            let next = next_weekly_run(Utc::now(), self.config.ticker_sync_weekday);
            info!("Next ticker sync at {}", next);
            sleep_until(next).await;

            if let Err(e) = self.collection.run_ticker_sync().await {
                error!("Scheduled ticker sync failed: {}", e);
            }
        }
    }
}
