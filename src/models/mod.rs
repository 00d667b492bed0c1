//! Domain models for the surge tracker.
//!
//! This module contains all database-backed models: the ticker directory,
//! daily prices, surge events with their tracking snapshots, the job ledger,
//! corporate actions and runtime settings.

pub mod collection_log;
pub mod corporate_action;
pub mod daily_price;
pub mod surge;
pub mod ticker;
pub mod user_setting;

// Re-export all models for convenient access
pub use collection_log::{truncate_error_message, CollectionLog, JobStatus, JobType, MAX_ERROR_MESSAGE_LEN};
pub use corporate_action::{Dividend, NewDividend, NewStockSplit, StockSplit};
pub use daily_price::{DailyPrice, NewDailyPrice};
pub use surge::{NewSurgeEvent, NewSurgeTracking, SurgeEvent, SurgeTracking, TRACKING_OFFSETS};
pub use ticker::{Ticker, TickerDetailsUpdate, TickerUpsert};
pub use user_setting::{UserSetting, COLLECTION_ENABLED_KEY, SURGE_THRESHOLD_KEY};

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Percentage change from `base` to `value`, in percent.
pub fn pct_change(value: f64, base: f64) -> f64 {
    (value - base) / base * 100.0
}

/// Round a percentage to 2 decimal places, half away from zero.
///
/// Goes through `Decimal` so that values like 10.125 round on their decimal
/// representation instead of their binary one.
pub fn round_pct(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}
