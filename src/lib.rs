//! Surge Tracker Library
//!
//! Daily market data collection, surge detection and post-surge tracking for
//! US equities. Exposed as a library so the binary and the integration tests
//! share the same wiring.

pub mod calendar;
pub mod config;
pub mod database;
pub mod error;
pub mod market_data;
pub mod models;
pub mod rate_limiter;
pub mod repositories;
pub mod services;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use market_data::MarketDataSource;
use services::{AdminService, CollectionService, Scheduler, SettingsService};
use std::sync::Arc;
use store::MarketStore;

/// Application state: one data source and one store shared by every job
pub struct AppState {
    pub source: Arc<dyn MarketDataSource>,
    pub store: Arc<dyn MarketStore>,
    pub settings: Arc<SettingsService>,
    pub collection: Arc<CollectionService>,
    pub admin: Arc<AdminService>,
}

impl AppState {
    /// Wire the services around `source` and `store`
    pub fn new(
        config: &AppConfig,
        source: Arc<dyn MarketDataSource>,
        store: Arc<dyn MarketStore>,
    ) -> Self {
        let settings = Arc::new(SettingsService::new(
            store.clone(),
            config.collection.surge_threshold_pct,
        ));
        let collection = Arc::new(CollectionService::new(
            source.clone(),
            store.clone(),
            settings.clone(),
            config.collection.clone(),
        ));
        let admin = Arc::new(AdminService::new(collection.clone(), store.clone()));

        Self {
            source,
            store,
            settings,
            collection,
            admin,
        }
    }

    pub fn scheduler(&self, config: &AppConfig) -> Scheduler {
        Scheduler::new(
            self.collection.clone(),
            self.settings.clone(),
            config.scheduler.clone(),
        )
    }
}
