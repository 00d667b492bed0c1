pub mod collection_log_repository;
pub mod corporate_action_repository;
pub mod daily_price_repository;
pub mod setting_repository;
pub mod surge_repository;
pub mod ticker_repository;

// Re-export all repositories for convenient access
pub use collection_log_repository::CollectionLogRepository;
pub use corporate_action_repository::CorporateActionRepository;
pub use daily_price_repository::DailyPriceRepository;
pub use setting_repository::SettingRepository;
pub use surge_repository::SurgeRepository;
pub use ticker_repository::TickerRepository;
