pub mod admin_service;
pub mod collection_service;
pub mod job_ledger;
pub mod scheduler;
pub mod settings_service;
pub mod surge_detector;
pub mod tracking_service;

pub use admin_service::{AdminResponse, AdminService, AdminStatus};
pub use collection_service::CollectionService;
pub use job_ledger::{JobLedger, JobOutcome};
pub use scheduler::Scheduler;
pub use settings_service::SettingsService;
pub use surge_detector::{SurgeDetector, MAX_PREV_DAY_LOOKBACK};
pub use tracking_service::PostSurgeTracker;
