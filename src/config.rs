use chrono::Weekday;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Market data provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_secs: u64,
}

/// Collection job tuning
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub surge_threshold_pct: f64,
    pub bulk_commit_days: usize,
    pub enrichment_commit_size: usize,
    pub enrichment_max_symbols: Option<usize>,
    pub ticker_sync_max_pages: usize,
    pub corporate_actions_max_pages: usize,
    pub job_stale_after_minutes: i64,
}

/// Scheduler timing
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub daily_collection_hour_utc: u32,
    pub ticker_sync_weekday: Weekday,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub collection: CollectionConfig,
    pub scheduler: SchedulerConfig,
    pub log_level: String,
    pub environment: String,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = env_or("DATABASE_MAX_CONNECTIONS", 10u32);
        let acquire_timeout_secs = env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 30u64);
        let idle_timeout_secs = env_or("DATABASE_IDLE_TIMEOUT_SECS", 600u64); // 10 minutes
        let max_lifetime_secs = env_or("DATABASE_MAX_LIFETIME_SECS", 1800u64); // 30 minutes
        let test_before_acquire = env_or("DATABASE_TEST_BEFORE_ACQUIRE", true);

        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/surge_tracker".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let api_key = env::var("POLYGON_API_KEY").unwrap_or_default();
        let base_url = env::var("POLYGON_BASE_URL").unwrap_or(defaults.base_url);
        let max_tokens = env_or("PROVIDER_MAX_TOKENS", defaults.max_tokens);
        let requests_per_minute =
            env_or("PROVIDER_REQUESTS_PER_MINUTE", defaults.requests_per_minute);
        let timeout_secs = env_or("PROVIDER_TIMEOUT_SECS", defaults.timeout_secs);
        let max_retries = env_or("PROVIDER_MAX_RETRIES", defaults.max_retries);
        let retry_backoff_secs = env_or("PROVIDER_RETRY_BACKOFF_SECS", defaults.retry_backoff_secs);

        if max_tokens == 0 {
            return Err("PROVIDER_MAX_TOKENS must be greater than 0".to_string());
        }
        if requests_per_minute == 0 {
            return Err("PROVIDER_REQUESTS_PER_MINUTE must be greater than 0".to_string());
        }
        if max_retries == 0 {
            return Err("PROVIDER_MAX_RETRIES must be greater than 0".to_string());
        }

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens,
            requests_per_minute,
            timeout_secs,
            max_retries,
            retry_backoff_secs,
        })
    }

    /// Limiter refill rate in tokens per second
    pub fn refill_rate(&self) -> f64 {
        self.requests_per_minute as f64 / 60.0
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        // Free tier: 5 requests/minute, run at 4 to leave headroom
        Self {
            api_key: String::new(),
            base_url: "https://api.polygon.io".to_string(),
            max_tokens: 4,
            requests_per_minute: 4,
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_secs: 65,
        }
    }
}

impl CollectionConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let surge_threshold_pct = env_or("SURGE_THRESHOLD_PCT", defaults.surge_threshold_pct);
        let bulk_commit_days = env_or("BULK_COMMIT_DAYS", defaults.bulk_commit_days);
        let enrichment_commit_size =
            env_or("ENRICHMENT_COMMIT_SIZE", defaults.enrichment_commit_size);
        let enrichment_max_symbols = env::var("ENRICHMENT_MAX_SYMBOLS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok());
        let ticker_sync_max_pages = env_or("TICKER_SYNC_MAX_PAGES", defaults.ticker_sync_max_pages);
        let corporate_actions_max_pages =
            env_or("CORPORATE_ACTIONS_MAX_PAGES", defaults.corporate_actions_max_pages);
        let job_stale_after_minutes =
            env_or("JOB_STALE_AFTER_MINUTES", defaults.job_stale_after_minutes);

        if !surge_threshold_pct.is_finite() {
            return Err("SURGE_THRESHOLD_PCT must be a finite number".to_string());
        }
        if bulk_commit_days == 0 || enrichment_commit_size == 0 {
            return Err("BULK_COMMIT_DAYS and ENRICHMENT_COMMIT_SIZE must be greater than 0".to_string());
        }
        if ticker_sync_max_pages == 0 || corporate_actions_max_pages == 0 {
            return Err("page limits must be greater than 0".to_string());
        }
        if job_stale_after_minutes <= 0 {
            return Err("JOB_STALE_AFTER_MINUTES must be greater than 0".to_string());
        }

        Ok(Self {
            surge_threshold_pct,
            bulk_commit_days,
            enrichment_commit_size,
            enrichment_max_symbols,
            ticker_sync_max_pages,
            corporate_actions_max_pages,
            job_stale_after_minutes,
        })
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            surge_threshold_pct: 20.0,
            bulk_commit_days: 10,
            enrichment_commit_size: 50,
            enrichment_max_symbols: None,
            ticker_sync_max_pages: 10,
            corporate_actions_max_pages: 50,
            job_stale_after_minutes: 360,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self, String> {
        let daily_collection_hour_utc = env_or("DAILY_COLLECTION_HOUR_UTC", 22u32);
        if daily_collection_hour_utc > 23 {
            return Err(format!(
                "Invalid DAILY_COLLECTION_HOUR_UTC: {}. Must be 0-23",
                daily_collection_hour_utc
            ));
        }

        let ticker_sync_weekday = match env::var("TICKER_SYNC_WEEKDAY") {
            Ok(s) => s
                .parse::<Weekday>()
                .map_err(|_| format!("Invalid TICKER_SYNC_WEEKDAY: {}", s))?,
            Err(_) => Weekday::Sun,
        };

        Ok(Self {
            daily_collection_hour_utc,
            ticker_sync_weekday,
        })
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            daily_collection_hour_utc: 22,
            ticker_sync_weekday: Weekday::Sun,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let provider = ProviderConfig::from_env()?;
        let collection = CollectionConfig::from_env()?;
        let scheduler = SchedulerConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        Ok(Self {
            database,
            provider,
            collection,
            scheduler,
            log_level: log_level.to_lowercase(),
            environment: environment.to_lowercase(),
        })
    }

    /// Production logs are emitted as JSON lines
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            provider: ProviderConfig::default(),
            collection: CollectionConfig::default(),
            scheduler: SchedulerConfig::default(),
            log_level: "info".to_string(),
            environment: "development".to_string(),
        }
    }
}
