use crate::error::{AppError, AppResult};
use crate::models::{COLLECTION_ENABLED_KEY, SURGE_THRESHOLD_KEY};
use crate::store::MarketStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Runtime settings with compiled fallbacks.
///
/// Values are read from the store on every call; nothing is cached between job runs.
pub struct SettingsService {
    store: Arc<dyn MarketStore>,
    default_threshold: f64,
}

impl SettingsService {
    pub fn new(store: Arc<dyn MarketStore>, default_threshold: f64) -> Self {
        Self {
            store,
            default_threshold,
        }
    }

    /// Surge threshold in percent
    pub async fn threshold(&self) -> AppResult<f64> {
        match self.store.get_setting(SURGE_THRESHOLD_KEY).await? {
            Some(raw) => match parse_threshold(&raw) {
                Ok(value) => Ok(value),
                Err(e) => {
                    warn!("{}, using default {}", e, self.default_threshold);
                    Ok(self.default_threshold)
                }
            },
            None => Ok(self.default_threshold),
        }
    }

    /// Whether the scheduled daily collection should run
    pub async fn collection_enabled(&self) -> AppResult<bool> {
        match self.store.get_setting(COLLECTION_ENABLED_KEY).await? {
            Some(raw) => match parse_flag(&raw) {
                Ok(value) => Ok(value),
                Err(e) => {
                    warn!("{}, treating collection as enabled", e);
                    Ok(true)
                }
            },
            None => Ok(true),
        }
    }

    /// All settings, stored values layered over the defaults
    pub async fn all(&self) -> AppResult<BTreeMap<String, String>> {
        let mut merged = self.defaults();
        for setting in self.store.all_settings().await? {
            merged.insert(setting.key, setting.value);
        }
        Ok(merged)
    }

    /// Store one setting. Known keys are validated before they are written.
    pub async fn update(&self, key: &str, value: &str) -> AppResult<BTreeMap<String, String>> {
        let value = value.trim();
        match key {
            SURGE_THRESHOLD_KEY => {
                parse_threshold(value).map_err(AppError::Validation)?;
            }
            COLLECTION_ENABLED_KEY => {
                parse_flag(value).map_err(AppError::Validation)?;
            }
            _ => {}
        }

        self.store.put_setting(key, value).await?;
        self.all().await
    }

    fn defaults(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (SURGE_THRESHOLD_KEY.to_string(), self.default_threshold.to_string()),
            (COLLECTION_ENABLED_KEY.to_string(), "true".to_string()),
        ])
    }
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("Invalid {} value '{}'", SURGE_THRESHOLD_KEY, raw)),
    }
}

fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(format!("Invalid {} value '{}'", COLLECTION_ENABLED_KEY, raw)),
    }
}
