use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const SURGE_THRESHOLD_KEY: &str = "surge_threshold_pct";
pub const COLLECTION_ENABLED_KEY: &str = "collection_enabled";

/// Runtime-tunable setting. Absent keys fall back to compiled defaults.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSetting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
