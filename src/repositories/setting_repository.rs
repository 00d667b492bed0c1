use crate::error::RepositoryError;
use crate::models::UserSetting;
use sqlx::PgPool;

/// Repository for runtime settings
pub struct SettingRepository {
    pool: PgPool,
}

impl SettingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<UserSetting>, RepositoryError> {
        let setting = sqlx::query_as::<_, UserSetting>(
            "SELECT key, value, updated_at FROM user_settings WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(setting)
    }

    /// Insert or overwrite a setting
    pub async fn upsert(&self, key: &str, value: &str) -> Result<UserSetting, RepositoryError> {
        if key.trim().is_empty() {
            return Err(RepositoryError::InvalidInput("setting key must not be empty".into()));
        }

        let setting = sqlx::query_as::<_, UserSetting>(
            r#"
            INSERT INTO user_settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            RETURNING key, value, updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;

        Ok(setting)
    }

    pub async fn all(&self) -> Result<Vec<UserSetting>, RepositoryError> {
        let settings = sqlx::query_as::<_, UserSetting>(
            "SELECT key, value, updated_at FROM user_settings ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(settings)
    }
}
