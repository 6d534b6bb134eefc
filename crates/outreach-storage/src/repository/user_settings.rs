//! User settings repository

use sqlx::PgPool;

use crate::models::UserSettings;
use outreach_common::types::UserId;

/// User settings repository
#[derive(Clone)]
pub struct UserSettingsRepository {
    pool: PgPool,
}

impl UserSettingsRepository {
    /// Create a new user settings repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the settings row for a user
    pub async fn get(&self, user_id: UserId) -> Result<Option<UserSettings>, sqlx::Error> {
        sqlx::query_as::<_, UserSettings>("SELECT * FROM user_settings WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }
}
