//! Campaign repository

use outreach_common::types::{CampaignId, UserId};
use sqlx::PgPool;

use crate::models::{Campaign, CampaignStatus};

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a campaign by ID, scoped to its owner
    pub async fn get_for_user(
        &self,
        id: CampaignId,
        user_id: UserId,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Read only the status column
    pub async fn get_status(&self, id: CampaignId) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT status FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(status,)| status))
    }

    /// Update campaign status
    pub async fn update_status(
        &self,
        id: CampaignId,
        status: CampaignStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Raise `emails_sent` to `emails_sent`, never lowering it and never
    /// exceeding the campaign's recipient count
    pub async fn update_progress(&self, id: CampaignId, emails_sent: i32) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE campaigns SET
                emails_sent = GREATEST(
                    emails_sent,
                    LEAST(
                        $2,
                        (SELECT COUNT(*)::INTEGER FROM campaign_recipients WHERE campaign_id = $1)
                    )
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(emails_sent.max(0))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
