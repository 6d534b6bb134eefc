//! Campaign recipient repository

use chrono::{DateTime, Utc};
use outreach_common::types::{CampaignId, RecipientId};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{CampaignRecipient, PersonalizedEmail, RecipientCounts, ResetScope};

/// Campaign recipient repository
#[derive(Clone)]
pub struct RecipientRepository {
    pool: PgPool,
}

impl RecipientRepository {
    /// Create a new recipient repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically claim up to `limit` pending recipients for `claim_id`.
    ///
    /// Rows locked by a concurrent claim are skipped; rows claimed longer
    /// than `claim_ttl` ago are eligible again. A `None` limit claims all.
    pub async fn claim_pending(
        &self,
        campaign_id: CampaignId,
        claim_id: Uuid,
        limit: Option<i64>,
        claim_ttl: Duration,
    ) -> Result<Vec<CampaignRecipient>, sqlx::Error> {
        let mut claimed = sqlx::query_as::<_, CampaignRecipient>(
            r#"
            WITH candidates AS (
                SELECT id FROM campaign_recipients
                WHERE campaign_id = $1
                  AND status = 'pending'
                  AND (claimed_at IS NULL OR claimed_at < NOW() - make_interval(secs => $3))
                ORDER BY created_at ASC, id ASC
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            UPDATE campaign_recipients r SET
                claimed_at = NOW(),
                claim_id = $2,
                updated_at = NOW()
            FROM candidates c
            WHERE r.id = c.id AND r.status = 'pending'
            RETURNING r.*
            "#,
        )
        .bind(campaign_id)
        .bind(claim_id)
        .bind(claim_ttl.as_secs_f64())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        // RETURNING does not preserve the CTE ordering
        claimed.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(claimed)
    }

    /// Refresh `claimed_at` on a row this batch still owns. Returns `false`
    /// when the row left `pending` or was reclaimed by another batch.
    pub async fn renew_claim(&self, id: RecipientId, claim_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_recipients SET
                claimed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND claim_id = $2 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(claim_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Transition a pending recipient held by `claim_id` to `sent`
    pub async fn mark_sent(
        &self,
        id: RecipientId,
        claim_id: Uuid,
        email: &PersonalizedEmail,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let payload = serde_json::to_value(email).unwrap_or_default();

        let result = sqlx::query(
            r#"
            UPDATE campaign_recipients SET
                status = 'sent',
                sent_at = $3,
                personalized_email = $4,
                last_error = NULL,
                claimed_at = NULL,
                claim_id = NULL,
                updated_at = NOW()
            WHERE id = $1 AND claim_id = $2 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(claim_id)
        .bind(sent_at)
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Transition a pending recipient held by `claim_id` to `failed`
    pub async fn mark_failed(
        &self,
        id: RecipientId,
        claim_id: Uuid,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_recipients SET
                status = 'failed',
                last_error = $3,
                claimed_at = NULL,
                claim_id = NULL,
                updated_at = NOW()
            WHERE id = $1 AND claim_id = $2 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(claim_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drop `claim_id` from rows it still holds so another batch can take them now
    pub async fn release_claims(
        &self,
        campaign_id: CampaignId,
        claim_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_recipients SET
                claimed_at = NULL,
                claim_id = NULL,
                updated_at = NOW()
            WHERE campaign_id = $1 AND claim_id = $2 AND status = 'pending'
            "#,
        )
        .bind(campaign_id)
        .bind(claim_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Count pending recipients, claimed or not
    pub async fn count_pending(&self, campaign_id: CampaignId) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM campaign_recipients WHERE campaign_id = $1 AND status = 'pending'",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    /// Count recipients per status
    pub async fn counts(&self, campaign_id: CampaignId) -> Result<RecipientCounts, sqlx::Error> {
        let (total, pending, sent, failed): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'pending'),
                COUNT(*) FILTER (WHERE status = 'sent'),
                COUNT(*) FILTER (WHERE status = 'failed')
            FROM campaign_recipients
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(RecipientCounts {
            total,
            pending,
            sent,
            failed,
        })
    }

    /// Return recipients to `pending` and the campaign to `not-started` in one transaction
    pub async fn reset_campaign(
        &self,
        campaign_id: CampaignId,
        scope: ResetScope,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let status_filter = match scope {
            ResetScope::Failed => "AND status = 'failed'",
            ResetScope::All => "",
        };

        let reset = sqlx::query(&format!(
            r#"
            UPDATE campaign_recipients SET
                status = 'pending',
                sent_at = NULL,
                personalized_email = NULL,
                last_error = NULL,
                claimed_at = NULL,
                claim_id = NULL,
                updated_at = NOW()
            WHERE campaign_id = $1 {}
            "#,
            status_filter
        ))
        .bind(campaign_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE campaigns SET
                status = 'not-started',
                emails_sent = 0,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(campaign_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(reset.rows_affected())
    }
}
