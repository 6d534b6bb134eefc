//! Recipient state store
//!
//! The orchestrator talks to storage only through [`RecipientStore`] and
//! [`SettingsStore`], so the same pipeline runs against PostgreSQL in
//! production and [`crate::MemoryStore`] in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outreach_common::types::{CampaignId, RecipientId, UserId};
use outreach_common::{Error, Result};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::db::DatabasePool;
use crate::models::{
    Campaign, CampaignRecipient, CampaignStatus, PersonalizedEmail, RecipientCounts,
    RecipientProfile, ResetScope, UserSettings,
};
use crate::repository::{
    CampaignRepository, CompanyRepository, RecipientRepository, UserSettingsRepository,
};

/// Durable campaign and recipient delivery state
#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Load a campaign owned by `user_id`
    async fn load_campaign(&self, campaign_id: CampaignId, user_id: UserId) -> Result<Campaign>;

    /// Current campaign status
    async fn campaign_status(&self, campaign_id: CampaignId) -> Result<CampaignStatus>;

    /// Claim up to `limit` pending recipients for `claim_id`, ordered by
    /// `(created_at, id)`. `None` claims every eligible row.
    async fn load_pending_recipients(
        &self,
        campaign_id: CampaignId,
        claim_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<CampaignRecipient>>;

    /// Resolve the address and descriptive fields used for generation
    async fn resolve_recipient_profile(
        &self,
        recipient: &CampaignRecipient,
    ) -> Result<RecipientProfile>;

    /// Refresh the claim before work starts on a recipient. `false` means
    /// the row is no longer pending or another batch has reclaimed it.
    async fn renew_claim(&self, recipient_id: RecipientId, claim_id: Uuid) -> Result<bool>;

    /// `pending -> sent` for a row held by `claim_id`; returns whether it transitioned
    async fn mark_sent(
        &self,
        recipient_id: RecipientId,
        claim_id: Uuid,
        email: &PersonalizedEmail,
        sent_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// `pending -> failed` for a row held by `claim_id`; returns whether it transitioned
    async fn mark_failed(
        &self,
        recipient_id: RecipientId,
        claim_id: Uuid,
        reason: &str,
    ) -> Result<bool>;

    /// Clear `claim_id` from rows still pending. Returns the number released.
    async fn release_claims(&self, campaign_id: CampaignId, claim_id: Uuid) -> Result<u64>;

    /// Raise the campaign's sent counter, never lowering it
    async fn update_campaign_progress(&self, campaign_id: CampaignId, emails_sent: i32)
        -> Result<()>;

    async fn set_campaign_status(
        &self,
        campaign_id: CampaignId,
        status: CampaignStatus,
    ) -> Result<()>;

    async fn count_pending_recipients(&self, campaign_id: CampaignId) -> Result<i64>;

    async fn recipient_counts(&self, campaign_id: CampaignId) -> Result<RecipientCounts>;

    /// Return recipients in `scope` to `pending` and the campaign to
    /// `not-started` with a zeroed counter. Returns the number of rows reset.
    async fn reset_campaign(
        &self,
        campaign_id: CampaignId,
        user_id: UserId,
        scope: ResetScope,
    ) -> Result<u64>;
}

/// Read access to per-user delivery settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_user_settings(&self, user_id: UserId) -> Result<Option<UserSettings>>;
}

fn db_err(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct DbRecipientStore {
    campaigns: CampaignRepository,
    recipients: RecipientRepository,
    companies: CompanyRepository,
    settings: UserSettingsRepository,
    claim_ttl: Duration,
}

impl DbRecipientStore {
    /// Create a store over `pool`; claims older than `claim_ttl` are reclaimable
    pub fn new(pool: &DatabasePool, claim_ttl: Duration) -> Self {
        let pg = pool.pool().clone();
        Self {
            campaigns: CampaignRepository::new(pg.clone()),
            recipients: RecipientRepository::new(pg.clone()),
            companies: CompanyRepository::new(pg.clone()),
            settings: UserSettingsRepository::new(pg),
            claim_ttl,
        }
    }
}

#[async_trait]
impl RecipientStore for DbRecipientStore {
    async fn load_campaign(&self, campaign_id: CampaignId, user_id: UserId) -> Result<Campaign> {
        self.campaigns
            .get_for_user(campaign_id, user_id)
            .await
            .map_err(db_err)?
            .ok_or_else(|| Error::NotFound(format!("Campaign {} not found", campaign_id)))
    }

    async fn campaign_status(&self, campaign_id: CampaignId) -> Result<CampaignStatus> {
        let status = self
            .campaigns
            .get_status(campaign_id)
            .await
            .map_err(db_err)?
            .ok_or_else(|| Error::NotFound(format!("Campaign {} not found", campaign_id)))?;

        status.parse().map_err(Error::Internal)
    }

    async fn load_pending_recipients(
        &self,
        campaign_id: CampaignId,
        claim_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<CampaignRecipient>> {
        let claimed = self
            .recipients
            .claim_pending(campaign_id, claim_id, limit.map(i64::from), self.claim_ttl)
            .await
            .map_err(db_err)?;

        debug!(
            campaign_id = %campaign_id,
            claim_id = %claim_id,
            claimed = claimed.len(),
            "Claimed pending recipients"
        );
        Ok(claimed)
    }

    async fn resolve_recipient_profile(
        &self,
        recipient: &CampaignRecipient,
    ) -> Result<RecipientProfile> {
        if let Some(company_id) = recipient.company_id {
            let company = self
                .companies
                .get(company_id)
                .await
                .map_err(db_err)?
                .ok_or_else(|| Error::NotFound(format!("Company {} not found", company_id)))?;

            return profile_from_company(recipient, company);
        }

        profile_from_contact(recipient)
    }

    async fn renew_claim(&self, recipient_id: RecipientId, claim_id: Uuid) -> Result<bool> {
        self.recipients
            .renew_claim(recipient_id, claim_id)
            .await
            .map_err(db_err)
    }

    async fn mark_sent(
        &self,
        recipient_id: RecipientId,
        claim_id: Uuid,
        email: &PersonalizedEmail,
        sent_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.recipients
            .mark_sent(recipient_id, claim_id, email, sent_at)
            .await
            .map_err(db_err)
    }

    async fn mark_failed(
        &self,
        recipient_id: RecipientId,
        claim_id: Uuid,
        reason: &str,
    ) -> Result<bool> {
        self.recipients
            .mark_failed(recipient_id, claim_id, reason)
            .await
            .map_err(db_err)
    }

    async fn release_claims(&self, campaign_id: CampaignId, claim_id: Uuid) -> Result<u64> {
        let released = self
            .recipients
            .release_claims(campaign_id, claim_id)
            .await
            .map_err(db_err)?;

        debug!(campaign_id = %campaign_id, claim_id = %claim_id, released, "Released claims");
        Ok(released)
    }

    async fn update_campaign_progress(
        &self,
        campaign_id: CampaignId,
        emails_sent: i32,
    ) -> Result<()> {
        self.campaigns
            .update_progress(campaign_id, emails_sent)
            .await
            .map_err(db_err)
    }

    async fn set_campaign_status(
        &self,
        campaign_id: CampaignId,
        status: CampaignStatus,
    ) -> Result<()> {
        let updated = self
            .campaigns
            .update_status(campaign_id, status)
            .await
            .map_err(db_err)?;

        if !updated {
            return Err(Error::NotFound(format!("Campaign {} not found", campaign_id)));
        }
        Ok(())
    }

    async fn count_pending_recipients(&self, campaign_id: CampaignId) -> Result<i64> {
        self.recipients
            .count_pending(campaign_id)
            .await
            .map_err(db_err)
    }

    async fn recipient_counts(&self, campaign_id: CampaignId) -> Result<RecipientCounts> {
        self.recipients.counts(campaign_id).await.map_err(db_err)
    }

    async fn reset_campaign(
        &self,
        campaign_id: CampaignId,
        user_id: UserId,
        scope: ResetScope,
    ) -> Result<u64> {
        // Ownership check before touching any rows
        self.load_campaign(campaign_id, user_id).await?;

        self.recipients
            .reset_campaign(campaign_id, scope)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl SettingsStore for DbRecipientStore {
    async fn load_user_settings(&self, user_id: UserId) -> Result<Option<UserSettings>> {
        self.settings.get(user_id).await.map_err(db_err)
    }
}

/// Profile for a recipient sourced from the shared companies table
pub(crate) fn profile_from_company(
    recipient: &CampaignRecipient,
    company: crate::models::Company,
) -> Result<RecipientProfile> {
    let email = non_empty(company.email.as_deref())
        .or_else(|| non_empty(recipient.recipient_email.as_deref()))
        .ok_or_else(|| {
            Error::Validation(format!("Company {} has no email address", company.id))
        })?;

    Ok(RecipientProfile {
        email,
        name: non_empty(company.contact_name.as_deref())
            .or_else(|| non_empty(recipient.recipient_name.as_deref())),
        company_name: Some(company.name),
        industry: non_empty(company.industry.as_deref()),
        employee_count: company.employee_count,
    })
}

/// Profile for a recipient sourced from a user-owned contact
pub(crate) fn profile_from_contact(recipient: &CampaignRecipient) -> Result<RecipientProfile> {
    let email = non_empty(recipient.recipient_email.as_deref()).ok_or_else(|| {
        Error::Validation(format!("Recipient {} has no email address", recipient.id))
    })?;

    Ok(RecipientProfile {
        email,
        name: non_empty(recipient.recipient_name.as_deref()),
        company_name: non_empty(recipient.contact_company.as_deref()),
        industry: non_empty(recipient.contact_industry.as_deref()),
        employee_count: None,
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
