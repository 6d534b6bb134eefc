//! In-memory store
//!
//! Mirrors the PostgreSQL claim and conditional-update semantics so the
//! pipeline can be exercised without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outreach_common::types::{CampaignId, CompanyId, RecipientId, UserId};
use outreach_common::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Campaign, CampaignRecipient, CampaignStatus, Company, PersonalizedEmail, RecipientCounts,
    RecipientProfile, RecipientStatus, ResetScope, UserSettings,
};
use crate::store::{profile_from_company, profile_from_contact, RecipientStore, SettingsStore};

#[derive(Default)]
struct State {
    campaigns: HashMap<CampaignId, Campaign>,
    recipients: Vec<CampaignRecipient>,
    companies: HashMap<CompanyId, Company>,
    settings: HashMap<UserId, UserSettings>,
}

/// Process-local store implementing [`RecipientStore`] and [`SettingsStore`]
pub struct MemoryStore {
    state: RwLock<State>,
    claim_ttl: Duration,
    failing_status_writes: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_claim_ttl(Duration::from_secs(900))
    }

    pub fn with_claim_ttl(claim_ttl: Duration) -> Self {
        Self {
            state: RwLock::new(State::default()),
            claim_ttl,
            failing_status_writes: AtomicUsize::new(0),
        }
    }

    pub async fn insert_campaign(&self, campaign: Campaign) {
        self.state
            .write()
            .await
            .campaigns
            .insert(campaign.id, campaign);
    }

    pub async fn insert_recipient(&self, recipient: CampaignRecipient) {
        self.state.write().await.recipients.push(recipient);
    }

    pub async fn insert_company(&self, company: Company) {
        self.state.write().await.companies.insert(company.id, company);
    }

    pub async fn insert_settings(&self, settings: UserSettings) {
        self.state
            .write()
            .await
            .settings
            .insert(settings.user_id, settings);
    }

    pub async fn campaign(&self, id: CampaignId) -> Option<Campaign> {
        self.state.read().await.campaigns.get(&id).cloned()
    }

    pub async fn recipient(&self, id: RecipientId) -> Option<CampaignRecipient> {
        self.state
            .read()
            .await
            .recipients
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub async fn recipients_for(&self, campaign_id: CampaignId) -> Vec<CampaignRecipient> {
        self.state
            .read()
            .await
            .recipients
            .iter()
            .filter(|r| r.campaign_id == campaign_id)
            .cloned()
            .collect()
    }

    /// Make every `mark_sent` / `mark_failed` return a database error
    pub fn set_fail_status_writes(&self, fail: bool) {
        let remaining = if fail { usize::MAX } else { 0 };
        self.failing_status_writes.store(remaining, Ordering::SeqCst);
    }

    /// Fail only the next `count` status writes
    pub fn fail_next_status_writes(&self, count: usize) {
        self.failing_status_writes.store(count, Ordering::SeqCst);
    }

    fn check_status_write(&self) -> Result<()> {
        let rejected = self
            .failing_status_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if rejected {
            return Err(Error::Database("status write rejected".to_string()));
        }
        Ok(())
    }

    fn claim_expired(&self, claimed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match claimed_at {
            None => true,
            Some(at) => {
                chrono::Duration::from_std(self.claim_ttl)
                    .ok()
                    .and_then(|ttl| at.checked_add_signed(ttl))
                    .map_or(false, |expires| expires <= now)
            }
        }
    }
}

fn not_found(campaign_id: CampaignId) -> Error {
    Error::NotFound(format!("Campaign {} not found", campaign_id))
}

fn is_pending(recipient: &CampaignRecipient) -> bool {
    recipient.status_enum() == Some(RecipientStatus::Pending)
}

fn held_by(recipient: &CampaignRecipient, claim_id: Uuid) -> bool {
    is_pending(recipient) && recipient.claim_id == Some(claim_id)
}

#[async_trait]
impl RecipientStore for MemoryStore {
    async fn load_campaign(&self, campaign_id: CampaignId, user_id: UserId) -> Result<Campaign> {
        self.state
            .read()
            .await
            .campaigns
            .get(&campaign_id)
            .filter(|c| c.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found(campaign_id))
    }

    async fn campaign_status(&self, campaign_id: CampaignId) -> Result<CampaignStatus> {
        let state = self.state.read().await;
        let campaign = state
            .campaigns
            .get(&campaign_id)
            .ok_or_else(|| not_found(campaign_id))?;
        campaign.status.parse().map_err(Error::Internal)
    }

    async fn load_pending_recipients(
        &self,
        campaign_id: CampaignId,
        claim_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<CampaignRecipient>> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let mut eligible: Vec<usize> = state
            .recipients
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r.campaign_id == campaign_id && is_pending(r) && self.claim_expired(r.claimed_at, now)
            })
            .map(|(i, _)| i)
            .collect();

        eligible.sort_by(|&a, &b| {
            let (ra, rb) = (&state.recipients[a], &state.recipients[b]);
            (ra.created_at, ra.id).cmp(&(rb.created_at, rb.id))
        });
        if let Some(limit) = limit {
            eligible.truncate(limit as usize);
        }

        let mut claimed = Vec::with_capacity(eligible.len());
        for i in eligible {
            let row = &mut state.recipients[i];
            row.claimed_at = Some(now);
            row.claim_id = Some(claim_id);
            row.updated_at = now;
            claimed.push(row.clone());
        }
        Ok(claimed)
    }

    async fn resolve_recipient_profile(
        &self,
        recipient: &CampaignRecipient,
    ) -> Result<RecipientProfile> {
        if let Some(company_id) = recipient.company_id {
            let company = self
                .state
                .read()
                .await
                .companies
                .get(&company_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("Company {} not found", company_id)))?;
            return profile_from_company(recipient, company);
        }
        profile_from_contact(recipient)
    }

    async fn renew_claim(&self, recipient_id: RecipientId, claim_id: Uuid) -> Result<bool> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let Some(row) = state
            .recipients
            .iter_mut()
            .find(|r| r.id == recipient_id && held_by(r, claim_id))
        else {
            return Ok(false);
        };

        row.claimed_at = Some(now);
        row.updated_at = now;
        Ok(true)
    }

    async fn mark_sent(
        &self,
        recipient_id: RecipientId,
        claim_id: Uuid,
        email: &PersonalizedEmail,
        sent_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.check_status_write()?;
        let mut state = self.state.write().await;
        let Some(row) = state
            .recipients
            .iter_mut()
            .find(|r| r.id == recipient_id && held_by(r, claim_id))
        else {
            return Ok(false);
        };

        row.status = RecipientStatus::Sent.to_string();
        row.sent_at = Some(sent_at);
        row.personalized_email = serde_json::to_value(email).ok();
        row.last_error = None;
        row.claimed_at = None;
        row.claim_id = None;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_failed(
        &self,
        recipient_id: RecipientId,
        claim_id: Uuid,
        reason: &str,
    ) -> Result<bool> {
        self.check_status_write()?;
        let mut state = self.state.write().await;
        let Some(row) = state
            .recipients
            .iter_mut()
            .find(|r| r.id == recipient_id && held_by(r, claim_id))
        else {
            return Ok(false);
        };

        row.status = RecipientStatus::Failed.to_string();
        row.last_error = Some(reason.to_string());
        row.claimed_at = None;
        row.claim_id = None;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn release_claims(&self, campaign_id: CampaignId, claim_id: Uuid) -> Result<u64> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let mut released = 0;
        for row in state
            .recipients
            .iter_mut()
            .filter(|r| r.campaign_id == campaign_id && held_by(r, claim_id))
        {
            row.claimed_at = None;
            row.claim_id = None;
            row.updated_at = now;
            released += 1;
        }
        Ok(released)
    }

    async fn update_campaign_progress(
        &self,
        campaign_id: CampaignId,
        emails_sent: i32,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let total = state
            .recipients
            .iter()
            .filter(|r| r.campaign_id == campaign_id)
            .count() as i32;
        let campaign = state
            .campaigns
            .get_mut(&campaign_id)
            .ok_or_else(|| not_found(campaign_id))?;

        campaign.emails_sent = campaign.emails_sent.max(emails_sent.max(0).min(total));
        campaign.updated_at = Utc::now();
        Ok(())
    }

    async fn set_campaign_status(
        &self,
        campaign_id: CampaignId,
        status: CampaignStatus,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let campaign = state
            .campaigns
            .get_mut(&campaign_id)
            .ok_or_else(|| not_found(campaign_id))?;
        campaign.status = status.to_string();
        campaign.updated_at = Utc::now();
        Ok(())
    }

    async fn count_pending_recipients(&self, campaign_id: CampaignId) -> Result<i64> {
        Ok(self
            .state
            .read()
            .await
            .recipients
            .iter()
            .filter(|r| r.campaign_id == campaign_id && is_pending(r))
            .count() as i64)
    }

    async fn recipient_counts(&self, campaign_id: CampaignId) -> Result<RecipientCounts> {
        let state = self.state.read().await;
        let mut counts = RecipientCounts::default();
        for r in state.recipients.iter().filter(|r| r.campaign_id == campaign_id) {
            counts.total += 1;
            match r.status_enum() {
                Some(RecipientStatus::Pending) => counts.pending += 1,
                Some(RecipientStatus::Sent) => counts.sent += 1,
                Some(RecipientStatus::Failed) => counts.failed += 1,
                None => {}
            }
        }
        Ok(counts)
    }

    async fn reset_campaign(
        &self,
        campaign_id: CampaignId,
        user_id: UserId,
        scope: ResetScope,
    ) -> Result<u64> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        match state.campaigns.get_mut(&campaign_id) {
            Some(campaign) if campaign.user_id == user_id => {
                campaign.status = CampaignStatus::NotStarted.to_string();
                campaign.emails_sent = 0;
                campaign.updated_at = now;
            }
            _ => return Err(not_found(campaign_id)),
        }

        let mut reset = 0;
        for row in state
            .recipients
            .iter_mut()
            .filter(|r| r.campaign_id == campaign_id)
        {
            let matches = match scope {
                ResetScope::Failed => row.status_enum() == Some(RecipientStatus::Failed),
                ResetScope::All => true,
            };
            if !matches {
                continue;
            }
            row.status = RecipientStatus::Pending.to_string();
            row.sent_at = None;
            row.personalized_email = None;
            row.last_error = None;
            row.claimed_at = None;
            row.claim_id = None;
            row.updated_at = now;
            reset += 1;
        }
        Ok(reset)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load_user_settings(&self, user_id: UserId) -> Result<Option<UserSettings>> {
        Ok(self.state.read().await.settings.get(&user_id).cloned())
    }
}
