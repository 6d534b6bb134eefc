//! Batch orchestrator
//!
//! One call to [`BatchOrchestrator::run_batch`] claims a bounded slice of
//! pending recipients and, for each one in order, drafts the email, sends
//! it and records the outcome before moving on.

use chrono::Utc;
use outreach_common::config::PipelineConfig;
use outreach_common::types::{CampaignId, EmailAddress, UserId};
use outreach_storage::models::{
    Campaign, CampaignRecipient, CampaignStatus, PersonalizedEmail, RecipientCounts, ResetScope,
};
use outreach_storage::{RecipientStore, SettingsStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::settings::{validate_settings, DeliverySettings};
use super::SendError;
use crate::personalize::{EmailGenerationInput, EmailGenerator, GeneratedEmail, TemplateRenderer};
use crate::smtp::{MailTransport, OutgoingEmail, TlsMode};

/// Tunables for one orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// `None` claims every pending recipient in one batch
    pub batch_size: Option<u32>,
    pub progress_interval: u32,
    pub delay_after_success: Duration,
    pub delay_after_failure: Duration,
    pub tls: TlsMode,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            batch_size: (config.batch_size > 0).then_some(config.batch_size),
            progress_interval: config.progress_interval.max(1),
            delay_after_success: Duration::from_millis(config.delay_after_success_ms),
            delay_after_failure: Duration::from_millis(config.delay_after_failure_ms),
            tls: TlsMode::Auto,
        }
    }
}

/// Outcome of one batch invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub success: bool,
    /// Recipients processed in this invocation
    pub total: u32,
    pub sent: u32,
    pub failed: u32,
    /// Recipients still pending after the batch
    pub remaining: i64,
    pub has_more: bool,
    /// The campaign left `running` while the batch was in flight
    pub stopped: bool,
    pub message: String,
}

/// Campaign state as reported to callers
#[derive(Debug, Clone, Serialize)]
pub struct CampaignProgress {
    pub id: CampaignId,
    pub name: String,
    pub status: String,
    pub emails_sent: i32,
    pub recipients: RecipientCounts,
}

enum Outcome {
    Sent,
    Failed,
    /// The claim was lost to another batch before any work started
    Skipped,
}

/// Runs campaign batches against injected storage, transport and generator
#[derive(Clone)]
pub struct BatchOrchestrator {
    store: Arc<dyn RecipientStore>,
    settings_store: Arc<dyn SettingsStore>,
    transport: Arc<dyn MailTransport>,
    generator: Arc<dyn EmailGenerator>,
    renderer: TemplateRenderer,
    settings: OrchestratorSettings,
}

impl BatchOrchestrator {
    pub fn new(
        store: Arc<dyn RecipientStore>,
        settings_store: Arc<dyn SettingsStore>,
        transport: Arc<dyn MailTransport>,
        generator: Arc<dyn EmailGenerator>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            settings_store,
            transport,
            generator,
            renderer: TemplateRenderer::new(),
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecipientStore> {
        &self.store
    }

    /// Process one batch of pending recipients
    pub async fn run_batch(
        &self,
        campaign_id: CampaignId,
        user_id: UserId,
    ) -> Result<BatchReport, SendError> {
        let campaign = self.load_campaign(campaign_id, user_id).await?;
        if campaign.status_enum() == Some(CampaignStatus::Completed) {
            return Err(SendError::AlreadyCompleted(campaign_id));
        }

        if let Err(e) = self
            .store
            .set_campaign_status(campaign_id, CampaignStatus::Running)
            .await
        {
            warn!(campaign_id = %campaign_id, error = %e, "Failed to mark campaign running");
        }

        let delivery = match self.prepare(&campaign).await {
            Ok(delivery) => delivery,
            Err(e) => return Err(self.fail_campaign(campaign_id, e).await),
        };

        let claim_id = Uuid::new_v4();
        match self.process(&campaign, &delivery, claim_id).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.release_claims(campaign_id, claim_id).await;
                Err(self.fail_campaign(campaign_id, e).await)
            }
        }
    }

    /// Return recipients in `scope` to `pending` and the campaign to `not-started`
    pub async fn reset(
        &self,
        campaign_id: CampaignId,
        user_id: UserId,
        scope: ResetScope,
    ) -> Result<u64, SendError> {
        let reset = self
            .store
            .reset_campaign(campaign_id, user_id, scope)
            .await
            .map_err(|e| campaign_error(campaign_id, e))?;

        info!(campaign_id = %campaign_id, scope = ?scope, reset, "Campaign reset");
        Ok(reset)
    }

    /// Mark the campaign completed. A batch in flight stops before its next recipient.
    pub async fn stop(&self, campaign_id: CampaignId, user_id: UserId) -> Result<(), SendError> {
        self.load_campaign(campaign_id, user_id).await?;
        self.store
            .set_campaign_status(campaign_id, CampaignStatus::Completed)
            .await
            .map_err(|e| campaign_error(campaign_id, e))?;

        info!(campaign_id = %campaign_id, "Campaign stopped");
        Ok(())
    }

    /// Current status and recipient counts
    pub async fn progress(
        &self,
        campaign_id: CampaignId,
        user_id: UserId,
    ) -> Result<CampaignProgress, SendError> {
        let campaign = self.load_campaign(campaign_id, user_id).await?;
        let recipients = self.store.recipient_counts(campaign_id).await?;

        Ok(CampaignProgress {
            id: campaign.id,
            name: campaign.name,
            status: campaign.status,
            emails_sent: campaign.emails_sent,
            recipients,
        })
    }

    async fn load_campaign(
        &self,
        campaign_id: CampaignId,
        user_id: UserId,
    ) -> Result<Campaign, SendError> {
        self.store
            .load_campaign(campaign_id, user_id)
            .await
            .map_err(|e| campaign_error(campaign_id, e))
    }

    /// Settings are read once and validated before any recipient is claimed
    async fn prepare(&self, campaign: &Campaign) -> Result<DeliverySettings, SendError> {
        let user_settings = self
            .settings_store
            .load_user_settings(campaign.user_id)
            .await?;

        let manual = campaign.has_manual_template();
        let mut missing = match validate_settings(user_settings.as_ref(), !manual, self.settings.tls)
        {
            Ok(delivery) if !manual => return Ok(delivery),
            Ok(delivery) => {
                let mut missing = Vec::new();
                if blank(campaign.template_subject.as_deref()) {
                    missing.push("template_subject".to_string());
                }
                if blank(campaign.template_body.as_deref()) {
                    missing.push("template_body".to_string());
                }
                if missing.is_empty() {
                    return Ok(delivery);
                }
                missing
            }
            Err(missing) => missing,
        };
        missing.dedup();

        warn!(
            campaign_id = %campaign.id,
            missing = %missing.join(","),
            "Campaign cannot be sent, configuration incomplete"
        );
        Err(SendError::MissingConfiguration(missing))
    }

    async fn process(
        &self,
        campaign: &Campaign,
        delivery: &DeliverySettings,
        claim_id: Uuid,
    ) -> Result<BatchReport, SendError> {
        let campaign_id = campaign.id;
        let recipients = self
            .store
            .load_pending_recipients(campaign_id, claim_id, self.settings.batch_size)
            .await?;

        info!(
            campaign_id = %campaign_id,
            claim_id = %claim_id,
            claimed = recipients.len(),
            "Processing campaign batch"
        );

        let interval = self.settings.progress_interval.max(1);
        let (mut sent, mut failed, mut processed) = (0u32, 0u32, 0u32);
        let mut recorded = 0u32;
        let mut stopped = false;
        let last = recipients.len().saturating_sub(1);

        for (index, recipient) in recipients.iter().enumerate() {
            if index > 0 && self.stop_requested(campaign_id).await {
                info!(campaign_id = %campaign_id, processed, "Campaign no longer running, stopping batch");
                stopped = true;
                break;
            }

            let outcome = self
                .process_recipient(campaign, delivery, recipient, claim_id)
                .await?;
            match outcome {
                Outcome::Sent => sent += 1,
                Outcome::Failed => failed += 1,
                Outcome::Skipped => continue,
            }
            processed += 1;

            if processed % interval == 0 || index == last {
                self.record_progress(campaign_id).await;
                recorded = processed;
            }

            if index < last {
                let delay = match outcome {
                    Outcome::Failed => self.settings.delay_after_failure,
                    _ => self.settings.delay_after_success,
                };
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        if processed != recorded {
            self.record_progress(campaign_id).await;
        }
        if stopped {
            self.release_claims(campaign_id, claim_id).await;
        }

        let remaining = self.store.count_pending_recipients(campaign_id).await?;
        if !stopped && remaining == 0 {
            self.store
                .set_campaign_status(campaign_id, CampaignStatus::Completed)
                .await?;
        }

        let has_more = !stopped && remaining > 0;
        let message = if stopped {
            format!("Stopped after {} of {} recipients", processed, recipients.len())
        } else if has_more {
            format!(
                "Sent {} emails, {} failed, {} remaining",
                sent, failed, remaining
            )
        } else {
            format!("Campaign completed: sent {} emails, {} failed", sent, failed)
        };

        info!(
            campaign_id = %campaign_id,
            sent,
            failed,
            remaining,
            stopped,
            "Campaign batch finished"
        );

        Ok(BatchReport {
            success: true,
            total: processed,
            sent,
            failed,
            remaining,
            has_more,
            stopped,
            message,
        })
    }

    /// Draft, send and record one recipient. Only a failed status write escapes.
    async fn process_recipient(
        &self,
        campaign: &Campaign,
        delivery: &DeliverySettings,
        recipient: &CampaignRecipient,
        claim_id: Uuid,
    ) -> Result<Outcome, SendError> {
        if !self.store.renew_claim(recipient.id, claim_id).await? {
            info!(
                recipient_id = %recipient.id,
                claim_id = %claim_id,
                "Recipient claimed elsewhere or no longer pending, skipping"
            );
            return Ok(Outcome::Skipped);
        }

        let profile = match self.store.resolve_recipient_profile(recipient).await {
            Ok(profile) => profile,
            Err(e) => {
                return self
                    .record_failure(recipient, claim_id, format!("recipient: {}", e))
                    .await
            }
        };

        if EmailAddress::parse(&profile.email).is_none() {
            return self
                .record_failure(
                    recipient,
                    claim_id,
                    format!("invalid_address: {}", profile.email),
                )
                .await;
        }

        let email = if campaign.has_manual_template() {
            self.renderer.render_email(
                campaign.template_subject.as_deref().unwrap_or_default(),
                campaign.template_body.as_deref().unwrap_or_default(),
                &profile,
            )
        } else {
            let Some(provider) = delivery.provider.as_ref() else {
                return Err(SendError::MissingConfiguration(vec![
                    "openai_api_key".to_string(),
                ]));
            };
            let input = EmailGenerationInput::new(campaign, profile.clone(), delivery.style.clone());
            match self.generator.generate(provider, &input).await {
                Ok(email) => email,
                Err(e) => {
                    return self
                        .record_failure(recipient, claim_id, format!("{}: {}", e.kind(), e))
                        .await
                }
            }
        };

        let GeneratedEmail { subject, body } = email;
        let outgoing = OutgoingEmail {
            from: delivery.sender(campaign.sender_name.as_deref()),
            to: profile.email.clone(),
            subject,
            text: body,
            html: None,
        };

        if let Err(e) = self.transport.send(&outgoing, &delivery.server).await {
            return self
                .record_failure(recipient, claim_id, format!("smtp: {}", e))
                .await;
        }

        let personalized = PersonalizedEmail {
            subject: outgoing.subject,
            body: outgoing.text,
        };
        let transitioned = self
            .store
            .mark_sent(recipient.id, claim_id, &personalized, Utc::now())
            .await
            .map_err(|e| {
                error!(
                    recipient_id = %recipient.id,
                    error = %e,
                    "Email sent but status write failed"
                );
                SendError::Store(e)
            })?;

        if !transitioned {
            warn!(recipient_id = %recipient.id, "Recipient claim was lost before it was marked sent");
        }
        debug!(campaign_id = %campaign.id, recipient_id = %recipient.id, "Email sent");
        Ok(Outcome::Sent)
    }

    async fn record_failure(
        &self,
        recipient: &CampaignRecipient,
        claim_id: Uuid,
        reason: String,
    ) -> Result<Outcome, SendError> {
        warn!(recipient_id = %recipient.id, reason = %reason, "Recipient failed");
        self.store
            .mark_failed(recipient.id, claim_id, &reason)
            .await?;
        Ok(Outcome::Failed)
    }

    /// Hand unprocessed rows back so the next batch need not wait out the claim TTL
    async fn release_claims(&self, campaign_id: CampaignId, claim_id: Uuid) {
        match self.store.release_claims(campaign_id, claim_id).await {
            Ok(released) if released > 0 => {
                info!(campaign_id = %campaign_id, claim_id = %claim_id, released, "Released unprocessed recipients");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(campaign_id = %campaign_id, claim_id = %claim_id, error = %e, "Failed to release claims");
            }
        }
    }

    async fn stop_requested(&self, campaign_id: CampaignId) -> bool {
        match self.store.campaign_status(campaign_id).await {
            Ok(status) => status != CampaignStatus::Running,
            Err(e) => {
                warn!(campaign_id = %campaign_id, error = %e, "Failed to re-read campaign status");
                false
            }
        }
    }

    async fn record_progress(&self, campaign_id: CampaignId) {
        let result = match self.store.recipient_counts(campaign_id).await {
            Ok(counts) => {
                let sent = i32::try_from(counts.sent).unwrap_or(i32::MAX);
                self.store.update_campaign_progress(campaign_id, sent).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(campaign_id = %campaign_id, error = %e, "Failed to record campaign progress");
        }
    }

    /// Flip the campaign to `failed` for batch-level errors, then hand the error back
    async fn fail_campaign(&self, campaign_id: CampaignId, err: SendError) -> SendError {
        if matches!(err, SendError::CampaignNotFound(_) | SendError::AlreadyCompleted(_)) {
            return err;
        }

        error!(campaign_id = %campaign_id, error = %err, "Campaign batch failed");
        if let Err(e) = self
            .store
            .set_campaign_status(campaign_id, CampaignStatus::Failed)
            .await
        {
            warn!(campaign_id = %campaign_id, error = %e, "Failed to mark campaign failed");
        }
        err
    }
}

fn campaign_error(campaign_id: CampaignId, err: outreach_common::Error) -> SendError {
    if err.is_not_found() {
        SendError::CampaignNotFound(campaign_id)
    } else {
        SendError::Store(err)
    }
}

fn blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
