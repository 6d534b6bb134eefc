//! Campaign driver
//!
//! Re-invokes the orchestrator until the campaign has nothing pending.
//! Failed batches are retried with exponential backoff; the orchestrator
//! itself never retries.

use outreach_common::config::DriverConfig;
use outreach_common::types::{CampaignId, UserId};
use outreach_storage::models::CampaignStatus;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

use super::orchestrator::BatchOrchestrator;
use super::SendError;

/// Retry policy for failed batches
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Consecutive failed batches before giving up
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from_config(&DriverConfig::default())
    }
}

impl DriverSettings {
    pub fn from_config(config: &DriverConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_secs(config.base_delay_secs),
        }
    }

    /// Delay after failure number `failure` (0-based): `base * 2^failure`
    pub fn backoff(&self, failure: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(failure)
    }
}

/// Totals across every batch of one drive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriveSummary {
    pub batches: u32,
    pub sent: u32,
    pub failed: u32,
    /// Nothing was left pending when the drive ended
    pub completed: bool,
    /// The campaign was stopped while the drive was running
    pub stopped: bool,
}

/// Runs a campaign batch after batch
#[derive(Clone)]
pub struct CampaignDriver {
    orchestrator: BatchOrchestrator,
    settings: DriverSettings,
}

impl CampaignDriver {
    pub fn new(orchestrator: BatchOrchestrator, settings: DriverSettings) -> Self {
        Self {
            orchestrator,
            settings,
        }
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.orchestrator
    }

    /// Run batches until none remain, the campaign is stopped, or retries run out
    pub async fn run_to_completion(
        &self,
        campaign_id: CampaignId,
        user_id: UserId,
    ) -> Result<DriveSummary, SendError> {
        let mut summary = DriveSummary::default();
        let mut failures = 0u32;
        let mut last_error: Option<SendError> = None;

        loop {
            let err = match self.orchestrator.run_batch(campaign_id, user_id).await {
                Ok(report) => {
                    summary.batches += 1;
                    summary.sent += report.sent;
                    summary.failed += report.failed;

                    if report.stopped {
                        summary.stopped = true;
                        break;
                    }
                    if !report.has_more {
                        summary.completed = true;
                        break;
                    }
                    if report.total > 0 {
                        failures = 0;
                        last_error = None;
                        continue;
                    }
                    match last_error.take() {
                        // A retry that claims nothing has not recovered
                        Some(e) => e,
                        None => {
                            // Everything pending is claimed by another run
                            info!(
                                campaign_id = %campaign_id,
                                remaining = report.remaining,
                                "No recipients claimable, ending drive"
                            );
                            break;
                        }
                    }
                }
                Err(SendError::AlreadyCompleted(_)) if summary.batches > 0 => {
                    summary.stopped = true;
                    break;
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            failures += 1;
            if failures >= self.settings.max_attempts {
                error!(
                    campaign_id = %campaign_id,
                    attempts = failures,
                    error = %err,
                    "Campaign batch failed repeatedly, giving up"
                );
                if let Err(status_err) = self
                    .orchestrator
                    .store()
                    .set_campaign_status(campaign_id, CampaignStatus::Failed)
                    .await
                {
                    warn!(campaign_id = %campaign_id, error = %status_err, "Failed to mark campaign failed");
                }
                return Err(err);
            }

            let delay = self.settings.backoff(failures - 1);
            warn!(
                campaign_id = %campaign_id,
                attempt = failures,
                delay_secs = delay.as_secs(),
                error = %err,
                "Campaign batch failed, retrying"
            );
            last_error = Some(err);
            tokio::time::sleep(delay).await;
        }

        info!(
            campaign_id = %campaign_id,
            batches = summary.batches,
            sent = summary.sent,
            failed = summary.failed,
            completed = summary.completed,
            "Campaign drive finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personalize::{
        AiProvider, EmailGenerationInput, EmailGenerator, GeneratedEmail, GenerationError,
    };
    use crate::pipeline::OrchestratorSettings;
    use crate::smtp::{MailTransport, OutgoingEmail, SmtpServerConfig, TlsMode, TransportError};
    use async_trait::async_trait;
    use chrono::Utc;
    use outreach_storage::models::{Campaign, CampaignRecipient, UserSettings};
    use outreach_storage::{MemoryStore, RecipientStore};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use uuid::Uuid;

    struct EchoGenerator;

    #[async_trait]
    impl EmailGenerator for EchoGenerator {
        async fn generate(
            &self,
            _provider: &AiProvider,
            input: &EmailGenerationInput,
        ) -> Result<GeneratedEmail, GenerationError> {
            Ok(GeneratedEmail {
                subject: "Hello".to_string(),
                body: format!("Hi {}", input.recipient.email),
            })
        }
    }

    struct NullTransport;

    #[async_trait]
    impl MailTransport for NullTransport {
        async fn send(
            &self,
            _email: &OutgoingEmail,
            _server: &SmtpServerConfig,
        ) -> Result<(), TransportError> {
            Ok(())
        }
    }

    async fn setup(
        store: Arc<MemoryStore>,
        recipients: usize,
        smtp_password: Option<&str>,
    ) -> (CampaignId, UserId) {
        let user_id = Uuid::new_v4();
        let campaign = Campaign::new(user_id, "Driver");
        let campaign_id = campaign.id;
        store.insert_campaign(campaign).await;
        store
            .insert_settings(UserSettings {
                user_id,
                smtp_host: Some("smtp.vendor.test".to_string()),
                smtp_username: Some("sales@vendor.test".to_string()),
                smtp_password: smtp_password.map(str::to_string),
                openai_api_key: Some("sk-test".to_string()),
                ..Default::default()
            })
            .await;

        let base = Utc::now() - chrono::Duration::hours(1);
        for i in 0..recipients {
            let mut r = CampaignRecipient::from_contact(
                campaign_id,
                Uuid::new_v4(),
                format!("lead{}@acme.test", i),
                None,
            );
            r.created_at = base + chrono::Duration::seconds(i as i64);
            store.insert_recipient(r).await;
        }
        (campaign_id, user_id)
    }

    fn driver(store: Arc<MemoryStore>, batch_size: u32) -> CampaignDriver {
        let orchestrator = BatchOrchestrator::new(
            store.clone(),
            store,
            Arc::new(NullTransport),
            Arc::new(EchoGenerator),
            OrchestratorSettings {
                batch_size: Some(batch_size),
                progress_interval: 5,
                delay_after_success: Duration::ZERO,
                delay_after_failure: Duration::ZERO,
                tls: TlsMode::None,
            },
        );
        CampaignDriver::new(orchestrator, DriverSettings::default())
    }

    #[test]
    fn test_backoff_schedule() {
        let settings = DriverSettings::default();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.backoff(0), Duration::from_secs(5));
        assert_eq!(settings.backoff(1), Duration::from_secs(10));
        assert_eq!(settings.backoff(2), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_drives_until_nothing_pending() {
        let store = Arc::new(MemoryStore::new());
        let (campaign_id, user_id) = setup(store.clone(), 30, Some("s3cret")).await;

        let summary = driver(store.clone(), 10)
            .run_to_completion(campaign_id, user_id)
            .await
            .unwrap();
        assert_eq!(
            summary,
            DriveSummary {
                batches: 3,
                sent: 30,
                failed: 0,
                completed: true,
                stopped: false,
            }
        );
        assert_eq!(
            store.campaign_status(campaign_id).await.unwrap(),
            CampaignStatus::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_configuration_is_not_retried() {
        let store = Arc::new(MemoryStore::new());
        let (campaign_id, user_id) = setup(store.clone(), 2, None).await;

        let started = tokio::time::Instant::now();
        let err = driver(store.clone(), 10)
            .run_to_completion(campaign_id, user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::MissingConfiguration(_)));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(
            store.campaign_status(campaign_id).await.unwrap(),
            CampaignStatus::Failed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_repeated_failures() {
        let store = Arc::new(MemoryStore::new());
        let (campaign_id, user_id) = setup(store.clone(), 2, Some("s3cret")).await;
        store.set_fail_status_writes(true);

        let started = tokio::time::Instant::now();
        let err = driver(store.clone(), 10)
            .run_to_completion(campaign_id, user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::Store(_)));
        // 5s after the first failure, 10s after the second, none after the last
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));
        assert_eq!(
            store.campaign_status(campaign_id).await.unwrap(),
            CampaignStatus::Failed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let store = Arc::new(MemoryStore::new());
        let (campaign_id, user_id) = setup(store.clone(), 3, Some("s3cret")).await;
        store.set_fail_status_writes(true);

        let healer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            healer.set_fail_status_writes(false);
        });

        let summary = driver(store.clone(), 10)
            .run_to_completion(campaign_id, user_id)
            .await
            .unwrap();
        assert!(summary.completed);
        assert_eq!(summary.sent, 3);
        assert_eq!(
            store.campaign_status(campaign_id).await.unwrap(),
            CampaignStatus::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_single_failed_write_completes() {
        let store = Arc::new(MemoryStore::new());
        let (campaign_id, user_id) = setup(store.clone(), 5, Some("s3cret")).await;
        store.fail_next_status_writes(1);

        let summary = driver(store.clone(), 10)
            .run_to_completion(campaign_id, user_id)
            .await
            .unwrap();
        assert!(summary.completed);
        assert_eq!(summary.batches, 1);
        assert_eq!(store.count_pending_recipients(campaign_id).await.unwrap(), 0);
        assert_eq!(
            store.campaign_status(campaign_id).await.unwrap(),
            CampaignStatus::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_claimable_after_failure_keeps_retrying() {
        let store = Arc::new(MemoryStore::new());
        let (campaign_id, user_id) = setup(store.clone(), 3, Some("s3cret")).await;
        store.fail_next_status_writes(1);

        // Another run grabs every row while the driver backs off
        let other = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            other
                .load_pending_recipients(campaign_id, Uuid::new_v4(), None)
                .await
                .unwrap();
        });

        let started = tokio::time::Instant::now();
        let err = driver(store.clone(), 10)
            .run_to_completion(campaign_id, user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::Store(_)));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));
        assert_eq!(
            store.campaign_status(campaign_id).await.unwrap(),
            CampaignStatus::Failed
        );
        assert_eq!(store.count_pending_recipients(campaign_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_stopped_campaign_is_not_driven() {
        let store = Arc::new(MemoryStore::new());
        let (campaign_id, user_id) = setup(store.clone(), 4, Some("s3cret")).await;
        let driver = driver(store.clone(), 2);

        let report = driver
            .orchestrator()
            .run_batch(campaign_id, user_id)
            .await
            .unwrap();
        assert!(report.has_more);
        driver.orchestrator().stop(campaign_id, user_id).await.unwrap();

        // A stopped campaign refuses the first batch outright
        let err = driver.run_to_completion(campaign_id, user_id).await.unwrap_err();
        assert!(matches!(err, SendError::AlreadyCompleted(_)));
    }
}
