//! Database models

use chrono::{DateTime, Utc};
use outreach_common::types::{
    AiProviderKind, CampaignId, CompanyId, ContactId, EmailLength, PersonalizationLevel,
    RecipientId, Tone, UserId,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Campaigns
// ============================================================================

/// Campaign status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CampaignStatus {
    NotStarted,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::NotStarted => write!(f, "not-started"),
            CampaignStatus::Running => write!(f, "running"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not-started" => Ok(CampaignStatus::NotStarted),
            "running" => Ok(CampaignStatus::Running),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub user_id: UserId,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub sender_name: Option<String>,
    pub sender_company: Option<String>,
    pub sender_title: Option<String>,
    pub value_proposition: Option<String>,
    pub call_to_action: Option<String>,
    pub send_at: Option<DateTime<Utc>>,
    /// "ai_draft" or "manual"
    pub template_kind: String,
    pub template_subject: Option<String>,
    pub template_body: Option<String>,
    pub status: String,
    pub emails_sent: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Build a fresh `not-started` campaign owned by `user_id`
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::now_v7(),
            user_id,
            name: name.into(),
            category: None,
            description: None,
            sender_name: None,
            sender_company: None,
            sender_title: None,
            value_proposition: None,
            call_to_action: None,
            send_at: None,
            template_kind: "ai_draft".to_string(),
            template_subject: None,
            template_body: None,
            status: CampaignStatus::NotStarted.to_string(),
            emails_sent: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }

    /// Whether the stored template was written by hand rather than drafted
    pub fn has_manual_template(&self) -> bool {
        self.template_kind == "manual"
    }
}

// ============================================================================
// Recipients
// ============================================================================

/// Recipient delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientStatus::Pending => write!(f, "pending"),
            RecipientStatus::Sent => write!(f, "sent"),
            RecipientStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RecipientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecipientStatus::Pending),
            "sent" => Ok(RecipientStatus::Sent),
            "failed" => Ok(RecipientStatus::Failed),
            _ => Err(format!("Invalid recipient status: {}", s)),
        }
    }
}

/// The exact content delivered to a recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalizedEmail {
    pub subject: String,
    pub body: String,
}

/// Campaign recipient model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignRecipient {
    pub id: RecipientId,
    pub campaign_id: CampaignId,
    pub company_id: Option<CompanyId>,
    pub contact_id: Option<ContactId>,
    pub recipient_email: Option<String>,
    pub recipient_name: Option<String>,
    pub contact_company: Option<String>,
    pub contact_industry: Option<String>,
    pub status: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub personalized_email: Option<serde_json::Value>,
    pub last_error: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claim_id: Option<uuid::Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignRecipient {
    fn blank(campaign_id: CampaignId) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::now_v7(),
            campaign_id,
            company_id: None,
            contact_id: None,
            recipient_email: None,
            recipient_name: None,
            contact_company: None,
            contact_industry: None,
            status: RecipientStatus::Pending.to_string(),
            sent_at: None,
            personalized_email: None,
            last_error: None,
            claimed_at: None,
            claim_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Pending recipient sourced from a user-owned contact
    pub fn from_contact(
        campaign_id: CampaignId,
        contact_id: ContactId,
        email: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Self {
            contact_id: Some(contact_id),
            recipient_email: Some(email.into()),
            recipient_name: name,
            ..Self::blank(campaign_id)
        }
    }

    /// Pending recipient sourced from the shared companies table
    pub fn from_company(campaign_id: CampaignId, company_id: CompanyId) -> Self {
        Self {
            company_id: Some(company_id),
            ..Self::blank(campaign_id)
        }
    }

    /// Get status enum
    pub fn status_enum(&self) -> Option<RecipientStatus> {
        self.status.parse().ok()
    }

    /// Decode the stored personalized email, if any
    pub fn personalized(&self) -> Option<PersonalizedEmail> {
        self.personalized_email
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
    }
}

/// Contact details resolved for one recipient at send time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientProfile {
    pub email: String,
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<i32>,
}

/// Per-status recipient counts for a campaign
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientCounts {
    pub total: i64,
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
}

/// Which recipients a reset returns to `pending`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    /// Only recipients whose last attempt failed
    #[default]
    Failed,
    /// Every recipient, including those already sent
    All,
}

// ============================================================================
// Companies
// ============================================================================

/// Company from the shared companies database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub email: Option<String>,
    pub contact_name: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<i32>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// User settings
// ============================================================================

/// Per-user delivery and generation settings
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: UserId,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i32>,
    pub smtp_username: Option<String>,
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
    pub smtp_from_email: Option<String>,
    pub smtp_from_name: Option<String>,
    pub ai_provider: Option<String>,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    pub email_language: Option<String>,
    pub email_tone: Option<String>,
    pub email_length: Option<String>,
    pub personalization_level: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserSettings {
    /// Selected provider, defaulting to OpenAI when unset or unknown
    pub fn provider_kind(&self) -> AiProviderKind {
        self.ai_provider
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or_default()
    }

    pub fn tone(&self) -> Tone {
        self.email_tone
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or_default()
    }

    pub fn length(&self) -> EmailLength {
        self.email_length
            .as_deref()
            .and_then(|l| l.parse().ok())
            .unwrap_or_default()
    }

    pub fn personalization(&self) -> PersonalizationLevel {
        self.personalization_level
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or_default()
    }

    /// Output language, English unless configured
    pub fn language(&self) -> String {
        self.email_language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or("English")
            .to_string()
    }
}
