//! Personalized email generation
//!
//! Builds a copywriting prompt from campaign and recipient details, sends
//! it to the user's chosen AI backend and parses the `SUBJECT:` / `BODY:`
//! reply into a draft.

mod generator;
mod parser;
mod prompt;
mod provider;
mod template;

pub use generator::AiGenerator;
pub use parser::{parse_completion, DEFAULT_SUBJECT};
pub use prompt::{system_prompt, user_prompt};
pub use provider::{AiClient, AiProvider};
pub use template::TemplateRenderer;

use async_trait::async_trait;
use outreach_common::types::{EmailLength, PersonalizationLevel, Tone};
use outreach_storage::models::{Campaign, RecipientProfile, UserSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Campaign fields that shape the copy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignBrief {
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub value_proposition: Option<String>,
    pub call_to_action: Option<String>,
}

/// Who the email is from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
}

/// User writing preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylePreferences {
    pub language: String,
    pub tone: Tone,
    pub length: EmailLength,
    pub personalization: PersonalizationLevel,
}

impl Default for StylePreferences {
    fn default() -> Self {
        Self {
            language: "English".to_string(),
            tone: Tone::default(),
            length: EmailLength::default(),
            personalization: PersonalizationLevel::default(),
        }
    }
}

impl StylePreferences {
    pub fn from_settings(settings: &UserSettings) -> Self {
        Self {
            language: settings.language(),
            tone: settings.tone(),
            length: settings.length(),
            personalization: settings.personalization(),
        }
    }
}

/// Everything needed to draft one recipient's email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailGenerationInput {
    pub campaign: CampaignBrief,
    pub sender: SenderIdentity,
    pub recipient: RecipientProfile,
    pub style: StylePreferences,
}

impl EmailGenerationInput {
    pub fn new(
        campaign: &Campaign,
        recipient: RecipientProfile,
        style: StylePreferences,
    ) -> Self {
        Self {
            campaign: CampaignBrief {
                name: campaign.name.clone(),
                category: campaign.category.clone(),
                description: campaign.description.clone(),
                value_proposition: campaign.value_proposition.clone(),
                call_to_action: campaign.call_to_action.clone(),
            },
            sender: SenderIdentity {
                name: campaign.sender_name.clone(),
                company: campaign.sender_company.clone(),
                title: campaign.sender_title.clone(),
            },
            recipient,
            style,
        }
    }
}

/// A drafted email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedEmail {
    pub subject: String,
    pub body: String,
}

/// Generation errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No API key configured for {provider}")]
    MissingKey { provider: String },

    #[error("AI backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("AI backend rate limit persisted after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("AI response contained no usable content")]
    EmptyResponse,

    #[error("AI request failed: {0}")]
    Network(String),
}

impl GenerationError {
    /// Coarse category used in recipient failure reasons and logs
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::MissingKey { .. } => "missing_key",
            GenerationError::EmptyResponse => "empty_response",
            GenerationError::Backend { .. }
            | GenerationError::RateLimited { .. }
            | GenerationError::Network(_) => "backend_error",
        }
    }

    /// Whether a later attempt could succeed without a configuration change
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::RateLimited { .. } | GenerationError::Network(_) => true,
            GenerationError::Backend { status, .. } => *status >= 500,
            GenerationError::MissingKey { .. } | GenerationError::EmptyResponse => false,
        }
    }
}

impl From<GenerationError> for outreach_common::Error {
    fn from(err: GenerationError) -> Self {
        outreach_common::Error::Generation(err.to_string())
    }
}

/// Drafts one email per call
#[async_trait]
pub trait EmailGenerator: Send + Sync {
    async fn generate(
        &self,
        provider: &AiProvider,
        input: &EmailGenerationInput,
    ) -> Result<GeneratedEmail, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            GenerationError::MissingKey {
                provider: "openai".into()
            }
            .kind(),
            "missing_key"
        );
        assert_eq!(GenerationError::EmptyResponse.kind(), "empty_response");
        assert_eq!(GenerationError::RateLimited { attempts: 3 }.kind(), "backend_error");

        assert!(GenerationError::Network("reset".into()).is_retryable());
        assert!(GenerationError::Backend {
            status: 503,
            message: "overloaded".into()
        }
        .is_retryable());
        assert!(!GenerationError::Backend {
            status: 401,
            message: "bad key".into()
        }
        .is_retryable());
        assert!(!GenerationError::EmptyResponse.is_retryable());
    }

    #[test]
    fn test_input_from_campaign() {
        let mut campaign = Campaign::new(uuid::Uuid::new_v4(), "Q3 pilots");
        campaign.sender_name = Some("Dana".to_string());
        campaign.value_proposition = Some("Cut invoice processing time in half".to_string());

        let settings = UserSettings {
            email_tone: Some("formal".to_string()),
            ..Default::default()
        };
        let input = EmailGenerationInput::new(
            &campaign,
            RecipientProfile {
                email: "cfo@acme.test".to_string(),
                name: Some("Jo".to_string()),
                company_name: Some("Acme".to_string()),
                industry: None,
                employee_count: None,
            },
            StylePreferences::from_settings(&settings),
        );

        assert_eq!(input.campaign.name, "Q3 pilots");
        assert_eq!(input.sender.name.as_deref(), Some("Dana"));
        assert_eq!(input.style.tone, Tone::Formal);
        assert_eq!(input.style.language, "English");
    }
}
