//! AI-backed email generator with rate-limit backoff

use async_trait::async_trait;
use outreach_common::config::AiConfig;
use std::time::Duration;
use tracing::{debug, warn};

use super::parser::parse_completion;
use super::prompt::{system_prompt, user_prompt};
use super::provider::{AiClient, AiProvider};
use super::{EmailGenerationInput, EmailGenerator, GeneratedEmail, GenerationError};

/// Drafts emails through [`AiClient`], retrying 429 responses
#[derive(Clone)]
pub struct AiGenerator {
    client: AiClient,
    max_attempts: u32,
    backoff_base: Duration,
}

impl AiGenerator {
    pub fn new(config: &AiConfig) -> outreach_common::Result<Self> {
        Ok(Self {
            client: AiClient::new(config.clone())?,
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        })
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt)
    }
}

#[async_trait]
impl EmailGenerator for AiGenerator {
    async fn generate(
        &self,
        provider: &AiProvider,
        input: &EmailGenerationInput,
    ) -> Result<GeneratedEmail, GenerationError> {
        let system = system_prompt(input);
        let user = user_prompt(input);

        let mut attempt = 0;
        let raw = loop {
            match self.client.generate_completion(provider, &system, &user).await {
                Ok(raw) => break raw,
                Err(GenerationError::RateLimited { .. }) if attempt + 1 < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        provider = %provider.kind(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "AI backend rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(GenerationError::RateLimited { .. }) => {
                    return Err(GenerationError::RateLimited {
                        attempts: self.max_attempts,
                    });
                }
                Err(e) => return Err(e),
            }
        };

        let email = parse_completion(&raw)?;
        debug!(
            provider = %provider.kind(),
            subject_len = email.subject.chars().count(),
            "Generated personalized email"
        );
        Ok(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personalize::{CampaignBrief, SenderIdentity, StylePreferences};
    use outreach_storage::models::RecipientProfile;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn input() -> EmailGenerationInput {
        EmailGenerationInput {
            campaign: CampaignBrief {
                name: "Pilot".to_string(),
                ..Default::default()
            },
            sender: SenderIdentity::default(),
            recipient: RecipientProfile {
                email: "jo@acme.test".to_string(),
                name: Some("Jo".to_string()),
                company_name: Some("Acme".to_string()),
                industry: None,
                employee_count: None,
            },
            style: StylePreferences::default(),
        }
    }

    fn generator(server: &MockServer) -> AiGenerator {
        AiGenerator::new(&AiConfig {
            openai_url: server.uri(),
            max_attempts: 3,
            backoff_base_ms: 1,
            ..Default::default()
        })
        .unwrap()
    }

    fn openai() -> AiProvider {
        AiProvider::OpenAi {
            api_key: "sk-test".to_string(),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let generator = AiGenerator::new(&AiConfig::default()).unwrap();
        assert_eq!(generator.backoff(0), Duration::from_secs(2));
        assert_eq!(generator.backoff(1), Duration::from_secs(4));
        assert_eq!(generator.backoff(2), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_retries_rate_limit_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [ { "message": { "content": "SUBJECT: Idea for Acme\nBODY:\nHi Jo,\nA thought." } } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let email = generator(&server).generate(&openai(), &input()).await.unwrap();
        assert_eq!(
            email,
            GeneratedEmail {
                subject: "Idea for Acme".to_string(),
                body: "Hi Jo,\nA thought.".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let err = generator(&server)
            .generate(&openai(), &input())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::RateLimited { attempts: 3 }));
        assert_eq!(err.kind(), "backend_error");
    }

    #[tokio::test]
    async fn test_backend_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .expect(1)
            .mount(&server)
            .await;

        let err = generator(&server)
            .generate(&openai(), &input())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Backend { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_missing_key_never_calls_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = generator(&server)
            .generate(
                &AiProvider::Gemini {
                    api_key: String::new(),
                },
                &input(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "missing_key");
    }
}
