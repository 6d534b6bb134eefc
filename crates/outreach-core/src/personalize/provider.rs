//! AI backend clients

use outreach_common::config::AiConfig;
use outreach_common::types::AiProviderKind;
use outreach_storage::models::UserSettings;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::GenerationError;

/// The backend selected by a user, with that user's key
#[derive(Clone)]
pub enum AiProvider {
    /// OpenAI-style chat completions
    OpenAi { api_key: String },
    /// Gemini-style generateContent
    Gemini { api_key: String },
}

impl std::fmt::Debug for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AiProvider::{}", self.kind())
    }
}

impl AiProvider {
    pub fn kind(&self) -> AiProviderKind {
        match self {
            AiProvider::OpenAi { .. } => AiProviderKind::OpenAi,
            AiProvider::Gemini { .. } => AiProviderKind::Gemini,
        }
    }

    fn api_key(&self) -> &str {
        match self {
            AiProvider::OpenAi { api_key } | AiProvider::Gemini { api_key } => api_key,
        }
    }

    /// Select the provider named in `settings` and its key
    pub fn from_settings(settings: &UserSettings) -> Result<Self, GenerationError> {
        let kind = settings.provider_kind();
        let key = match kind {
            AiProviderKind::OpenAi => settings.openai_api_key.as_deref(),
            AiProviderKind::Gemini => settings.gemini_api_key.as_deref(),
        }
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| GenerationError::MissingKey {
            provider: kind.to_string(),
        })?
        .to_string();

        Ok(match kind {
            AiProviderKind::OpenAi => AiProvider::OpenAi { api_key: key },
            AiProviderKind::Gemini => AiProvider::Gemini { api_key: key },
        })
    }
}

/// HTTP client shared by both backends
#[derive(Clone)]
pub struct AiClient {
    http: Client,
    config: AiConfig,
}

impl AiClient {
    pub fn new(config: AiConfig) -> outreach_common::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                outreach_common::Error::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { http, config })
    }

    /// One completion request. A 429 comes back as `RateLimited`; retrying
    /// is the caller's decision.
    pub async fn generate_completion(
        &self,
        provider: &AiProvider,
        system: &str,
        user: &str,
    ) -> Result<String, GenerationError> {
        if provider.api_key().trim().is_empty() {
            return Err(GenerationError::MissingKey {
                provider: provider.kind().to_string(),
            });
        }

        let request = match provider {
            AiProvider::OpenAi { api_key } => {
                let url = format!(
                    "{}/v1/chat/completions",
                    self.config.openai_url.trim_end_matches('/')
                );
                self.http
                    .post(url)
                    .bearer_auth(api_key)
                    .json(&json!({
                        "model": self.config.openai_model,
                        "messages": [
                            { "role": "system", "content": system },
                            { "role": "user", "content": user },
                        ],
                        "temperature": self.config.temperature,
                        "max_tokens": self.config.max_tokens,
                    }))
            }
            AiProvider::Gemini { api_key } => {
                let url = format!(
                    "{}/v1beta/models/{}:generateContent",
                    self.config.gemini_url.trim_end_matches('/'),
                    self.config.gemini_model
                );
                self.http
                    .post(url)
                    .query(&[("key", api_key.as_str())])
                    .json(&json!({
                        "contents": [
                            { "parts": [ { "text": format!("{}\n\n{}", system, user) } ] }
                        ],
                        "generationConfig": {
                            "temperature": self.config.temperature,
                            "maxOutputTokens": self.config.max_tokens,
                            "topP": self.config.top_p,
                            "topK": self.config.top_k,
                        },
                    }))
            }
        };

        debug!(provider = %provider.kind(), "Sending completion request");

        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited { attempts: 1 });
        }

        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::Backend {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|_| GenerationError::EmptyResponse)?;
        extract_text(&value).ok_or(GenerationError::EmptyResponse)
    }
}

/// Pull the generated text out of either response envelope:
/// `choices[0].message.content` or `candidates[0].content.parts[*].text`
pub(crate) fn extract_text(value: &Value) -> Option<String> {
    let text = if let Some(content) = value.pointer("/choices/0/message/content") {
        content.as_str().map(str::to_string)
    } else {
        value
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
    };

    text.filter(|t| !t.trim().is_empty())
}

/// Prefer the provider's `error.message`, fall back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(500).collect())
}
