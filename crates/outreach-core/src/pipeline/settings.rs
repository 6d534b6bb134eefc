//! Per-batch delivery settings
//!
//! User settings are read and validated once per batch. Anything missing
//! fails the whole batch before a single recipient is touched.

use outreach_common::types::{AiProviderKind, EmailAddress};
use outreach_storage::models::UserSettings;

use crate::personalize::{AiProvider, StylePreferences};
use crate::smtp::{Credentials, Sender, SmtpServerConfig, TlsMode};

/// Submission port used when the user leaves the port empty
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Validated settings for one batch
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub server: SmtpServerConfig,
    pub from_email: String,
    pub from_name: Option<String>,
    /// Absent only when the campaign does not need AI drafting
    pub provider: Option<AiProvider>,
    pub style: StylePreferences,
}

impl DeliverySettings {
    /// Envelope sender, falling back to `fallback_name` for the display name
    pub fn sender(&self, fallback_name: Option<&str>) -> Sender {
        Sender {
            email: self.from_email.clone(),
            name: self
                .from_name
                .clone()
                .or_else(|| fallback_name.map(str::to_string)),
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate `settings`, returning every missing field name on failure
pub fn validate_settings(
    settings: Option<&UserSettings>,
    needs_ai: bool,
    tls: TlsMode,
) -> Result<DeliverySettings, Vec<String>> {
    let Some(settings) = settings else {
        let mut missing = vec![
            "smtp_host".to_string(),
            "smtp_username".to_string(),
            "smtp_password".to_string(),
        ];
        if needs_ai {
            missing.push("openai_api_key".to_string());
        }
        return Err(missing);
    };

    let mut missing = Vec::new();

    let host = present(settings.smtp_host.as_deref());
    let username = present(settings.smtp_username.as_deref());
    // Passwords are taken verbatim; only emptiness counts as missing
    let password = settings.smtp_password.as_deref().filter(|p| !p.is_empty());

    if host.is_none() {
        missing.push("smtp_host".to_string());
    }
    if username.is_none() {
        missing.push("smtp_username".to_string());
    }
    if password.is_none() {
        missing.push("smtp_password".to_string());
    }

    let provider = if needs_ai {
        match AiProvider::from_settings(settings) {
            Ok(provider) => Some(provider),
            Err(_) => {
                missing.push(
                    match settings.provider_kind() {
                        AiProviderKind::OpenAi => "openai_api_key",
                        AiProviderKind::Gemini => "gemini_api_key",
                    }
                    .to_string(),
                );
                None
            }
        }
    } else {
        None
    };

    // The envelope sender must be a real address: the explicit override,
    // or the login when it is one
    let from_email = present(settings.smtp_from_email.as_deref())
        .or(username)
        .and_then(EmailAddress::parse)
        .map(|a| a.to_string());
    if from_email.is_none() && username.is_some() {
        missing.push("smtp_from_email".to_string());
    }

    let port = match settings.smtp_port {
        None => Some(DEFAULT_SMTP_PORT),
        Some(p) => u16::try_from(p).ok().filter(|p| *p != 0),
    };
    if port.is_none() {
        missing.push("smtp_port".to_string());
    }

    match (host, username, password, from_email, port) {
        (Some(host), Some(username), Some(password), Some(from_email), Some(port))
            if missing.is_empty() =>
        {
            Ok(DeliverySettings {
                server: SmtpServerConfig {
                    host: host.to_string(),
                    port,
                    credentials: Some(Credentials::new(username, password)),
                    tls,
                },
                from_email,
                from_name: present(settings.smtp_from_name.as_deref()).map(str::to_string),
                provider,
                style: StylePreferences::from_settings(settings),
            })
        }
        _ => Err(missing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn complete() -> UserSettings {
        UserSettings {
            smtp_host: Some("smtp.vendor.test".to_string()),
            smtp_username: Some("sales@vendor.test".to_string()),
            smtp_password: Some("s3cret".to_string()),
            openai_api_key: Some("sk-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_settings() {
        let settings = validate_settings(Some(&complete()), true, TlsMode::Auto).unwrap();
        assert_eq!(settings.server.host, "smtp.vendor.test");
        assert_eq!(settings.server.port, DEFAULT_SMTP_PORT);
        assert_eq!(settings.from_email, "sales@vendor.test");
        assert!(settings.provider.is_some());
        assert_eq!(
            settings.sender(Some("Dana")),
            Sender {
                email: "sales@vendor.test".to_string(),
                name: Some("Dana".to_string()),
            }
        );
    }

    #[test]
    fn test_missing_password_and_key() {
        let settings = UserSettings {
            smtp_password: None,
            ai_provider: Some("gemini".to_string()),
            ..complete()
        };
        let missing = validate_settings(Some(&settings), true, TlsMode::Auto).unwrap_err();
        assert_eq!(missing, vec!["smtp_password", "gemini_api_key"]);
    }

    #[test]
    fn test_manual_template_needs_no_key() {
        let settings = UserSettings {
            openai_api_key: None,
            ..complete()
        };
        let validated = validate_settings(Some(&settings), false, TlsMode::Auto).unwrap();
        assert!(validated.provider.is_none());
    }

    #[test]
    fn test_no_settings_row() {
        let missing = validate_settings(None, true, TlsMode::Auto).unwrap_err();
        assert_eq!(
            missing,
            vec!["smtp_host", "smtp_username", "smtp_password", "openai_api_key"]
        );
    }

    #[test]
    fn test_login_that_is_not_an_address_needs_from_email() {
        let settings = UserSettings {
            smtp_username: Some("apikey".to_string()),
            ..complete()
        };
        let missing = validate_settings(Some(&settings), true, TlsMode::Auto).unwrap_err();
        assert_eq!(missing, vec!["smtp_from_email"]);

        let settings = UserSettings {
            smtp_username: Some("apikey".to_string()),
            smtp_from_email: Some("hello@vendor.test".to_string()),
            smtp_from_name: Some("Vendor".to_string()),
            ..complete()
        };
        let validated = validate_settings(Some(&settings), true, TlsMode::Auto).unwrap();
        assert_eq!(validated.from_email, "hello@vendor.test");
        assert_eq!(validated.sender(Some("Dana")).name.as_deref(), Some("Vendor"));
    }
}
