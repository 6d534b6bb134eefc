//! Common types for Outreach

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for users
pub type UserId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for campaign recipients
pub type RecipientId = Uuid;

/// Unique identifier for companies in the shared database
pub type CompanyId = Uuid;

/// Unique identifier for user-owned contacts
pub type ContactId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress {
    pub local: String,
    pub domain: String,
}

impl EmailAddress {
    /// Create a new email address
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            domain: domain.into(),
        }
    }

    /// Parse an email address from a string.
    ///
    /// Rejects whitespace, angle brackets and CR/LF so the value is safe to
    /// place inside `MAIL FROM:<..>` / `RCPT TO:<..>`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.chars()
            .any(|c| c.is_whitespace() || c == '<' || c == '>' || c.is_control())
        {
            return None;
        }

        let (local, domain) = s.rsplit_once('@')?;
        if local.is_empty() || domain.is_empty() || domain.starts_with('.') || domain.ends_with('.')
        {
            return None;
        }
        if !domain.contains('.') {
            return None;
        }

        Some(Self::new(local, domain))
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

/// Writing tone requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Casual,
    #[default]
    Professional,
    Formal,
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tone::Casual => write!(f, "casual"),
            Tone::Professional => write!(f, "professional"),
            Tone::Formal => write!(f, "formal"),
        }
    }
}

impl std::str::FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "casual" => Ok(Tone::Casual),
            "professional" => Ok(Tone::Professional),
            "formal" => Ok(Tone::Formal),
            _ => Err(format!("Invalid tone: {}", s)),
        }
    }
}

/// Target body length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl EmailLength {
    /// Inclusive word band the body should land in
    pub fn word_range(&self) -> (u32, u32) {
        match self {
            EmailLength::Short => (50, 100),
            EmailLength::Medium => (100, 150),
            EmailLength::Long => (150, 200),
        }
    }
}

impl std::fmt::Display for EmailLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailLength::Short => write!(f, "short"),
            EmailLength::Medium => write!(f, "medium"),
            EmailLength::Long => write!(f, "long"),
        }
    }
}

impl std::str::FromStr for EmailLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(EmailLength::Short),
            "medium" => Ok(EmailLength::Medium),
            "long" => Ok(EmailLength::Long),
            _ => Err(format!("Invalid email length: {}", s)),
        }
    }
}

/// How much recipient-specific detail the copy should carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalizationLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for PersonalizationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersonalizationLevel::Low => write!(f, "low"),
            PersonalizationLevel::Medium => write!(f, "medium"),
            PersonalizationLevel::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for PersonalizationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(PersonalizationLevel::Low),
            "medium" => Ok(PersonalizationLevel::Medium),
            "high" => Ok(PersonalizationLevel::High),
            _ => Err(format!("Invalid personalization level: {}", s)),
        }
    }
}

/// AI backend selected in user settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiProviderKind {
    #[default]
    OpenAi,
    Gemini,
}

impl std::fmt::Display for AiProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiProviderKind::OpenAi => write!(f, "openai"),
            AiProviderKind::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for AiProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" => Ok(AiProviderKind::OpenAi),
            "gemini" => Ok(AiProviderKind::Gemini),
            _ => Err(format!("Invalid AI provider: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_address_parse() {
        let email = EmailAddress::parse("jane.doe@example.com").unwrap();
        assert_eq!(email.local, "jane.doe");
        assert_eq!(email.domain, "example.com");
        assert_eq!(email.to_string(), "jane.doe@example.com");

        let padded = EmailAddress::parse("  ops@acme.io ").unwrap();
        assert_eq!(padded.to_string(), "ops@acme.io");
    }

    #[test]
    fn test_email_address_invalid() {
        assert!(EmailAddress::parse("invalid").is_none());
        assert!(EmailAddress::parse("@example.com").is_none());
        assert!(EmailAddress::parse("user@").is_none());
        assert!(EmailAddress::parse("user@localhost").is_none());
        assert!(EmailAddress::parse("a b@example.com").is_none());
        assert!(EmailAddress::parse("x@example.com>\r\nRCPT TO:<y@evil.com").is_none());
    }

    #[test]
    fn test_style_enums_parse() {
        assert_eq!("Casual".parse::<Tone>().unwrap(), Tone::Casual);
        assert_eq!("long".parse::<EmailLength>().unwrap(), EmailLength::Long);
        assert_eq!(
            "HIGH".parse::<PersonalizationLevel>().unwrap(),
            PersonalizationLevel::High
        );
        assert_eq!("gemini".parse::<AiProviderKind>().unwrap(), AiProviderKind::Gemini);
        assert!("chatty".parse::<Tone>().is_err());
        assert_eq!(AiProviderKind::OpenAi.to_string(), "openai");
        assert_eq!(EmailLength::Short.word_range(), (50, 100));
    }
}
