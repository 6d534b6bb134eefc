//! SMTP client module
//!
//! Submission over `lettre`: implicit TLS or STARTTLS, AUTH LOGIN, one
//! envelope per connection. Every network step is bounded by a timeout and
//! failures come back as [`TransportError`].

mod client;
mod message;

pub use client::SmtpTransport;
pub use message::{build_message, text_to_html};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    /// Implicit TLS on port 465, STARTTLS everywhere else
    #[default]
    Auto,
    /// TLS from the first byte
    Implicit,
    /// Plaintext greeting, then upgrade with STARTTLS
    StartTls,
    /// No encryption. Only for trusted local relays and test servers.
    None,
}

impl TlsMode {
    /// Resolve `Auto` against the target port
    pub fn resolve(self, port: u16) -> TlsMode {
        match self {
            TlsMode::Auto if port == 465 => TlsMode::Implicit,
            TlsMode::Auto => TlsMode::StartTls,
            other => other,
        }
    }
}

/// SMTP login credentials
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Target server for one send
#[derive(Debug, Clone)]
pub struct SmtpServerConfig {
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
    pub tls: TlsMode,
}

/// Envelope sender and `From:` display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub email: String,
    pub name: Option<String>,
}

/// A fully rendered message ready to send
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: Sender,
    pub to: String,
    pub subject: String,
    pub text: String,
    /// HTML alternative; derived from `text` when absent
    pub html: Option<String>,
}

/// SMTP transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("SMTP timeout during {stage}")]
    Timeout { stage: &'static str },

    #[error("SMTP server rejected the message: {code} {message}")]
    Rejected { code: u16, message: String },

    #[error("SMTP authentication failed: {code} {message}")]
    Authentication { code: u16, message: String },

    #[error("SMTP connection to {host}:{port} failed: {message}")]
    Connection {
        host: String,
        port: u16,
        message: String,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    /// The session could not proceed, e.g. the server lacks STARTTLS
    #[error("SMTP protocol error: {0}")]
    Protocol(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Message(String),
}

impl TransportError {
    /// SMTP reply code, when the server answered
    pub fn code(&self) -> Option<u16> {
        match self {
            TransportError::Rejected { code, .. } | TransportError::Authentication { code, .. } => {
                Some(*code)
            }
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

impl From<TransportError> for outreach_common::Error {
    fn from(err: TransportError) -> Self {
        outreach_common::Error::Smtp(err.to_string())
    }
}

/// Delivers one message to one SMTP server
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(
        &self,
        email: &OutgoingEmail,
        server: &SmtpServerConfig,
    ) -> Result<(), TransportError>;
}
