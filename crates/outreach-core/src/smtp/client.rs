//! SMTP submission over lettre

use async_trait::async_trait;
use lettre::transport::smtp::authentication::{Credentials as LoginCredentials, Mechanism};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::{AsyncSmtpTransportBuilder, Error as SmtpError};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use outreach_common::types::EmailAddress;
use outreach_common::Config;
use std::time::Duration;
use tracing::debug;

use super::message::build_message;
use super::{MailTransport, OutgoingEmail, SmtpServerConfig, TlsMode, TransportError};

/// Replies that only AUTH produces: auth required, mechanism too weak,
/// credentials invalid, encryption required for the mechanism
const AUTH_FAILURE_CODES: [u16; 4] = [530, 534, 535, 538];

/// Upper bound on one whole session, in multiples of the step timeout
const SESSION_STEPS: u32 = 8;

/// SMTP transport opening one `lettre` connection per message
#[derive(Clone)]
pub struct SmtpTransport {
    helo_name: String,
    timeout: Duration,
}

impl SmtpTransport {
    /// Create a transport announcing `helo_name`, with `timeout` applied to
    /// every connect and command round trip
    pub fn new(helo_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            helo_name: helo_name.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.helo_name(),
            Duration::from_secs(config.smtp.timeout_secs),
        )
    }

    /// Transport builder for `server`: implicit TLS, STARTTLS or plaintext
    fn builder(&self, server: &SmtpServerConfig) -> Result<AsyncSmtpTransportBuilder, TransportError> {
        let builder = match server.tls.resolve(server.port) {
            TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&server.host)
                .map_err(|e| TransportError::Tls(e.to_string()))?,
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&server.host)
                .map_err(|e| TransportError::Tls(e.to_string()))?,
            TlsMode::None | TlsMode::Auto => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&server.host)
            }
        };

        let mut builder = builder
            .port(server.port)
            .hello_name(ClientId::Domain(self.helo_name.clone()))
            .timeout(Some(self.timeout));

        if let Some(credentials) = &server.credentials {
            builder = builder
                .credentials(LoginCredentials::new(
                    credentials.username.clone(),
                    credentials.password.clone(),
                ))
                .authentication(vec![Mechanism::Login]);
        }

        Ok(builder)
    }
}

fn classify(err: SmtpError, server: &SmtpServerConfig) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout {
            stage: "SMTP command",
        };
    }

    if let Some(status) = err.status() {
        let code = status.to_string().parse::<u16>().unwrap_or_default();
        let message = err.to_string();
        return if AUTH_FAILURE_CODES.contains(&code) {
            TransportError::Authentication { code, message }
        } else {
            TransportError::Rejected { code, message }
        };
    }

    if err.is_tls() {
        TransportError::Tls(err.to_string())
    } else if err.is_client() {
        TransportError::Protocol(err.to_string())
    } else {
        TransportError::Connection {
            host: server.host.clone(),
            port: server.port,
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(
        &self,
        email: &OutgoingEmail,
        server: &SmtpServerConfig,
    ) -> Result<(), TransportError> {
        for address in [&email.from.email, &email.to] {
            if EmailAddress::parse(address).is_none() {
                return Err(TransportError::InvalidAddress(address.clone()));
            }
        }

        let message = build_message(email)?;
        let mailer = self.builder(server)?.build();

        debug!(host = %server.host, port = server.port, "Connecting to SMTP server");

        let result = match tokio::time::timeout(self.timeout * SESSION_STEPS, mailer.send(message)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(classify(e, server)),
            Err(_) => Err(TransportError::Timeout {
                stage: "SMTP session",
            }),
        };

        match &result {
            Ok(()) => debug!(host = %server.host, to = %email.to, "SMTP delivery accepted"),
            Err(e) => debug!(host = %server.host, to = %email.to, error = %e, "SMTP delivery failed"),
        }
        result
    }
}
