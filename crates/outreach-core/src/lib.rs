//! Outreach Core - Campaign send pipeline
//!
//! This crate provides the raw SMTP client, AI-backed email
//! personalization and the batch orchestrator that ties them to the
//! recipient state store.

pub mod personalize;
pub mod pipeline;
pub mod smtp;

pub use personalize::{AiGenerator, AiProvider, EmailGenerator, GeneratedEmail, GenerationError};
pub use pipeline::{
    BatchOrchestrator, BatchReport, CampaignDriver, CampaignProgress, DriveSummary, DriverSettings,
    OrchestratorSettings, SendError,
};
pub use smtp::{MailTransport, SmtpTransport, TransportError};
