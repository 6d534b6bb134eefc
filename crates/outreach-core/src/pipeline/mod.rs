//! Campaign send pipeline
//!
//! [`BatchOrchestrator`] processes one bounded slice of pending recipients
//! per call. [`CampaignDriver`] re-invokes it until nothing is pending,
//! backing off when a batch fails.

mod driver;
mod orchestrator;
mod settings;

pub use driver::{CampaignDriver, DriveSummary, DriverSettings};
pub use orchestrator::{BatchOrchestrator, BatchReport, CampaignProgress, OrchestratorSettings};
pub use settings::{validate_settings, DeliverySettings, DEFAULT_SMTP_PORT};

use outreach_common::types::CampaignId;
use thiserror::Error;

use crate::personalize::GenerationError;
use crate::smtp::TransportError;

/// Batch-level send errors
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Campaign {0} not found")]
    CampaignNotFound(CampaignId),

    #[error("Campaign {0} is already completed")]
    AlreadyCompleted(CampaignId),

    #[error("Missing configuration: {}", .0.join(", "))]
    MissingConfiguration(Vec<String>),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Store error: {0}")]
    Store(outreach_common::Error),
}

impl SendError {
    /// Whether re-invoking the batch later could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SendError::CampaignNotFound(_)
            | SendError::AlreadyCompleted(_)
            | SendError::MissingConfiguration(_) => false,
            SendError::Generation(e) => e.is_retryable(),
            SendError::Transport(_) | SendError::Store(_) => true,
        }
    }
}

impl From<outreach_common::Error> for SendError {
    fn from(err: outreach_common::Error) -> Self {
        SendError::Store(err)
    }
}

impl From<SendError> for outreach_common::Error {
    fn from(err: SendError) -> Self {
        match err {
            SendError::CampaignNotFound(id) => {
                outreach_common::Error::NotFound(format!("Campaign {} not found", id))
            }
            SendError::MissingConfiguration(fields) => outreach_common::Error::Config(format!(
                "Missing configuration: {}",
                fields.join(", ")
            )),
            SendError::Transport(e) => e.into(),
            SendError::Generation(e) => e.into(),
            SendError::Store(e) => e,
            other => outreach_common::Error::Validation(other.to_string()),
        }
    }
}
