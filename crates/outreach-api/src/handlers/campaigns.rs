//! Campaign send handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use outreach_core::{BatchReport, CampaignProgress, SendError};
use outreach_storage::models::ResetScope;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{AppState, AuthContext};
use crate::error::ApiError;

/// Request body for resetting a campaign
#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub scope: ResetScope,
}

/// Reset response
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub campaign_id: Uuid,
    pub scope: ResetScope,
    pub reset: u64,
}

/// Acknowledgement for accepted or completed state changes
#[derive(Debug, Serialize)]
pub struct CampaignAck {
    pub campaign_id: Uuid,
    pub status: String,
}

/// Get campaign status and recipient counts
///
/// GET /api/v1/campaigns/:campaign_id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignProgress>, ApiError> {
    let progress = state
        .orchestrator
        .progress(campaign_id, auth.user_id)
        .await?;
    Ok(Json(progress))
}

/// Process one batch of pending recipients
///
/// POST /api/v1/campaigns/:campaign_id/send
pub async fn send_batch(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<BatchReport>, ApiError> {
    let report = state
        .orchestrator
        .run_batch(campaign_id, auth.user_id)
        .await?;
    Ok(Json(report))
}

/// Drive the campaign to completion in the background
///
/// POST /api/v1/campaigns/:campaign_id/send-all
pub async fn send_all(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<(StatusCode, Json<CampaignAck>), ApiError> {
    // Reject unknown or finished campaigns before accepting
    let progress = state
        .orchestrator
        .progress(campaign_id, auth.user_id)
        .await?;
    if progress.status == "completed" {
        return Err(SendError::AlreadyCompleted(campaign_id).into());
    }

    let driver = state.driver.clone();
    let user_id = auth.user_id;
    tokio::spawn(async move {
        match driver.run_to_completion(campaign_id, user_id).await {
            Ok(summary) => info!(
                campaign_id = %campaign_id,
                sent = summary.sent,
                failed = summary.failed,
                "Background campaign drive finished"
            ),
            Err(e) => error!(campaign_id = %campaign_id, error = %e, "Background campaign drive failed"),
        }
    });

    info!(campaign_id = %campaign_id, user_id = %user_id, "Accepted campaign drive");
    Ok((
        StatusCode::ACCEPTED,
        Json(CampaignAck {
            campaign_id,
            status: "accepted".to_string(),
        }),
    ))
}

/// Return recipients to pending
///
/// POST /api/v1/campaigns/:campaign_id/reset
pub async fn reset_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
    body: Option<Json<ResetRequest>>,
) -> Result<Json<ResetResponse>, ApiError> {
    let scope = body.map(|Json(req)| req.scope).unwrap_or_default();
    let reset = state
        .orchestrator
        .reset(campaign_id, auth.user_id, scope)
        .await?;

    Ok(Json(ResetResponse {
        campaign_id,
        scope,
        reset,
    }))
}

/// Stop a campaign
///
/// POST /api/v1/campaigns/:campaign_id/stop
pub async fn stop_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignAck>, ApiError> {
    state.orchestrator.stop(campaign_id, auth.user_id).await?;

    Ok(Json(CampaignAck {
        campaign_id,
        status: "completed".to_string(),
    }))
}
