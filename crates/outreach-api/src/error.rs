//! API error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use outreach_core::SendError;
use serde::Serialize;

/// Error response body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Missing configuration fields, for `missing_configuration`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

/// An error with its HTTP status
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.to_string(),
                message: message.into(),
                fields: None,
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<SendError> for ApiError {
    fn from(err: SendError) -> Self {
        let message = err.to_string();
        match err {
            SendError::CampaignNotFound(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "not_found", message)
            }
            SendError::AlreadyCompleted(_) => {
                ApiError::new(StatusCode::CONFLICT, "already_completed", message)
            }
            SendError::MissingConfiguration(fields) => {
                let mut error = ApiError::new(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "missing_configuration",
                    message,
                );
                error.body.fields = Some(fields);
                error
            }
            SendError::Transport(_) => {
                ApiError::new(StatusCode::BAD_GATEWAY, "transport_error", message)
            }
            SendError::Generation(_) => {
                ApiError::new(StatusCode::BAD_GATEWAY, "generation_error", message)
            }
            SendError::Store(e) => ApiError::new(
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                "store_error",
                e.to_string(),
            ),
        }
    }
}
