//! Outbound call creation API.

use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Request body for `POST /calls`.
#[derive(Debug, Deserialize)]
pub struct CreateCallRequest {
    /// Destination number. Falls back to the configured default when absent.
    #[serde(default)]
    pub to: Option<String>,
    /// Opening line the bot speaks when the callee answers.
    pub message: String,
}

/// Response body for a successfully created call.
#[derive(Debug, Serialize)]
pub struct CreateCallResponse {
    #[serde(rename = "callSid")]
    pub call_sid: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("call creation failed: {0}")]
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Handler for `POST /calls` — place an outbound call that opens with the
/// given message.
pub async fn create_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<CreateCallRequest>,
) -> Result<Json<CreateCallResponse>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let sid = state
        .launcher
        .create_call(request.to.as_deref(), message)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "outbound call creation failed");
            ApiError::Upstream(e.to_string())
        })?;

    tracing::info!(call_sid = %sid, "outbound call created");
    Ok(Json(CreateCallResponse { call_sid: sid }))
}
