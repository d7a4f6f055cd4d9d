//! UI collaborator handlers
//!
//! The interactive UI polls for hand-offs and reports ceremony results here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use fido_broker_core::{
    AuthenticatorResult, CorrelationToken, ErrorKind, IgnoreReason, RouteOutcome, SessionStatus,
};
use serde::{Deserialize, Serialize};

use crate::collaborator::HandOffMessage;
use crate::error::ApiError;
use crate::state::AppState;

/// Result reported by the UI
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiResultRequest {
    /// `data` is base64 of the attestation or assertion
    Success { data: String },
    Cancelled,
    Error {
        kind: ErrorKind,
        #[serde(default)]
        message: String,
    },
}

impl UiResultRequest {
    fn into_result(self) -> Result<AuthenticatorResult, ApiError> {
        Ok(match self {
            Self::Success { data } => AuthenticatorResult::success(
                BASE64
                    .decode(data.as_bytes())
                    .map_err(|e| ApiError::bad_request(format!("Invalid result data: {e}")))?,
            ),
            Self::Cancelled => AuthenticatorResult::Cancelled,
            Self::Error { kind, message } => AuthenticatorResult::error(kind, message),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UiResultResponse {
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<IgnoreReason>,
}

/// GET /v1/ui/handoffs/next - Take the next queued hand-off
///
/// Answers 204 when nothing is queued.
pub async fn next_handoff_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let Some(queue) = &state.handoffs else {
        return Err(ApiError::not_found("hand-offs are pushed to the UI callback"));
    };

    let next = queue.lock().await.try_recv().ok();
    Ok(match next {
        Some(handoff) => Json(HandOffMessage::from(&handoff)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// POST /v1/ui/results/{handle} - Deliver a ceremony result
///
/// Results for unknown or finished requests are accepted and dropped.
pub async fn deliver_result_handler(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    Json(request): Json<UiResultRequest>,
) -> Result<Json<UiResultResponse>, ApiError> {
    let token = CorrelationToken::parse(&handle)
        .ok_or_else(|| ApiError::bad_request("Malformed handle"))?;
    let result = request.into_result()?;

    let response = match state.service.on_external_result(&token, result) {
        RouteOutcome::Delivered(status) => UiResultResponse {
            delivered: true,
            session_status: Some(status),
            reason: None,
        },
        RouteOutcome::Ignored(reason) => UiResultResponse {
            delivered: false,
            session_status: None,
            reason: Some(reason),
        },
    };
    Ok(Json(response))
}
