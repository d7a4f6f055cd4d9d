//! FIDO2 service handlers
//!
//! Inbound side of the broker: register/sign dispatch, availability queries,
//! credential listing, feature advertisement and result collection.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64URL},
    Engine,
};
use fido_broker_core::{
    AuthenticatorResult, Credential, ErrorKind, Feature, RequestKind, ServiceReply,
    StatusCode as BrokerStatus,
};
use serde::Serialize;

use crate::error::ApiError;
use crate::mailbox::Collected;
use crate::state::AppState;

/// Response for an accepted register or sign request
#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub status: BrokerStatus,
    pub session_id: String,
    /// Handle to poll `/v1/fido2/results/{handle}` with
    pub handle: String,
    /// An identical request was already in flight
    pub reused: bool,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub rp_id: String,
    /// Base64url credential id
    pub id: String,
}

impl From<&Credential> for CredentialResponse {
    fn from(credential: &Credential) -> Self {
        Self {
            rp_id: credential.rp_id.clone(),
            id: BASE64URL.encode(&credential.id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeaturesResponse {
    pub features: &'static [Feature],
}

/// Outcome of a ceremony as reported to the polling caller
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub status: &'static str,
    pub session_id: String,
    /// Base64 attestation or assertion, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResultResponse {
    fn pending(session_id: String) -> Self {
        Self {
            status: "PENDING",
            session_id,
            data: None,
            error_kind: None,
            message: None,
        }
    }

    fn ready(session_id: String, result: &AuthenticatorResult) -> Self {
        let mut response = Self {
            status: result.status().as_str(),
            session_id,
            data: None,
            error_kind: None,
            message: None,
        };
        match result {
            AuthenticatorResult::Success { data } => response.data = Some(BASE64.encode(data)),
            AuthenticatorResult::Cancelled => {}
            AuthenticatorResult::Error { kind, message } => {
                response.error_kind = Some(*kind);
                response.message = Some(message.clone());
            }
        }
        response
    }
}

fn accept(state: &AppState, reply: ServiceReply) -> Result<Json<DispatchResponse>, ApiError> {
    let Some(dispatch) = reply.dispatch else {
        return Err(ApiError::Rejected(reply.status));
    };

    let response = DispatchResponse {
        status: reply.status,
        session_id: dispatch.session_id.to_string(),
        handle: dispatch.token.to_string(),
        reused: dispatch.reused,
    };
    state.mailbox.deposit(dispatch);
    Ok(Json(response))
}

async fn dispatch(
    state: AppState,
    kind: RequestKind,
    body: Bytes,
) -> Result<Json<DispatchResponse>, ApiError> {
    if !state.service.is_started() {
        return Err(ApiError::service_unavailable("broker is not running"));
    }

    let reply = match kind {
        RequestKind::Register => state.service.register_request(&body),
        RequestKind::Sign => state.service.sign_request(&body),
    };
    accept(&state, reply)
}

/// POST /v1/fido2/register - Dispatch a credential creation request
///
/// Body is the options wire form (`application/octet-stream`).
pub async fn register_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DispatchResponse>, ApiError> {
    dispatch(state, RequestKind::Register, body).await
}

/// POST /v1/fido2/sign - Dispatch an assertion request
pub async fn sign_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DispatchResponse>, ApiError> {
    dispatch(state, RequestKind::Sign, body).await
}

/// GET /v1/fido2/availability
pub async fn availability_handler(State(state): State<AppState>) -> Json<AvailabilityResponse> {
    Json(AvailabilityResponse {
        available: state.service.is_platform_authenticator_available(),
    })
}

/// GET /v1/fido2/availability/{rp_id}/{credential_id}
///
/// `credential_id` is base64url without padding.
pub async fn credential_availability_handler(
    State(state): State<AppState>,
    Path((rp_id, credential_id)): Path<(String, String)>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let credential_id = BASE64URL
        .decode(credential_id.as_bytes())
        .map_err(|e| ApiError::bad_request(format!("Invalid credential id: {e}")))?;

    Ok(Json(AvailabilityResponse {
        available: state
            .service
            .is_platform_authenticator_available_for_credential(&rp_id, &credential_id),
    }))
}

/// GET /v1/fido2/credentials/{rp_id}
pub async fn credentials_handler(
    State(state): State<AppState>,
    Path(rp_id): Path<String>,
) -> Json<Vec<CredentialResponse>> {
    Json(
        state
            .service
            .credential_list(&rp_id)
            .iter()
            .map(CredentialResponse::from)
            .collect(),
    )
}

/// GET /v1/fido2/features
pub async fn features_handler(State(state): State<AppState>) -> Json<FeaturesResponse> {
    Json(FeaturesResponse {
        features: state.service.features(),
    })
}

/// GET /v1/fido2/results/{handle} - Collect a ceremony outcome
///
/// Answers 202 while the ceremony runs and 200 once it has an outcome.
pub async fn result_handler(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Response, ApiError> {
    match state.mailbox.collect(&handle) {
        Collected::Pending(session_id) => Ok((
            StatusCode::ACCEPTED,
            Json(ResultResponse::pending(session_id.to_string())),
        )
            .into_response()),
        Collected::Ready(session_id, result) => {
            Ok(Json(ResultResponse::ready(session_id.to_string(), &result)).into_response())
        }
        Collected::Unknown => Err(ApiError::not_found(format!("No request with handle {handle}"))),
    }
}
