//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod fido2;
pub mod health;
pub mod ui;

pub use crate::state::AppState;
pub use fido2::{
    availability_handler, credential_availability_handler, credentials_handler, features_handler,
    register_handler, result_handler, sign_handler, AvailabilityResponse, DispatchResponse,
    ResultResponse,
};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use ui::{deliver_result_handler, next_handoff_handler, UiResultRequest, UiResultResponse};
