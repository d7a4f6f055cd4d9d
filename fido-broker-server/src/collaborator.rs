//! UI collaborator transports
//!
//! Hand-offs either wait in the in-process queue for the UI to poll
//! (`GET /v1/ui/handoffs/next`) or are pushed to the UI's callback URL with
//! retry and exponential backoff.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use fido_broker_core::{
    CollaboratorError, HandOff, InteractiveCollaborator, RequestKind, RequestSource, ServiceId,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// JSON form of a hand-off as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandOffMessage {
    pub session_id: String,
    /// Correlation handle to report the result under
    pub handle: String,
    pub kind: RequestKind,
    pub service: ServiceId,
    pub source: RequestSource,
    /// Base64 of the options wire form
    pub options: String,
}

impl From<&HandOff> for HandOffMessage {
    fn from(handoff: &HandOff) -> Self {
        Self {
            session_id: handoff.session_id.to_string(),
            handle: handoff.token.to_string(),
            kind: handoff.kind,
            service: handoff.service,
            source: handoff.source,
            options: BASE64.encode(&handoff.encoded_options),
        }
    }
}

/// Configuration for the callback HTTP client.
#[derive(Debug, Clone)]
pub struct HttpCollaboratorConfig {
    pub url: String,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Maximum attempts for transient errors
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl HttpCollaboratorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
        }
    }
}

/// Pushes hand-offs to the UI over HTTP.
pub struct HttpCollaborator {
    client: Client,
    config: HttpCollaboratorConfig,
}

impl HttpCollaborator {
    pub fn new(config: HttpCollaboratorConfig) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                CollaboratorError::Unavailable(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    async fn post_once(
        &self,
        message: &HandOffMessage,
    ) -> Result<(), backoff::Error<CollaboratorError>> {
        let start = Instant::now();

        let response = self
            .client
            .post(&self.config.url)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                let latency_ms = start.elapsed().as_millis() as u64;
                if is_transient_error(&e) {
                    warn!(error = %e, latency_ms, "Transient error, will retry");
                    backoff::Error::transient(CollaboratorError::Unavailable(e.to_string()))
                } else {
                    warn!(error = %e, latency_ms, "Permanent error, aborting");
                    backoff::Error::permanent(CollaboratorError::Unavailable(e.to_string()))
                }
            })?;

        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;
        if status.is_success() {
            debug!(status = %status, latency_ms, "UI accepted hand-off");
            return Ok(());
        }

        let err = CollaboratorError::Rejected(format!("UI callback returned status: {status}"));
        if is_transient_status(status) {
            warn!(status = %status, latency_ms, "Transient HTTP status, will retry");
            Err(backoff::Error::transient(err))
        } else {
            warn!(status = %status, latency_ms, "Permanent HTTP error");
            Err(backoff::Error::permanent(err))
        }
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries),
            ..Default::default()
        }
    }
}

#[async_trait]
impl InteractiveCollaborator for HttpCollaborator {
    #[instrument(skip_all, fields(session_id = %handoff.session_id, url = %self.config.url))]
    async fn launch(&self, handoff: HandOff) -> Result<(), CollaboratorError> {
        let message = HandOffMessage::from(&handoff);

        retry_notify(
            self.build_backoff(),
            || async { self.post_once(&message).await },
            |err: CollaboratorError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

impl std::fmt::Debug for HttpCollaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCollaborator")
            .field("config", &self.config)
            .finish()
    }
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_status_classification() {
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_message_from_handoff() {
        let json = serde_json::json!({
            "session_id": "00000000-0000-4000-8000-000000000000",
            "token": "ab".repeat(32),
            "kind": "register",
            "service": "fido2_regular",
            "source": "app",
            "encoded_options": [1, 2, 3],
        });
        let handoff: HandOff = serde_json::from_value(json).unwrap();
        let message = HandOffMessage::from(&handoff);
        assert_eq!(message.handle, "ab".repeat(32));
        assert_eq!(message.options, "AQID");
        assert_eq!(message.kind, RequestKind::Register);
    }

    #[tokio::test]
    async fn test_unreachable_callback_fails_launch() {
        let mut config = HttpCollaboratorConfig::new("http://127.0.0.1:9/handoff");
        config.timeout = Duration::from_millis(100);
        config.max_retries = 1;
        config.initial_interval = Duration::from_millis(10);
        config.max_interval = Duration::from_millis(20);
        let collaborator = HttpCollaborator::new(config).unwrap();

        let handoff: HandOff = serde_json::from_value(serde_json::json!({
            "session_id": "00000000-0000-4000-8000-000000000000",
            "token": "cd".repeat(32),
            "kind": "sign",
            "service": "fido2_regular",
            "source": "app",
            "encoded_options": [],
        }))
        .unwrap();

        assert!(collaborator.launch(handoff).await.is_err());
    }
}
