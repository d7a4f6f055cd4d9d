//! Outbound hand-off to the interactive collaborator (the UI that performs the
//! ceremony with the user).

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::CollaboratorError;
use crate::options::RequestKind;
use crate::session::{CorrelationToken, SessionId};

/// Service the hand-off originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceId {
    Fido2Regular,
}

/// Who issued the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSource {
    #[default]
    App,
    Browser,
}

/// Everything the collaborator needs to run one ceremony.
///
/// The collaborator reports back through the router using `token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandOff {
    pub session_id: SessionId,
    pub token: CorrelationToken,
    pub kind: RequestKind,
    pub service: ServiceId,
    pub source: RequestSource,
    pub encoded_options: Vec<u8>,
}

/// Launches the interactive UI for a session.
///
/// `launch` returns once the hand-off is accepted; the ceremony result comes
/// back later and independently.
#[async_trait]
pub trait InteractiveCollaborator: Send + Sync {
    async fn launch(&self, handoff: HandOff) -> Result<(), CollaboratorError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Collaborator backed by a bounded in-process queue.
///
/// The receiving end is drained by whoever runs the UI.
#[derive(Clone)]
pub struct ChannelCollaborator {
    tx: mpsc::Sender<HandOff>,
}

impl ChannelCollaborator {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<HandOff>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl InteractiveCollaborator for ChannelCollaborator {
    async fn launch(&self, handoff: HandOff) -> Result<(), CollaboratorError> {
        self.tx.try_send(handoff).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                CollaboratorError::Unavailable("hand-off queue is full".into())
            }
            mpsc::error::TrySendError::Closed(_) => {
                CollaboratorError::Unavailable("hand-off queue is closed".into())
            }
        })
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

impl fmt::Debug for ChannelCollaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCollaborator")
            .field("capacity", &self.tx.max_capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handoff() -> HandOff {
        HandOff {
            session_id: SessionId::generate(),
            token: CorrelationToken::from_digest(&[1; 32]),
            kind: RequestKind::Sign,
            service: ServiceId::Fido2Regular,
            source: RequestSource::App,
            encoded_options: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_channel_delivers_handoff() {
        let (collaborator, mut rx) = ChannelCollaborator::new(4);
        let sent = handoff();
        collaborator.launch(sent.clone()).await.unwrap();
        assert_eq!(rx.recv().await, Some(sent));
    }

    #[tokio::test]
    async fn test_full_queue_is_unavailable() {
        let (collaborator, _rx) = ChannelCollaborator::new(1);
        collaborator.launch(handoff()).await.unwrap();
        assert!(matches!(
            collaborator.launch(handoff()).await,
            Err(CollaboratorError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_queue_is_unavailable() {
        let (collaborator, rx) = ChannelCollaborator::new(1);
        drop(rx);
        assert!(collaborator.launch(handoff()).await.is_err());
    }

    #[test]
    fn test_handoff_wire_names() {
        let json = serde_json::to_value(handoff()).unwrap();
        assert_eq!(json["service"], "fido2_regular");
        assert_eq!(json["source"], "app");
        assert_eq!(json["kind"], "sign");
    }
}
