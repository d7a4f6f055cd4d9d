//! In-memory mailbox for ceremony outcomes
//!
//! HTTP callers cannot hold a [`PendingResult`] across requests, so the server
//! parks it here under the request handle and callers poll for the outcome.
//! Outcomes stay collectable for the retention window after they resolve.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use fido_broker_core::{AuthenticatorResult, Dispatch, PendingResult, SessionId};

/// Mailbox slot for one handle
struct Slot {
    session_id: SessionId,
    pending: Option<PendingResult>,
    outcome: Option<AuthenticatorResult>,
    resolved_at: Option<Instant>,
}

impl Slot {
    /// Move a resolved pending result into `outcome`.
    fn poll(&mut self) {
        if let Some(result) = self.pending.as_mut().and_then(PendingResult::try_take) {
            self.pending = None;
            self.outcome = Some(result);
            self.resolved_at = Some(Instant::now());
        }
    }
}

/// State of a handle as seen by a polling caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collected {
    Pending(SessionId),
    Ready(SessionId, AuthenticatorResult),
    Unknown,
}

/// Outcome store keyed by request handle
#[derive(Default)]
pub struct ResultMailbox {
    slots: DashMap<String, Slot>,
}

impl ResultMailbox {
    /// Create a new mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Park the caller side of a dispatch.
    ///
    /// An identical request reuses its handle; the newer dispatch replaces
    /// the older slot.
    pub fn deposit(&self, dispatch: Dispatch) {
        self.slots.insert(
            dispatch.token.to_string(),
            Slot {
                session_id: dispatch.session_id,
                pending: Some(dispatch.pending),
                outcome: None,
                resolved_at: None,
            },
        );
    }

    /// Look up the outcome for `handle` without consuming it
    pub fn collect(&self, handle: &str) -> Collected {
        let Some(mut slot) = self.slots.get_mut(handle) else {
            return Collected::Unknown;
        };
        slot.poll();
        match &slot.outcome {
            Some(result) => Collected::Ready(slot.session_id, result.clone()),
            None => Collected::Pending(slot.session_id),
        }
    }

    /// Remove outcomes that resolved more than `retention` ago
    pub fn cleanup_expired(&self, retention: Duration) {
        let now = Instant::now();
        self.slots.retain(|_, slot| {
            slot.poll();
            match slot.resolved_at {
                Some(at) => now.saturating_duration_since(at) < retention,
                None => true,
            }
        });
    }

    /// Get count of parked handles
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for ResultMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultMailbox")
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use fido_broker_core::{
        AvailabilityOracle, BrokerConfig, ChannelCollaborator, CredentialOptions, Fido2Service,
        StaticDeviceSecurity,
    };

    fn service() -> Fido2Service<StaticDeviceSecurity> {
        let (collaborator, _rx) = ChannelCollaborator::new(8);
        Fido2Service::new(
            BrokerConfig::default(),
            Arc::new(collaborator),
            AvailabilityOracle::new(StaticDeviceSecurity::new(30, true)),
        )
    }

    fn dispatch(service: &Fido2Service<StaticDeviceSecurity>, challenge: u8) -> Dispatch {
        let options = CredentialOptions::builder("example.com", vec![challenge; 16]).build();
        let bytes = fido_broker_core::codec::encode(&options).unwrap();
        service.sign_request(&bytes).dispatch.unwrap()
    }

    #[tokio::test]
    async fn test_pending_then_ready() {
        let service = service();
        let mailbox = ResultMailbox::new();
        let dispatch = dispatch(&service, 1);
        let handle = dispatch.token.to_string();
        let token = dispatch.token.clone();
        let session_id = dispatch.session_id;
        mailbox.deposit(dispatch);

        assert_eq!(mailbox.collect(&handle), Collected::Pending(session_id));

        service.on_external_result(&token, AuthenticatorResult::success(vec![1]));
        let ready = Collected::Ready(session_id, AuthenticatorResult::success(vec![1]));
        assert_eq!(mailbox.collect(&handle), ready);
        // Collecting again is idempotent
        assert_eq!(mailbox.collect(&handle), ready);
    }

    #[test]
    fn test_unknown_handle() {
        let mailbox = ResultMailbox::new();
        assert_eq!(mailbox.collect("nope"), Collected::Unknown);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_unresolved() {
        let service = service();
        let mailbox = ResultMailbox::new();
        let first = dispatch(&service, 2);
        let second = dispatch(&service, 3);
        let token = first.token.clone();
        mailbox.deposit(first);
        mailbox.deposit(second);

        service.on_external_result(&token, AuthenticatorResult::Cancelled);
        mailbox.cleanup_expired(Duration::ZERO);
        assert_eq!(mailbox.len(), 1);
    }
}
