//! Dispatch broker: validates requests, registers sessions and hands them to
//! the interactive collaborator.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use crate::collaborator::{HandOff, InteractiveCollaborator, RequestSource, ServiceId};
use crate::error::{BrokerError, Result};
use crate::lifecycle::{CancelFlag, Lifecycle};
use crate::options::{CredentialOptions, RequestKind};
use crate::registry::SessionRegistry;
use crate::result::{AuthenticatorResult, ErrorKind, PendingResult};
use crate::session::{CorrelationToken, SessionId};

/// Broker tuning.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Applied when the options carry no timeout (or zero)
    pub default_timeout: Duration,
    pub min_timeout: Duration,
    pub max_timeout: Duration,
    /// Period of the expiry sweep
    pub sweep_interval: Duration,
    /// How long terminal sessions stay readable before being purged
    pub terminal_retention: Duration,
    /// Source recorded on every hand-off
    pub source: RequestSource,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(120),
            min_timeout: Duration::from_secs(1),
            max_timeout: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(5),
            terminal_retention: Duration::from_secs(30),
            source: RequestSource::App,
        }
    }
}

/// Handle returned to the caller of a dispatch.
#[derive(Debug)]
pub struct Dispatch {
    pub session_id: SessionId,
    pub token: CorrelationToken,
    /// Resolves with the ceremony outcome
    pub pending: PendingResult,
    /// An identical live request was taken over instead of starting a new one
    pub reused: bool,
}

pub struct DispatchBroker {
    registry: Arc<SessionRegistry>,
    collaborator: Arc<dyn InteractiveCollaborator>,
    lifecycle: Lifecycle,
    config: BrokerConfig,
}

impl DispatchBroker {
    pub fn new(
        registry: Arc<SessionRegistry>,
        collaborator: Arc<dyn InteractiveCollaborator>,
        lifecycle: Lifecycle,
        config: BrokerConfig,
    ) -> Self {
        Self {
            registry,
            collaborator,
            lifecycle,
            config,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn dispatch_register(&self, options: CredentialOptions) -> Result<Dispatch> {
        self.dispatch(RequestKind::Register, options)
    }

    pub fn dispatch_sign(&self, options: CredentialOptions) -> Result<Dispatch> {
        self.dispatch(RequestKind::Sign, options)
    }

    /// Validate, register and hand off one request.
    ///
    /// Returns as soon as the hand-off task is scheduled. Invalid options
    /// never create a session. Must be called from within a Tokio runtime.
    pub fn dispatch(&self, kind: RequestKind, options: CredentialOptions) -> Result<Dispatch> {
        options.validate(kind)?;

        let runtime = Handle::try_current()
            .map_err(|e| BrokerError::Internal(format!("no async runtime for hand-off: {e}")))?;

        let timeout = options.effective_timeout(
            self.config.default_timeout,
            self.config.min_timeout,
            self.config.max_timeout,
        );
        let registration = self.registry.create(kind, options, timeout)?;

        if registration.reused {
            info!(
                session_id = %registration.session_id,
                token = %registration.token,
                "Identical request already in flight, caller attached to it"
            );
        } else {
            info!(
                session_id = %registration.session_id,
                kind = %kind,
                timeout_ms = timeout.as_millis() as u64,
                "Session created"
            );

            let handoff = HandOff {
                session_id: registration.session_id,
                token: registration.token.clone(),
                kind,
                service: ServiceId::Fido2Regular,
                source: self.config.source,
                encoded_options: registration.encoded_options,
            };
            runtime.spawn(hand_off(
                Arc::clone(&self.registry),
                Arc::clone(&self.collaborator),
                self.lifecycle.clone(),
                registration.cancel,
                handoff,
            ));
        }

        Ok(Dispatch {
            session_id: registration.session_id,
            token: registration.token,
            pending: registration.pending,
            reused: registration.reused,
        })
    }
}

impl std::fmt::Debug for DispatchBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchBroker")
            .field("collaborator", &self.collaborator.name())
            .field("lifecycle", &self.lifecycle.state())
            .field("config", &self.config)
            .finish()
    }
}

/// Launch the collaborator once the broker is started, unless the session
/// terminates first.
#[instrument(skip_all, fields(session_id = %handoff.session_id, kind = %handoff.kind))]
async fn hand_off(
    registry: Arc<SessionRegistry>,
    collaborator: Arc<dyn InteractiveCollaborator>,
    lifecycle: Lifecycle,
    cancel: CancelFlag,
    handoff: HandOff,
) {
    let session_id = handoff.session_id;

    let started = tokio::select! {
        started = lifecycle.wait_started() => started,
        _ = cancel.cancelled() => {
            debug!("Session ended before launch");
            return;
        }
    };

    if !started {
        debug!("Broker stopped before launch");
        registry.complete(&session_id, AuthenticatorResult::Cancelled);
        return;
    }

    if !registry.mark_dispatched(&session_id) {
        debug!("Session no longer pending, skipping launch");
        return;
    }

    match collaborator.launch(handoff).await {
        Ok(()) => debug!(collaborator = collaborator.name(), "Hand-off accepted"),
        Err(e) => {
            warn!(collaborator = collaborator.name(), error = %e, "Hand-off failed");
            registry.complete(
                &session_id,
                AuthenticatorResult::error(ErrorKind::Internal, e.to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::collaborator::ChannelCollaborator;
    use crate::error::{CollaboratorError, ValidationError};
    use crate::options::COSE_ALG_ES256;
    use crate::session::SessionStatus;
    use crate::status::StatusCode;

    struct RefusingCollaborator;

    #[async_trait]
    impl InteractiveCollaborator for RefusingCollaborator {
        async fn launch(&self, _handoff: HandOff) -> std::result::Result<(), CollaboratorError> {
            Err(CollaboratorError::Rejected("no activity".into()))
        }

        fn name(&self) -> &'static str {
            "refusing"
        }
    }

    fn broker_with(collaborator: Arc<dyn InteractiveCollaborator>) -> (DispatchBroker, Arc<SessionRegistry>, Lifecycle) {
        let registry = Arc::new(SessionRegistry::new());
        let lifecycle = Lifecycle::new();
        let broker = DispatchBroker::new(
            Arc::clone(&registry),
            collaborator,
            lifecycle.clone(),
            BrokerConfig::default(),
        );
        (broker, registry, lifecycle)
    }

    fn register_options() -> CredentialOptions {
        CredentialOptions::builder("example.com", vec![0x11; 32])
            .user(vec![1, 2, 3], "alice", "Alice")
            .algorithm(COSE_ALG_ES256)
            .build()
    }

    #[tokio::test]
    async fn test_dispatch_hands_off_after_start() {
        let (collaborator, mut rx) = ChannelCollaborator::new(8);
        let (broker, registry, lifecycle) = broker_with(Arc::new(collaborator));

        let dispatch = broker.dispatch_register(register_options()).unwrap();
        assert!(!dispatch.reused);

        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err(), "launched before the broker started");
        assert_eq!(
            registry.get(&dispatch.session_id).unwrap().status,
            SessionStatus::Pending
        );

        lifecycle.start();
        let handoff = rx.recv().await.unwrap();
        assert_eq!(handoff.session_id, dispatch.session_id);
        assert_eq!(handoff.token, dispatch.token);
        assert_eq!(handoff.kind, RequestKind::Register);
        assert_eq!(handoff.service, ServiceId::Fido2Regular);
        assert_eq!(crate::codec::decode(&handoff.encoded_options).unwrap(), register_options());
        assert_eq!(
            registry.get(&dispatch.session_id).unwrap().status,
            SessionStatus::Dispatched
        );
    }

    #[tokio::test]
    async fn test_invalid_options_create_no_session() {
        let (collaborator, _rx) = ChannelCollaborator::new(8);
        let (broker, registry, _) = broker_with(Arc::new(collaborator));

        let options = CredentialOptions::builder("  ", vec![1]).build();
        let err = broker.dispatch_sign(options).unwrap_err();
        assert!(matches!(
            err,
            BrokerError::Validation(ValidationError::EmptyRelyingPartyId)
        ));
        assert_eq!(err.status(), StatusCode::InvalidOptions);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dispatch_outside_runtime_is_internal_error() {
        let (collaborator, _rx) = ChannelCollaborator::new(8);
        let (broker, registry, _) = broker_with(Arc::new(collaborator));

        let err = broker.dispatch_register(register_options()).unwrap_err();
        assert_eq!(err.status(), StatusCode::InternalError);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_failed_launch_fails_session() {
        let (broker, registry, lifecycle) = broker_with(Arc::new(RefusingCollaborator));
        lifecycle.start();

        let dispatch = broker.dispatch_register(register_options()).unwrap();
        let result = dispatch.pending.wait().await;
        assert_eq!(result.status(), StatusCode::InternalError);
        assert_eq!(
            registry.get(&dispatch.session_id).unwrap().status,
            SessionStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_stop_before_start_cancels_session() {
        let (collaborator, mut rx) = ChannelCollaborator::new(8);
        let (broker, _registry, lifecycle) = broker_with(Arc::new(collaborator));

        let dispatch = broker.dispatch_register(register_options()).unwrap();
        lifecycle.stop();

        assert_eq!(dispatch.pending.wait().await, AuthenticatorResult::Cancelled);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_session_ended_before_start_is_not_launched() {
        let (collaborator, mut rx) = ChannelCollaborator::new(8);
        let (broker, registry, lifecycle) = broker_with(Arc::new(collaborator));

        let dispatch = broker.dispatch_register(register_options()).unwrap();
        registry.complete(&dispatch.session_id, AuthenticatorResult::Cancelled);
        tokio::task::yield_now().await;

        lifecycle.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_dispatch_launches_once() {
        let (collaborator, mut rx) = ChannelCollaborator::new(8);
        let (broker, registry, lifecycle) = broker_with(Arc::new(collaborator));
        lifecycle.start();

        let first = broker.dispatch_register(register_options()).unwrap();
        let second = broker.dispatch_register(register_options()).unwrap();
        assert!(second.reused);
        assert_eq!(first.session_id, second.session_id);

        rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err(), "duplicate request was launched twice");
        assert_eq!(registry.len(), 1);
    }
}
