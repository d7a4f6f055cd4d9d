//! Inbound service facade used by the transport layer.
//!
//! Wires the registry, broker, router, oracle and sweeper together and
//! exposes the byte-level contract: options arrive in wire form and every
//! call answers with a [`StatusCode`].

use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::availability::{AvailabilityOracle, DeviceSecurity};
use crate::broker::{BrokerConfig, Dispatch, DispatchBroker};
use crate::codec;
use crate::collaborator::InteractiveCollaborator;
use crate::error::{BrokerError, Result};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::options::RequestKind;
use crate::registry::SessionRegistry;
use crate::result::AuthenticatorResult;
use crate::router::{ResultRouter, RouteOutcome};
use crate::session::CorrelationToken;
use crate::status::StatusCode;
use crate::sweeper::spawn_sweeper;

/// Versioned capability advertised to clients on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Feature {
    pub name: &'static str,
    pub version: u32,
}

pub const SERVICE_FEATURES: &[Feature] = &[
    Feature {
        name: "is_user_verifying_platform_authenticator_available",
        version: 1,
    },
    Feature {
        name: "is_user_verifying_platform_authenticator_available_for_credential",
        version: 1,
    },
];

/// Credential known to the platform for a relying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    pub rp_id: String,
    pub id: Vec<u8>,
}

/// Answer to an inbound register or sign request.
#[derive(Debug)]
pub struct ServiceReply {
    pub status: StatusCode,
    /// Present only when `status` is `Success`
    pub dispatch: Option<Dispatch>,
}

impl ServiceReply {
    fn rejected(err: &BrokerError) -> Self {
        Self {
            status: err.status(),
            dispatch: None,
        }
    }
}

/// The FIDO2 authenticator service.
pub struct Fido2Service<D> {
    registry: Arc<SessionRegistry>,
    broker: DispatchBroker,
    router: ResultRouter,
    oracle: AvailabilityOracle<D>,
    lifecycle: Lifecycle,
    config: BrokerConfig,
}

impl<D: DeviceSecurity> Fido2Service<D> {
    pub fn new(
        config: BrokerConfig,
        collaborator: Arc<dyn InteractiveCollaborator>,
        oracle: AvailabilityOracle<D>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let lifecycle = Lifecycle::new();
        let broker = DispatchBroker::new(
            Arc::clone(&registry),
            collaborator,
            lifecycle.clone(),
            config.clone(),
        );
        let router = ResultRouter::new(Arc::clone(&registry));

        Self {
            registry,
            broker,
            router,
            oracle,
            lifecycle,
            config,
        }
    }

    /// Start launching hand-offs and spawn the expiry sweeper.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        Handle::try_current()
            .map_err(|e| BrokerError::Internal(format!("no async runtime for sweeper: {e}")))?;

        if !self.lifecycle.start() {
            return Err(BrokerError::Internal(format!(
                "service cannot start from {:?}",
                self.lifecycle.state()
            )));
        }

        info!(
            sweep_interval_ms = self.config.sweep_interval.as_millis() as u64,
            "Service started"
        );
        Ok(spawn_sweeper(
            Arc::clone(&self.registry),
            self.lifecycle.clone(),
            self.config.sweep_interval,
            self.config.terminal_retention,
        ))
    }

    /// Stop the service and resolve every live session with `Cancelled`.
    pub fn shutdown(&self) -> usize {
        self.lifecycle.stop();
        let cancelled = self.registry.cancel_all();
        info!(cancelled, "Service stopped");
        cancelled
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.state() == LifecycleState::Started
    }

    pub fn register_request(&self, options: &[u8]) -> ServiceReply {
        self.request(RequestKind::Register, options)
    }

    pub fn sign_request(&self, options: &[u8]) -> ServiceReply {
        self.request(RequestKind::Sign, options)
    }

    fn request(&self, kind: RequestKind, bytes: &[u8]) -> ServiceReply {
        let dispatched = codec::decode(bytes)
            .map_err(BrokerError::from)
            .and_then(|options| self.broker.dispatch(kind, options));

        match dispatched {
            Ok(dispatch) => ServiceReply {
                status: StatusCode::Success,
                dispatch: Some(dispatch),
            },
            Err(e) => {
                warn!(kind = %kind, error = %e, "Request rejected");
                ServiceReply::rejected(&e)
            }
        }
    }

    pub fn on_external_result(
        &self,
        token: &CorrelationToken,
        result: AuthenticatorResult,
    ) -> RouteOutcome {
        self.router.on_external_result(token, result)
    }

    pub fn is_platform_authenticator_available(&self) -> bool {
        self.oracle.is_platform_authenticator_available()
    }

    pub fn is_platform_authenticator_available_for_credential(
        &self,
        rp_id: &str,
        credential_id: &[u8],
    ) -> bool {
        self.oracle
            .is_platform_authenticator_available_for_credential(rp_id, credential_id)
    }

    /// Credentials stored for `rp_id`.
    ///
    /// Enumeration belongs to the interactive collaborator; the service itself
    /// never holds credentials.
    pub fn credential_list(&self, rp_id: &str) -> Vec<Credential> {
        debug!(rp_id, "Credential enumeration requested");
        Vec::new()
    }

    pub fn features(&self) -> &'static [Feature] {
        SERVICE_FEATURES
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn oracle(&self) -> &AvailabilityOracle<D> {
        &self.oracle
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

impl<D> std::fmt::Debug for Fido2Service<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fido2Service")
            .field("registry", &self.registry)
            .field("broker", &self.broker)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::StaticDeviceSecurity;
    use crate::collaborator::{ChannelCollaborator, HandOff};
    use crate::options::CredentialOptions;
    use tokio::sync::mpsc;

    fn service() -> (Fido2Service<StaticDeviceSecurity>, mpsc::Receiver<HandOff>) {
        let (collaborator, rx) = ChannelCollaborator::new(8);
        let service = Fido2Service::new(
            BrokerConfig::default(),
            Arc::new(collaborator),
            AvailabilityOracle::new(StaticDeviceSecurity::new(30, true)),
        );
        (service, rx)
    }

    #[tokio::test]
    async fn test_sign_request_roundtrip() {
        let (service, mut rx) = service();
        let sweeper = service.start().unwrap();

        let options = CredentialOptions::builder("example.com", vec![9; 32]).build();
        let reply = service.sign_request(&codec::encode(&options).unwrap());
        assert_eq!(reply.status, StatusCode::Success);
        let dispatch = reply.dispatch.unwrap();

        let handoff = rx.recv().await.unwrap();
        assert_eq!(handoff.token, dispatch.token);

        let outcome = service.on_external_result(&handoff.token, AuthenticatorResult::success(vec![0xAA]));
        assert!(outcome.is_delivered());
        assert_eq!(dispatch.pending.wait().await, AuthenticatorResult::success(vec![0xAA]));

        service.shutdown();
        sweeper.await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_is_invalid_options() {
        let (service, _rx) = service();
        let reply = service.register_request(&[0xFF, 0x00, 0x01]);
        assert_eq!(reply.status, StatusCode::InvalidOptions);
        assert!(reply.dispatch.is_none());
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_live_sessions() {
        let (service, _rx) = service();
        let options = CredentialOptions::builder("example.com", vec![8; 32]).build();
        let reply = service.sign_request(&codec::encode(&options).unwrap());

        assert_eq!(service.shutdown(), 1);
        assert_eq!(
            reply.dispatch.unwrap().pending.wait().await,
            AuthenticatorResult::Cancelled
        );
        assert!(service.start().is_err());
    }

    #[test]
    fn test_static_answers() {
        let (service, _rx) = service();
        assert!(service.credential_list("example.com").is_empty());
        assert_eq!(service.features().len(), 2);
        assert!(service.is_platform_authenticator_available());
        assert!(!service.is_platform_authenticator_available_for_credential("example.com", &[]));
    }
}
