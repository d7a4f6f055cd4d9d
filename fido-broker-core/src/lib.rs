//! Fido Broker Core - request broker for a FIDO2 platform authenticator service
//!
//! This crate sits between an inbound IPC surface and the interactive UI that
//! actually talks to the user. It decodes WebAuthn-style creation and request
//! options, tracks each ceremony as a session, hands it to the UI and routes
//! the asynchronous result back to exactly one waiting caller.
//!
//! # Components
//!
//! - [`codec`]: versioned CBOR wire form for [`CredentialOptions`]
//! - [`SessionRegistry`]: concurrent session store with single-winner transitions
//! - [`AvailabilityOracle`]: platform authenticator availability from device security state
//! - [`DispatchBroker`]: validation, correlation tokens and lifecycle-gated hand-off
//! - [`ResultRouter`]: delivers collaborator results by correlation token
//! - [`Fido2Service`]: byte-level facade wiring it all together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fido_broker_core::{
//!     codec, AuthenticatorResult, AvailabilityOracle, BrokerConfig, ChannelCollaborator,
//!     CredentialOptions, Fido2Service, StaticDeviceSecurity, StatusCode,
//! };
//!
//! # async fn example() -> fido_broker_core::Result<()> {
//! let (collaborator, mut handoffs) = ChannelCollaborator::new(16);
//! let service = Fido2Service::new(
//!     BrokerConfig::default(),
//!     Arc::new(collaborator),
//!     AvailabilityOracle::new(StaticDeviceSecurity::new(30, true)),
//! );
//! let _sweeper = service.start()?;
//!
//! let options = CredentialOptions::builder("example.com", vec![0x42; 32]).build();
//! let reply = service.sign_request(&codec::encode(&options)?);
//! assert_eq!(reply.status, StatusCode::Success);
//!
//! // The UI side picks up the hand-off and reports back by token
//! if let Some(handoff) = handoffs.recv().await {
//!     service.on_external_result(&handoff.token, AuthenticatorResult::success(vec![1, 2, 3]));
//! }
//!
//! if let Some(dispatch) = reply.dispatch {
//!     let result = dispatch.pending.wait().await;
//!     assert!(result.is_success());
//! }
//! # Ok(())
//! # }
//! ```

pub mod availability;
pub mod broker;
pub mod codec;
pub mod collaborator;
pub mod error;
pub mod lifecycle;
pub mod options;
pub mod registry;
pub mod result;
pub mod router;
pub mod service;
pub mod session;
pub mod status;
pub mod sweeper;

// Re-export main types for convenience
pub use availability::{AvailabilityOracle, DeviceSecurity, StaticDeviceSecurity, MIN_PLATFORM_LEVEL};
pub use broker::{BrokerConfig, Dispatch, DispatchBroker};
pub use codec::{MAX_OPTIONS_SIZE, WIRE_VERSION};
pub use collaborator::{ChannelCollaborator, HandOff, InteractiveCollaborator, RequestSource, ServiceId};
pub use error::{
    BrokerError, CollaboratorError, DecodeError, DeviceSecurityError, Result, ValidationError,
};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use options::{
    AuthenticatorTransport, CredentialDescriptor, CredentialOptions, OptionsBuilder, RequestKind,
    UserEntity, UserVerificationRequirement,
};
pub use registry::{RegistryStats, SessionRegistry, SweepReport, Transition};
pub use result::{AuthenticatorResult, ErrorKind, PendingResult};
pub use router::{IgnoreReason, ResultRouter, RouteOutcome};
pub use service::{Credential, Feature, Fido2Service, ServiceReply, SERVICE_FEATURES};
pub use session::{CorrelationToken, Session, SessionId, SessionStatus};
pub use status::StatusCode;
