//! Fido Broker Server Library - HTTP transport for the FIDO2 request broker
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod collaborator;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mailbox;
pub mod routes;
pub mod state;

pub use collaborator::{HandOffMessage, HttpCollaborator, HttpCollaboratorConfig};
pub use config::Config;
pub use error::ApiError;
pub use mailbox::{Collected, ResultMailbox};
pub use routes::{create_router, create_router_with_config};
pub use state::{AppState, BrokerService};
