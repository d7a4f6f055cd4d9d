//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use fido_broker_core::{
    AvailabilityOracle, ChannelCollaborator, Fido2Service, HandOff, InteractiveCollaborator,
    StaticDeviceSecurity,
};
use tokio::sync::{mpsc, Mutex};

use crate::collaborator::{HttpCollaborator, HttpCollaboratorConfig};
use crate::config::Config;
use crate::error::ApiError;
use crate::mailbox::ResultMailbox;

/// The broker service as hosted by this server.
pub type BrokerService = Fido2Service<StaticDeviceSecurity>;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// The FIDO2 broker service
    pub service: Arc<BrokerService>,
    /// Parked outcomes for HTTP callers
    pub mailbox: Arc<ResultMailbox>,
    /// Hand-off queue polled by the UI (absent when hand-offs are pushed)
    pub handoffs: Option<Arc<Mutex<mpsc::Receiver<HandOff>>>>,
}

impl AppState {
    /// Build the service and its collaborator from configuration.
    ///
    /// The service is not started; call `service.start()` from within the runtime.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let (collaborator, handoffs): (Arc<dyn InteractiveCollaborator>, _) =
            match &config.ui_callback_url {
                Some(url) => {
                    let http = HttpCollaborator::new(HttpCollaboratorConfig::new(url.clone()))
                        .map_err(|e| ApiError::internal(e.to_string()))?;
                    tracing::info!(url = %url, "Hand-offs pushed to UI callback");
                    (Arc::new(http), None)
                }
                None => {
                    let (channel, rx) = ChannelCollaborator::new(config.handoff_queue_capacity);
                    tracing::info!(
                        capacity = config.handoff_queue_capacity,
                        "Hand-offs queued for UI polling"
                    );
                    (Arc::new(channel), Some(Arc::new(Mutex::new(rx))))
                }
            };

        let oracle = AvailabilityOracle::new(StaticDeviceSecurity::new(
            config.platform_level,
            config.device_secure,
        ));
        let service = Fido2Service::new(config.broker_config(), collaborator, oracle);

        Ok(Self {
            service: Arc::new(service),
            mailbox: Arc::new(ResultMailbox::new()),
            handoffs,
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .field("mailbox", &self.mailbox)
            .field("polling", &self.handoffs.is_some())
            .finish()
    }
}
