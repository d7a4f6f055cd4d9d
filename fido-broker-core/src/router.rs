//! Routes asynchronous collaborator results back to their session.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::registry::{SessionRegistry, Transition};
use crate::result::AuthenticatorResult;
use crate::session::{CorrelationToken, SessionStatus};

/// Why a result was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// No live session owns the token
    UnknownToken,
    /// The session terminated before this result arrived
    AlreadyTerminal,
    /// The session's deadline had passed; it expired instead
    DeadlinePassed,
}

/// What happened to a delivered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Delivered(SessionStatus),
    Ignored(IgnoreReason),
}

impl RouteOutcome {
    pub fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

#[derive(Debug, Clone)]
pub struct ResultRouter {
    registry: Arc<SessionRegistry>,
}

impl ResultRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver a collaborator result to the session owning `token`.
    ///
    /// Unknown tokens and already terminated sessions make this a no-op.
    pub fn on_external_result(
        &self,
        token: &CorrelationToken,
        result: AuthenticatorResult,
    ) -> RouteOutcome {
        let Some(session_id) = self.registry.lookup_token(token) else {
            debug!(token = %token, "Result for unknown or finished session dropped");
            return RouteOutcome::Ignored(IgnoreReason::UnknownToken);
        };

        let status = result.status();
        match self.registry.complete(&session_id, result) {
            Transition::Applied(SessionStatus::Expired) => {
                warn!(
                    session_id = %session_id,
                    token = %token,
                    "Result arrived after the deadline, session expired"
                );
                RouteOutcome::Ignored(IgnoreReason::DeadlinePassed)
            }
            Transition::Applied(final_status) => {
                info!(
                    session_id = %session_id,
                    status = %status,
                    "Result delivered"
                );
                RouteOutcome::Delivered(final_status)
            }
            Transition::AlreadyTerminal(existing) => {
                warn!(
                    session_id = %session_id,
                    token = %token,
                    ?existing,
                    "Late result for terminated session dropped"
                );
                RouteOutcome::Ignored(IgnoreReason::AlreadyTerminal)
            }
            // Purged between lookup and completion
            Transition::NotFound | Transition::NotDue => {
                RouteOutcome::Ignored(IgnoreReason::UnknownToken)
            }
        }
    }
}
