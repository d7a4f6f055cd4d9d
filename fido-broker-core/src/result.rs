//! Ceremony results and the single-shot completion channel that carries them
//! back to the waiting caller.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::status::StatusCode;

/// Failure category reported alongside [`AuthenticatorResult::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Session deadline elapsed
    Timeout,
    /// Collaborator refused the options after dispatch
    InvalidOptions,
    /// Ceremony not allowed (user refused or no matching credential)
    NotAllowed,
    /// Broker or collaborator failure
    Internal,
}

/// Outcome of an interactive ceremony.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthenticatorResult {
    /// Attestation (register) or assertion (sign) bytes, passed through untouched
    Success { data: Vec<u8> },
    Cancelled,
    Error { kind: ErrorKind, message: String },
}

impl AuthenticatorResult {
    pub fn success(data: impl Into<Vec<u8>>) -> Self {
        Self::Success { data: data.into() }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::error(ErrorKind::Timeout, "session deadline elapsed")
    }

    /// Status the caller observes for this result.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Success { .. } => StatusCode::Success,
            Self::Cancelled => StatusCode::Cancelled,
            Self::Error { kind, .. } => match kind {
                ErrorKind::Timeout => StatusCode::Timeout,
                ErrorKind::InvalidOptions => StatusCode::InvalidOptions,
                ErrorKind::NotAllowed => StatusCode::Cancelled,
                ErrorKind::Internal => StatusCode::InternalError,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Create the callback pair stored in a session.
pub(crate) fn completion() -> (ResultCallback, PendingResult) {
    let (tx, rx) = oneshot::channel();
    (ResultCallback { tx }, PendingResult { rx })
}

/// Callback side held by the registry. Consumed on first use.
#[derive(Debug)]
pub(crate) struct ResultCallback {
    tx: oneshot::Sender<AuthenticatorResult>,
}

impl ResultCallback {
    /// Deliver the result. Returns `false` if the caller already went away.
    pub(crate) fn invoke(self, result: AuthenticatorResult) -> bool {
        self.tx.send(result).is_ok()
    }

    /// Whether the caller dropped its [`PendingResult`].
    pub(crate) fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Caller side of a dispatched session.
///
/// Resolves exactly once. If the session's callback is dropped without being
/// invoked the caller observes [`AuthenticatorResult::Cancelled`]. This happens
/// when the broker is torn down, and when an identical request is dispatched
/// while this one is still live: the newer caller takes over the session and
/// the earlier waiter is told `Cancelled` even though the user never
/// cancelled anything.
///
/// ```no_run
/// # async fn demo(first: fido_broker_core::PendingResult) {
/// use fido_broker_core::AuthenticatorResult;
///
/// match first.wait().await {
///     // superseded, torn down, or cancelled in the UI
///     AuthenticatorResult::Cancelled => {}
///     _ => {}
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct PendingResult {
    rx: oneshot::Receiver<AuthenticatorResult>,
}

impl PendingResult {
    /// Wait for the ceremony to finish.
    pub async fn wait(self) -> AuthenticatorResult {
        self.rx.await.unwrap_or(AuthenticatorResult::Cancelled)
    }

    /// Non-blocking check; `None` while the ceremony is still running.
    pub fn try_take(&mut self) -> Option<AuthenticatorResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(AuthenticatorResult::Cancelled),
        }
    }
}
