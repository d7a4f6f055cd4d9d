//! Session identity and state.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::options::{CredentialOptions, RequestKind};

/// Opaque identifier of a session, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Correlation token linking a dispatched request to its asynchronous result.
///
/// Lower-case hex of the request digest; identical pending requests map to the
/// same token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parse a token received from a collaborator. Only well-formed tokens are
    /// accepted, anything else cannot refer to a session.
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a session.
///
/// `Completed`, `Failed` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Pending,
    Dispatched,
    Completed,
    Failed,
    Expired,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

/// Read-only view of a session as stored in the registry.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub kind: RequestKind,
    pub token: CorrelationToken,
    pub options: Arc<CredentialOptions>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub deadline: Instant,
}

impl Session {
    /// Whether the deadline has passed at `now`.
    pub fn is_overdue(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<SessionId>().unwrap(), a);
    }

    #[test]
    fn test_token_parse() {
        let token = CorrelationToken::from_digest(&[0xAB; 32]);
        assert_eq!(token.as_str().len(), 64);
        assert_eq!(CorrelationToken::parse(token.as_str()), Some(token));
        assert_eq!(CorrelationToken::parse("abc"), None);
        assert_eq!(CorrelationToken::parse(&"G".repeat(64)), None);
        assert_eq!(CorrelationToken::parse(&"AB".repeat(32)), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SessionStatus::Pending.is_terminal());
        assert!(!SessionStatus::Dispatched.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(SessionStatus::Expired.is_terminal());
    }
}
