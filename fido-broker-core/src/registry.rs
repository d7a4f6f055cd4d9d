//! In-memory session registry.
//!
//! Sessions live in a concurrent map keyed by [`SessionId`], with a secondary
//! index from [`CorrelationToken`] to the live session owning it. Each state
//! transition happens under the map's per-entry write lock, so for a given
//! session `complete`, `expire` and sweeping are linearizable and only the
//! first terminal transition ever sees the callback. The callback runs after
//! the lock is released.
//!
//! Terminal sessions stay readable for a retention window so late lookups can
//! report their final state, then the sweeper purges them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, error, warn};

use crate::codec;
use crate::error::Result;
use crate::lifecycle::CancelFlag;
use crate::options::{CredentialOptions, RequestKind};
use crate::result::{completion, AuthenticatorResult, PendingResult, ResultCallback};
use crate::session::{CorrelationToken, Session, SessionId, SessionStatus};

struct SessionEntry {
    session: Session,
    callback: Option<ResultCallback>,
    cancel: CancelFlag,
    terminal_at: Option<Instant>,
}

/// Outcome of [`SessionRegistry::create`].
#[derive(Debug)]
pub struct Registration {
    pub session_id: SessionId,
    pub token: CorrelationToken,
    /// Caller side of the session's callback
    pub pending: PendingResult,
    /// Wire form of the options, as handed to the collaborator
    pub encoded_options: Vec<u8>,
    /// `true` when an identical live request was found and taken over
    pub reused: bool,
    pub(crate) cancel: CancelFlag,
}

/// Result of a transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The session moved to the contained terminal state
    Applied(SessionStatus),
    /// The session had already reached the contained terminal state
    AlreadyTerminal(SessionStatus),
    /// Deadline not reached yet
    NotDue,
    NotFound,
}

impl Transition {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Counts produced by one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub abandoned: usize,
    pub purged: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired == 0 && self.abandoned == 0 && self.purged == 0
    }
}

/// Registry statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub pending: usize,
    pub dispatched: usize,
    pub terminal: usize,
    pub tokens: usize,
}

/// Thread-safe store of in-flight sessions.
#[derive(Default)]
pub struct SessionRegistry {
    /// All sessions, live and recently terminated (session_id -> entry)
    sessions: DashMap<SessionId, SessionEntry>,
    /// Live sessions only (token -> session_id)
    tokens: DashMap<CorrelationToken, SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request, or take over an identical live one.
    ///
    /// The correlation token is derived from the kind and the encoded options.
    /// If a non-terminal session already owns the token, its callback is
    /// replaced by a fresh one and the previous waiter observes
    /// [`AuthenticatorResult::Cancelled`]; the session keeps its id and deadline.
    pub fn create(
        &self,
        kind: RequestKind,
        options: CredentialOptions,
        timeout: Duration,
    ) -> Result<Registration> {
        let encoded_options = codec::encode(&options)?;
        let token = CorrelationToken::from_digest(&codec::request_digest(kind, &encoded_options));
        let (callback, pending) = completion();

        match self.tokens.entry(token.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing_id = *occupied.get();
                if let Some(mut entry) = self.sessions.get_mut(&existing_id) {
                    if !entry.session.status.is_terminal() {
                        entry.callback = Some(callback);
                        debug!(session_id = %existing_id, token = %token, "Reusing live session");
                        return Ok(Registration {
                            session_id: existing_id,
                            token,
                            pending,
                            encoded_options,
                            reused: true,
                            cancel: entry.cancel.clone(),
                        });
                    }
                }

                // Stale index entry left by a concurrent terminal transition
                let (session_id, cancel) = self.insert(kind, options, token.clone(), callback, timeout);
                occupied.insert(session_id);
                Ok(Registration {
                    session_id,
                    token,
                    pending,
                    encoded_options,
                    reused: false,
                    cancel,
                })
            }
            Entry::Vacant(vacant) => {
                let (session_id, cancel) = self.insert(kind, options, token.clone(), callback, timeout);
                vacant.insert(session_id);
                Ok(Registration {
                    session_id,
                    token,
                    pending,
                    encoded_options,
                    reused: false,
                    cancel,
                })
            }
        }
    }

    fn insert(
        &self,
        kind: RequestKind,
        options: CredentialOptions,
        token: CorrelationToken,
        callback: ResultCallback,
        timeout: Duration,
    ) -> (SessionId, CancelFlag) {
        let id = SessionId::generate();
        let cancel = CancelFlag::new();
        self.sessions.insert(
            id,
            SessionEntry {
                session: Session {
                    id,
                    kind,
                    token,
                    options: Arc::new(options),
                    status: SessionStatus::Pending,
                    created_at: Utc::now(),
                    deadline: Instant::now() + timeout,
                },
                callback: Some(callback),
                cancel: cancel.clone(),
                terminal_at: None,
            },
        );
        (id, cancel)
    }

    /// Snapshot of a session, including recently terminated ones.
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.session.clone())
    }

    /// Live session currently owning `token`.
    pub fn lookup_token(&self, token: &CorrelationToken) -> Option<SessionId> {
        self.tokens.get(token).map(|entry| *entry.value())
    }

    /// Record that the session was handed to the collaborator.
    ///
    /// Returns `false` if the session is gone or no longer `Pending`.
    pub fn mark_dispatched(&self, id: &SessionId) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut entry) if entry.session.status == SessionStatus::Pending => {
                entry.session.status = SessionStatus::Dispatched;
                true
            }
            _ => false,
        }
    }

    /// Resolve a live session with a collaborator result.
    ///
    /// `Success` moves it to `Completed`; anything else to `Failed`. A session
    /// already past its deadline expires instead and its caller sees a timeout,
    /// whether or not a sweep has run yet.
    pub fn complete(&self, id: &SessionId, result: AuthenticatorResult) -> Transition {
        let status = if result.is_success() {
            SessionStatus::Completed
        } else {
            SessionStatus::Failed
        };
        self.finish(id, status, result, |_| true)
    }

    /// Expire the session if its deadline has passed.
    pub fn expire(&self, id: &SessionId) -> Transition {
        self.expire_at(id, Instant::now())
    }

    /// Expire the session if its deadline is at or before `now`.
    pub fn expire_at(&self, id: &SessionId, now: Instant) -> Transition {
        self.finish(
            id,
            SessionStatus::Expired,
            AuthenticatorResult::timeout(),
            |session| session.is_overdue(now),
        )
    }

    fn finish<F>(
        &self,
        id: &SessionId,
        status: SessionStatus,
        result: AuthenticatorResult,
        due: F,
    ) -> Transition
    where
        F: FnOnce(&Session) -> bool,
    {
        let (callback, token, status, result) = {
            let Some(mut entry) = self.sessions.get_mut(id) else {
                return Transition::NotFound;
            };
            if entry.session.status.is_terminal() {
                return Transition::AlreadyTerminal(entry.session.status);
            }
            if !due(&entry.session) {
                return Transition::NotDue;
            }

            let (status, result) = if status != SessionStatus::Expired
                && entry.session.is_overdue(Instant::now())
            {
                (SessionStatus::Expired, AuthenticatorResult::timeout())
            } else {
                (status, result)
            };

            entry.session.status = status;
            entry.terminal_at = Some(Instant::now());
            entry.cancel.cancel();
            (entry.callback.take(), entry.session.token.clone(), status, result)
        };

        self.tokens.remove_if(&token, |_, owner| owner == id);

        match callback {
            Some(callback) => {
                if !callback.invoke(result) {
                    debug!(session_id = %id, "Caller went away before the result arrived");
                }
            }
            None => {
                error!(session_id = %id, ?status, "Live session had no callback registered");
            }
        }

        Transition::Applied(status)
    }

    /// Fail every live session with `Cancelled`. Used on broker teardown.
    pub fn cancel_all(&self) -> usize {
        let live: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| !entry.session.status.is_terminal())
            .map(|entry| *entry.key())
            .collect();

        live.iter()
            .filter(|id| self.complete(id, AuthenticatorResult::Cancelled).is_applied())
            .count()
    }

    /// One maintenance pass at `now`.
    ///
    /// Expires overdue sessions, fails sessions whose caller dropped its
    /// [`PendingResult`], and purges terminal sessions older than `retention`.
    pub fn sweep(&self, now: Instant, retention: Duration) -> SweepReport {
        let mut overdue = Vec::new();
        let mut abandoned = Vec::new();
        for entry in self.sessions.iter() {
            if entry.session.status.is_terminal() {
                continue;
            }
            if entry.session.is_overdue(now) {
                overdue.push(*entry.key());
            } else if entry.callback.as_ref().is_some_and(|cb| cb.is_abandoned()) {
                abandoned.push(*entry.key());
            }
        }

        let mut report = SweepReport::default();
        for id in &overdue {
            if self.expire_at(id, now).is_applied() {
                report.expired += 1;
            }
        }
        for id in &abandoned {
            if self.complete(id, AuthenticatorResult::Cancelled).is_applied() {
                warn!(session_id = %id, "Caller abandoned session");
                report.abandoned += 1;
            }
        }

        let before = self.sessions.len();
        self.sessions.retain(|_, entry| match entry.terminal_at {
            Some(at) => now.saturating_duration_since(at) < retention,
            None => true,
        });
        report.purged = before.saturating_sub(self.sessions.len());

        report
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            tokens: self.tokens.len(),
            ..Default::default()
        };
        for entry in self.sessions.iter() {
            match entry.session.status {
                SessionStatus::Pending => stats.pending += 1,
                SessionStatus::Dispatched => stats.dispatched += 1,
                _ => stats.terminal += 1,
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("SessionRegistry")
            .field("pending", &stats.pending)
            .field("dispatched", &stats.dispatched)
            .field("terminal", &stats.terminal)
            .finish()
    }
}
