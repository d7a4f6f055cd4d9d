//! Broker lifecycle and per-session cancellation.
//!
//! Hand-offs are launched only once the hosting process has started the
//! broker. Each session also owns a [`CancelFlag`] that is raised when the
//! session reaches a terminal state, so a hand-off still waiting to launch
//! gives up instead of opening a UI for a dead session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Notify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Started,
    Stopped,
}

/// Shared lifecycle of the broker, controlled by the hosting process.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::Created);
        Self { tx: Arc::new(tx) }
    }

    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// Move from `Created` to `Started`. No effect in any other state.
    pub fn start(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == LifecycleState::Created {
                *state = LifecycleState::Started;
                true
            } else {
                false
            }
        })
    }

    /// Move to `Stopped`. Idempotent.
    pub fn stop(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state != LifecycleState::Stopped {
                *state = LifecycleState::Stopped;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the broker leaves `Created`.
    ///
    /// Returns `true` if it was started, `false` if it was stopped first.
    pub async fn wait_started(&self) -> bool {
        let mut rx = self.tx.subscribe();
        let started = match rx.wait_for(|state| *state != LifecycleState::Created).await {
            Ok(state) => *state == LifecycleState::Started,
            Err(_) => false,
        };
        started
    }

    /// Resolves once the broker is stopped.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|state| *state == LifecycleState::Stopped).await;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cancellation flag tied to one session.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<CancelInner>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_state_transitions() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Created);
        assert!(lifecycle.start());
        assert!(!lifecycle.start());
        assert_eq!(lifecycle.state(), LifecycleState::Started);
        assert!(lifecycle.stop());
        assert!(!lifecycle.stop());
        assert!(!lifecycle.start(), "a stopped broker cannot restart");
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_wait_started_suspends_until_start() {
        let lifecycle = Lifecycle::new();
        let waiter = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.wait_started().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        lifecycle.start();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_started_reports_stop() {
        let lifecycle = Lifecycle::new();
        lifecycle.stop();
        assert!(!lifecycle.wait_started().await);
    }

    #[tokio::test]
    async fn test_cancel_flag_wakes_waiter() {
        let flag = CancelFlag::new();
        let waiter = {
            let flag = flag.clone();
            tokio::spawn(async move { flag.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!flag.is_cancelled());
        flag.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter was not woken")
            .unwrap();
        assert!(flag.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_set() {
        let flag = CancelFlag::new();
        flag.cancel();
        flag.cancelled().await;
    }
}
