//! Periodic expiry pass over the registry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::lifecycle::Lifecycle;
use crate::registry::SessionRegistry;

/// Shortest pause between two sweeps.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Spawn the sweeper on the current runtime. It exits once `lifecycle` stops.
///
/// `interval` is raised to [`MIN_SWEEP_INTERVAL`] if shorter.
pub fn spawn_sweeper(
    registry: Arc<SessionRegistry>,
    lifecycle: Lifecycle,
    interval: Duration,
    retention: Duration,
) -> JoinHandle<()> {
    if interval < MIN_SWEEP_INTERVAL {
        warn!(
            requested_ms = interval.as_millis() as u64,
            "Sweep interval too short, using minimum"
        );
    }
    let interval = interval.max(MIN_SWEEP_INTERVAL);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let stopped = lifecycle.stopped();
        tokio::pin!(stopped);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = registry.sweep(Instant::now(), retention);
                    if !report.is_empty() {
                        info!(
                            expired = report.expired,
                            abandoned = report.abandoned,
                            purged = report.purged,
                            "Swept sessions"
                        );
                    }
                }
                _ = &mut stopped => break,
            }
        }

        debug!("Sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CredentialOptions, RequestKind};
    use crate::result::AuthenticatorResult;
    use crate::session::SessionStatus;

    #[tokio::test]
    async fn test_sweeper_expires_and_exits_on_stop() {
        let registry = Arc::new(SessionRegistry::new());
        let lifecycle = Lifecycle::new();
        let reg = registry
            .create(
                RequestKind::Sign,
                CredentialOptions::builder("example.com", vec![3; 8]).build(),
                Duration::from_millis(30),
            )
            .unwrap();

        let handle = spawn_sweeper(
            Arc::clone(&registry),
            lifecycle.clone(),
            Duration::from_millis(10),
            Duration::from_secs(30),
        );

        let result = tokio::time::timeout(Duration::from_secs(2), reg.pending.wait())
            .await
            .expect("session was never swept");
        assert_eq!(result, AuthenticatorResult::timeout());
        assert_eq!(
            registry.get(&reg.session_id).unwrap().status,
            SessionStatus::Expired
        );

        lifecycle.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_still_sweeps() {
        let registry = Arc::new(SessionRegistry::new());
        let lifecycle = Lifecycle::new();
        let reg = registry
            .create(
                RequestKind::Sign,
                CredentialOptions::builder("example.com", vec![4; 8]).build(),
                Duration::from_millis(5),
            )
            .unwrap();

        let handle = spawn_sweeper(
            Arc::clone(&registry),
            lifecycle.clone(),
            Duration::ZERO,
            Duration::from_secs(30),
        );

        let result = tokio::time::timeout(Duration::from_secs(2), reg.pending.wait())
            .await
            .expect("session was never swept");
        assert_eq!(result, AuthenticatorResult::timeout());

        lifecycle.stop();
        let joined = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop");
        assert!(joined.is_ok(), "sweeper task panicked");
    }
}
